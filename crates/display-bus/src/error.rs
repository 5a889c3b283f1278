use crate::pin::PinId;

/// Errors that can occur while allocating or driving a display bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: core::fmt::Debug> {
    /// The pin is already claimed by another bus.
    PinUnavailable(PinId),
    /// Every slot of the bus pool is occupied.
    PoolExhausted,
    /// The bus has been released, or the handle no longer refers to a live bus.
    InvalidState,
    /// The transport channel is locked by another bus.
    Busy,
    /// The underlying SPI transfer failed.
    Transport(E),
    /// Driving an output pin failed.
    Gpio(PinId),
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::PinUnavailable(pin) => {
                write!(f, "Pin {} is already in use", pin)
            }
            Error::PoolExhausted => write!(f, "Too many display busses"),
            Error::InvalidState => write!(f, "Display bus is not active"),
            Error::Busy => write!(f, "Transport channel is busy"),
            Error::Transport(err) => {
                write!(f, "SPI communication error: {:?}", err)
            }
            Error::Gpio(pin) => write!(f, "Failed to drive pin {}", pin),
        }
    }
}

/// Returned by [`PinRegistry::claim`](crate::PinRegistry::claim) when the
/// pin already has an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlreadyClaimed(pub PinId);

impl<E: core::fmt::Debug> From<AlreadyClaimed> for Error<E> {
    fn from(e: AlreadyClaimed) -> Self {
        Error::PinUnavailable(e.0)
    }
}

/// Returned by [`TransportChannel::acquire`](crate::TransportChannel::acquire)
/// when another bus holds the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Busy;

impl<E: core::fmt::Debug> From<Busy> for Error<E> {
    fn from(_: Busy) -> Self {
        Error::Busy
    }
}

/// An output pin refused a level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GpioError(pub PinId);

impl<E: core::fmt::Debug> From<GpioError> for Error<E> {
    fn from(e: GpioError) -> Self {
        Error::Gpio(e.0)
    }
}
