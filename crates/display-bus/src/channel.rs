use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embedded_hal_async::spi::SpiBus;

use crate::error::{Busy, Error};

/// A physical SPI link that several display buses may time-share.
///
/// Only one bus may hold the channel at a time. Locking never waits:
/// [`acquire`](Self::acquire) fails with [`Busy`] if another bus is
/// mid-transfer, so a half-sent frame can never be interleaved with another.
pub struct TransportChannel<M: RawMutex, SPI> {
    bus: Mutex<M, SPI>,
}

impl<M: RawMutex, SPI> TransportChannel<M, SPI> {
    pub const fn new(bus: SPI) -> Self {
        Self { bus: Mutex::new(bus) }
    }

    /// Lock the channel for one bus.
    pub fn acquire(&self) -> Result<ChannelGuard<'_, M, SPI>, Busy> {
        self.bus.try_lock().map(|bus| ChannelGuard { bus }).map_err(|_| Busy)
    }

    /// Returns `true` while some bus holds the channel.
    pub fn is_busy(&self) -> bool {
        self.bus.try_lock().is_err()
    }

    /// Consume the channel and return the SPI bus.
    pub fn into_inner(self) -> SPI {
        self.bus.into_inner()
    }
}

/// Exclusive access to a [`TransportChannel`]. Dropping it unlocks the channel.
pub struct ChannelGuard<'a, M: RawMutex, SPI> {
    bus: MutexGuard<'a, M, SPI>,
}

impl<M: RawMutex, SPI: SpiBus<u8>> ChannelGuard<'_, M, SPI> {
    /// Write `bytes` and wait until they have left the wire.
    pub async fn write(
        &mut self,
        bytes: &[u8],
    ) -> Result<(), Error<SPI::Error>> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.bus.write(bytes).await.map_err(Error::Transport)?;
        // Chip-select must not be deasserted while words are still queued.
        self.bus.flush().await.map_err(Error::Transport)
    }
}

impl<M: RawMutex, SPI> ChannelGuard<'_, M, SPI> {
    /// Unlock the channel. Equivalent to dropping the guard.
    pub fn release(self) {}
}
