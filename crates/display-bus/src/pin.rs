use portable_atomic::{AtomicU64, Ordering};

use crate::error::AlreadyClaimed;

/// Number of pins a [`PinRegistry`] can track.
pub const MAX_PINS: u8 = 64;

const PINS_PER_PORT: u8 = 32;

/// Identifies a physical controller pin.
///
/// Pins are numbered flat, `port * 32 + pin`, so `P1.03` is `35`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId(u8);

impl PinId {
    /// Returns `None` if `raw` is outside the range the registry tracks.
    pub const fn new(raw: u8) -> Option<Self> {
        if raw < MAX_PINS {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Build an id from a GPIO port and the pin number within that port.
    pub const fn from_port_pin(port: u8, pin: u8) -> Option<Self> {
        if pin >= PINS_PER_PORT {
            return None;
        }
        match port.checked_mul(PINS_PER_PORT) {
            Some(base) => Self::new(base + pin),
            None => None,
        }
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn port(self) -> u8 {
        self.0 / PINS_PER_PORT
    }

    pub const fn pin(self) -> u8 {
        self.0 % PINS_PER_PORT
    }

    const fn mask(self) -> u64 {
        1 << self.0
    }
}

impl core::fmt::Display for PinId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "P{}.{:02}", self.port(), self.pin())
    }
}

/// An output driver tagged with the id of the pin it drives.
///
/// The registry only knows about ids; the bus drives `output`.
#[derive(Debug)]
pub struct Pin<P> {
    pub id: PinId,
    pub output: P,
}

impl<P> Pin<P> {
    pub const fn new(id: PinId, output: P) -> Self {
        Self { id, output }
    }
}

/// Tracks which pins are claimed by a live bus.
///
/// Each pin is one bit of an atomic bitmap, so a claim is a single
/// read-modify-write and two buses can never both win the same pin.
pub struct PinRegistry {
    claimed: AtomicU64,
}

impl PinRegistry {
    pub const fn new() -> Self {
        Self { claimed: AtomicU64::new(0) }
    }

    /// Mark `pin` as claimed.
    pub fn claim(&self, pin: PinId) -> Result<(), AlreadyClaimed> {
        let prev = self.claimed.fetch_or(pin.mask(), Ordering::AcqRel);
        if prev & pin.mask() != 0 {
            #[cfg(feature = "defmt")]
            defmt::debug!("pin {} already claimed", pin);
            return Err(AlreadyClaimed(pin));
        }
        Ok(())
    }

    /// Mark `pin` as free. Releasing a free pin does nothing.
    pub fn release(&self, pin: PinId) {
        self.claimed.fetch_and(!pin.mask(), Ordering::AcqRel);
    }

    pub fn is_claimed(&self, pin: PinId) -> bool {
        self.claimed.load(Ordering::Acquire) & pin.mask() != 0
    }

    /// Number of pins currently claimed.
    pub fn claimed_count(&self) -> usize {
        self.claimed.load(Ordering::Acquire).count_ones() as usize
    }
}

impl Default for PinRegistry {
    fn default() -> Self {
        Self::new()
    }
}
