#![no_std]
//! Ownership and framing for four-wire SPI display buses.
//!
//! Several displays can share one SPI peripheral. Each display gets a
//! [`FourWire`] bus that owns its command, chip-select and optional reset
//! pins; a [`PinRegistry`] makes sure no pin is claimed twice, and a
//! [`TransportChannel`] serializes access to the shared SPI link. Buses are
//! allocated from a fixed-capacity [`BusPool`] and addressed by stable
//! [`BusHandle`]s.

mod channel;
mod error;
mod fourwire;
mod pin;
mod pool;

pub use channel::{ChannelGuard, TransportChannel};
pub use error::{AlreadyClaimed, Busy, Error};
pub use fourwire::{
    BusPins, ChipSelectMode, FourWire, FourWireConfig, FourWireResources,
    ResetTiming, Transaction,
};
pub use pin::{Pin, PinId, PinRegistry, MAX_PINS};
pub use pool::{BusHandle, BusPool};
