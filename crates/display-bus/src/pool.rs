use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiBus;

use crate::channel::TransportChannel;
use crate::error::Error;
use crate::fourwire::{FourWire, FourWireConfig, FourWireResources};
use crate::pin::PinRegistry;

/// Stable reference to a bus living in a [`BusPool`] slot.
///
/// Each slot counts how often it has been released; a handle whose
/// generation no longer matches is stale and refers to nothing. The counter
/// is a wrapping `u32`, so a handle kept across 2^32 reuses of its slot
/// would match again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusHandle {
    index: usize,
    generation: u32,
}

impl BusHandle {
    pub fn index(&self) -> usize {
        self.index
    }
}

struct Slot<B> {
    generation: u32,
    bus: Option<B>,
}

impl<'a, M: RawMutex, SPI, P, D> Slot<FourWire<'a, M, SPI, P, D>> {
    /// Occupied by a bus that has not been released, by the pool or in
    /// place through [`FourWire::release`].
    fn is_live(&self) -> bool {
        self.bus.as_ref().is_some_and(|bus| bus.is_active())
    }

    fn live_bus(&self) -> Option<&FourWire<'a, M, SPI, P, D>> {
        self.bus.as_ref().filter(|bus| bus.is_active())
    }

    /// Drop a bus that was released in place and retire its handle.
    fn reclaim(&mut self) {
        if self.bus.take().is_some() {
            self.generation = self.generation.wrapping_add(1);
        }
    }
}

/// Fixed table of `N` display bus slots.
///
/// `N` is the platform display limit. Slots are interchangeable, so
/// allocation is first-fit and freed slots are simply reused.
pub struct BusPool<'a, M: RawMutex, SPI, P, D, const N: usize> {
    registry: &'a PinRegistry,
    slots: [Slot<FourWire<'a, M, SPI, P, D>>; N],
}

impl<'a, M, SPI, P, D, const N: usize> BusPool<'a, M, SPI, P, D, N>
where
    M: RawMutex,
    SPI: SpiBus<u8>,
    P: OutputPin,
    D: DelayNs,
{
    /// Construct a bus in the first free slot.
    ///
    /// Fails with [`Error::PoolExhausted`] before any pin is claimed if every
    /// slot is taken. If construction fails the slot stays empty. Either way
    /// the resources come back with the error.
    pub async fn allocate(
        &mut self,
        channel: &'a TransportChannel<M, SPI>,
        resources: FourWireResources<P>,
        config: FourWireConfig,
        delay: D,
    ) -> Result<BusHandle, (Error<SPI::Error>, FourWireResources<P>)> {
        let Some(index) = self.slots.iter().position(|s| !s.is_live())
        else {
            #[cfg(feature = "defmt")]
            defmt::warn!("bus pool: all {} slots in use", N);
            return Err((Error::PoolExhausted, resources));
        };

        let bus =
            FourWire::new(self.registry, channel, resources, config, delay)
                .await?;

        let slot = &mut self.slots[index];
        slot.reclaim();
        slot.bus = Some(bus);

        #[cfg(feature = "defmt")]
        defmt::debug!("bus pool: allocated slot {}", index);

        Ok(BusHandle { index, generation: slot.generation })
    }

    /// Send a command through the bus behind `handle`.
    pub async fn send_command(
        &mut self,
        handle: BusHandle,
        opcode: u8,
        params: &[u8],
    ) -> Result<(), Error<SPI::Error>> {
        let bus = self.get_mut(handle).ok_or(Error::InvalidState)?;
        bus.send_command(opcode, params).await
    }

    /// Send data through the bus behind `handle`.
    pub async fn send_data(
        &mut self,
        handle: BusHandle,
        data: &[u8],
    ) -> Result<(), Error<SPI::Error>> {
        let bus = self.get_mut(handle).ok_or(Error::InvalidState)?;
        bus.send_data(data).await
    }
}

impl<'a, M: RawMutex, SPI, P, D, const N: usize> BusPool<'a, M, SPI, P, D, N> {
    /// Create a pool with every slot empty.
    pub const fn new(registry: &'a PinRegistry) -> Self {
        Self {
            registry,
            slots: [const { Slot { generation: 0, bus: None } }; N],
        }
    }

    fn slot_mut(
        &mut self,
        handle: BusHandle,
    ) -> Option<&mut Slot<FourWire<'a, M, SPI, P, D>>> {
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
    }

    /// The live bus behind `handle`. `None` if the handle is stale or the
    /// bus has been released.
    pub fn get(&self, handle: BusHandle) -> Option<&FourWire<'a, M, SPI, P, D>> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.live_bus())
    }

    pub fn get_mut(
        &mut self,
        handle: BusHandle,
    ) -> Option<&mut FourWire<'a, M, SPI, P, D>> {
        self.slot_mut(handle)
            .and_then(|slot| slot.bus.as_mut())
            .filter(|bus| bus.is_active())
    }

    /// Release the bus behind `handle`, empty its slot and hand back the
    /// pins.
    ///
    /// A bus already released in place still has its pins handed back.
    /// Returns `None` if the handle is stale or the pool already released it.
    pub fn release(&mut self, handle: BusHandle) -> Option<FourWireResources<P>> {
        let slot = self.slot_mut(handle)?;
        let bus = slot.bus.take()?;
        slot.generation = slot.generation.wrapping_add(1);

        #[cfg(feature = "defmt")]
        defmt::debug!("bus pool: released slot {}", handle.index);

        Some(bus.free())
    }

    /// Release every active bus. Run at teardown.
    pub fn release_all(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(bus) = slot.bus.take() {
                drop(bus.free());
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
    }

    /// Number of slots holding a bus that has not been released.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_live()).count()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn registry(&self) -> &'a PinRegistry {
        self.registry
    }
}
