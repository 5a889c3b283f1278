//! Four-wire display bus: SPI clock and data, a command/data select line,
//! chip-select, and an optional reset line.
//!
//! A byte written while the command pin is low is an opcode; bytes written
//! while it is high are parameters or pixel data. Chip-select gates every
//! transfer so several displays can share one [`TransportChannel`].

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::{OutputPin, PinState};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiBus;

use crate::channel::{ChannelGuard, TransportChannel};
use crate::error::{AlreadyClaimed, Error, GpioError};
use crate::pin::{Pin, PinId, PinRegistry};

const CS_ASSERTED: PinState = PinState::Low;
const CS_DEASSERTED: PinState = PinState::High;
const LEVEL_COMMAND: PinState = PinState::Low;
const LEVEL_DATA: PinState = PinState::High;
const RESET_ASSERTED: PinState = PinState::Low;
const RESET_DEASSERTED: PinState = PinState::High;

/// How chip-select frames a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipSelectMode {
    /// Chip-select stays asserted for the whole transaction.
    #[default]
    PerTransfer,
    /// Chip-select is pulsed around every byte. Some controllers latch on
    /// the rising edge and need this.
    ToggleEveryByte,
}

/// Hardware reset handshake timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResetTiming {
    /// How long reset is held low.
    pub pulse_ns: u32,
    /// How long to wait after releasing reset before the first command.
    pub recovery_ns: u32,
}

impl Default for ResetTiming {
    /// 10 µs pulse, 120 ms recovery. Covers the common TFT controllers
    /// (ST7789, ILI9341); check the datasheet before shortening either.
    fn default() -> Self {
        Self { pulse_ns: 10_000, recovery_ns: 120_000_000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FourWireConfig {
    pub chip_select_mode: ChipSelectMode,
    pub reset_timing: ResetTiming,
}

/// The pins a bus is built from.
///
/// Handed back on construction failure and on release, so the output
/// drivers are never lost.
#[derive(Debug)]
pub struct FourWireResources<P> {
    pub command: Pin<P>,
    pub chip_select: Pin<P>,
    pub reset: Option<Pin<P>>,
}

/// Ids of the pins a bus has claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusPins {
    pub command: PinId,
    pub chip_select: PinId,
    pub reset: Option<PinId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum State {
    Active,
    Released,
}

const CLAIM_COMMAND: usize = 0;
const CLAIM_CHIP_SELECT: usize = 1;
const CLAIM_RESET: usize = 2;

/// Registry claims held by one bus. Dropping releases them in reverse order.
struct Claims<'a> {
    registry: &'a PinRegistry,
    held: [Option<PinId>; 3],
}

impl<'a> Claims<'a> {
    fn new(registry: &'a PinRegistry) -> Self {
        Self { registry, held: [None; 3] }
    }

    fn claim(&mut self, slot: usize, pin: PinId) -> Result<(), AlreadyClaimed> {
        self.registry.claim(pin)?;
        self.held[slot] = Some(pin);
        Ok(())
    }

    fn claim_all<P>(
        &mut self,
        resources: &FourWireResources<P>,
    ) -> Result<(), AlreadyClaimed> {
        self.claim(CLAIM_COMMAND, resources.command.id)?;
        self.claim(CLAIM_CHIP_SELECT, resources.chip_select.id)?;
        if let Some(reset) = &resources.reset {
            self.claim(CLAIM_RESET, reset.id)?;
        }
        Ok(())
    }

    fn release(&mut self) {
        for held in self.held.iter_mut().rev() {
            if let Some(pin) = held.take() {
                self.registry.release(pin);
            }
        }
    }
}

impl Drop for Claims<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

fn drive<P: OutputPin>(
    pin: &mut Pin<P>,
    state: PinState,
) -> Result<(), GpioError> {
    pin.output.set_state(state).map_err(|_| GpioError(pin.id))
}

/// One display's command interface.
///
/// Holds the claims on its pins for as long as it is active. Dropping the
/// bus releases them.
pub struct FourWire<'a, M: RawMutex, SPI, P, D> {
    claims: Claims<'a>,
    channel: &'a TransportChannel<M, SPI>,
    command: Pin<P>,
    chip_select: Pin<P>,
    reset: Option<Pin<P>>,
    delay: D,
    config: FourWireConfig,
    state: State,
}

impl<'a, M, SPI, P, D> FourWire<'a, M, SPI, P, D>
where
    M: RawMutex,
    SPI: SpiBus<u8>,
    P: OutputPin,
    D: DelayNs,
{
    /// Claim the pins, drive them to their idle levels and, if a reset pin
    /// was supplied, pulse it.
    ///
    /// On failure every claim made so far is released and the resources are
    /// returned alongside the error.
    pub async fn new(
        registry: &'a PinRegistry,
        channel: &'a TransportChannel<M, SPI>,
        resources: FourWireResources<P>,
        config: FourWireConfig,
        delay: D,
    ) -> Result<Self, (Error<SPI::Error>, FourWireResources<P>)> {
        let mut claims = Claims::new(registry);
        if let Err(e) = claims.claim_all(&resources) {
            #[cfg(feature = "defmt")]
            defmt::warn!("four-wire bus: pin {} unavailable", e.0);
            drop(claims);
            return Err((e.into(), resources));
        }

        let FourWireResources { command, chip_select, reset } = resources;
        let mut bus = Self {
            claims,
            channel,
            command,
            chip_select,
            reset,
            delay,
            config,
            state: State::Active,
        };

        if let Err(e) = bus.init().await {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "four-wire bus: init failed: {:?}",
                defmt::Debug2Format(&e)
            );
            return Err((e, bus.free()));
        }

        Ok(bus)
    }

    async fn init(&mut self) -> Result<(), Error<SPI::Error>> {
        drive(&mut self.chip_select, CS_DEASSERTED)?;
        drive(&mut self.command, LEVEL_DATA)?;
        if let Some(reset) = &mut self.reset {
            drive(reset, RESET_DEASSERTED)?;
        }
        self.pulse_reset().await
    }

    async fn pulse_reset(&mut self) -> Result<(), Error<SPI::Error>> {
        let Some(reset) = &mut self.reset else {
            return Ok(());
        };
        let timing = self.config.reset_timing;

        drive(reset, RESET_ASSERTED)?;
        self.delay.delay_ns(timing.pulse_ns).await;
        drive(reset, RESET_DEASSERTED)?;
        self.delay.delay_ns(timing.recovery_ns).await;
        Ok(())
    }

    /// Run the hardware reset handshake again. Does nothing without a reset
    /// pin.
    pub async fn reset(&mut self) -> Result<(), Error<SPI::Error>> {
        if !self.is_active() {
            return Err(Error::InvalidState);
        }
        self.pulse_reset().await
    }

    /// Lock the channel and open a chip-select framed transaction.
    pub fn begin_transaction(
        &mut self,
    ) -> Result<Transaction<'_, M, SPI, P>, Error<SPI::Error>> {
        if !self.is_active() {
            return Err(Error::InvalidState);
        }
        let channel = self.channel.acquire()?;

        let mut transaction = Transaction {
            channel,
            command: &mut self.command,
            chip_select: &mut self.chip_select,
            mode: self.config.chip_select_mode,
            asserted: false,
        };
        if transaction.mode == ChipSelectMode::PerTransfer {
            transaction.assert()?;
        }
        Ok(transaction)
    }

    /// Send `opcode` at command level followed by `params` at data level,
    /// all under one chip-select assertion.
    pub async fn send_command(
        &mut self,
        opcode: u8,
        params: &[u8],
    ) -> Result<(), Error<SPI::Error>> {
        let mut transaction = self.begin_transaction()?;
        let written = match transaction.write_command(opcode).await {
            Ok(()) => transaction.write_data(params).await,
            Err(e) => Err(e),
        };
        let ended = transaction.end();

        #[cfg(feature = "defmt")]
        if let Err(e) = &written {
            defmt::warn!(
                "four-wire command {=u8:#x} failed: {:?}",
                opcode,
                defmt::Debug2Format(e)
            );
        }
        written.and(ended)
    }

    /// Send `data` at data level.
    pub async fn send_data(
        &mut self,
        data: &[u8],
    ) -> Result<(), Error<SPI::Error>> {
        let mut transaction = self.begin_transaction()?;
        let written = transaction.write_data(data).await;
        let ended = transaction.end();

        #[cfg(feature = "defmt")]
        if let Err(e) = &written {
            defmt::warn!(
                "four-wire data write failed: {:?}",
                defmt::Debug2Format(e)
            );
        }
        written.and(ended)
    }
}

impl<'a, M: RawMutex, SPI, P, D> FourWire<'a, M, SPI, P, D> {
    /// Return the pin claims to the registry. Releasing twice is a no-op.
    ///
    /// The channel lock only lives inside a [`Transaction`], which borrows
    /// the bus mutably, so it cannot still be held here.
    pub fn release(&mut self) {
        if self.state == State::Released {
            return;
        }
        self.claims.release();
        self.state = State::Released;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "four-wire bus released (cmd {}, cs {})",
            self.command.id,
            self.chip_select.id
        );
    }

    /// Release the bus and hand back its pins.
    pub fn free(mut self) -> FourWireResources<P> {
        self.release();
        let Self { command, chip_select, reset, .. } = self;
        FourWireResources { command, chip_select, reset }
    }

    pub fn is_active(&self) -> bool {
        self.state == State::Active
    }

    pub fn has_reset(&self) -> bool {
        self.reset.is_some()
    }

    pub fn pins(&self) -> BusPins {
        BusPins {
            command: self.command.id,
            chip_select: self.chip_select.id,
            reset: self.reset.as_ref().map(|pin| pin.id),
        }
    }

    pub fn config(&self) -> &FourWireConfig {
        &self.config
    }

    /// Returns `true` if no bus currently holds the transport channel.
    pub fn is_channel_free(&self) -> bool {
        !self.channel.is_busy()
    }
}

/// A chip-select framed transfer on a locked channel.
///
/// Dropping it, including when a send future is cancelled, deasserts
/// chip-select and unlocks the channel.
pub struct Transaction<'t, M: RawMutex, SPI, P: OutputPin> {
    channel: ChannelGuard<'t, M, SPI>,
    command: &'t mut Pin<P>,
    chip_select: &'t mut Pin<P>,
    mode: ChipSelectMode,
    asserted: bool,
}

impl<M: RawMutex, SPI: SpiBus<u8>, P: OutputPin> Transaction<'_, M, SPI, P> {
    /// Write one opcode byte at command level.
    pub async fn write_command(
        &mut self,
        opcode: u8,
    ) -> Result<(), Error<SPI::Error>> {
        drive(self.command, LEVEL_COMMAND)?;
        self.write(&[opcode]).await
    }

    /// Write `data` at data level.
    pub async fn write_data(
        &mut self,
        data: &[u8],
    ) -> Result<(), Error<SPI::Error>> {
        drive(self.command, LEVEL_DATA)?;
        self.write(data).await
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), Error<SPI::Error>> {
        match self.mode {
            ChipSelectMode::PerTransfer => self.channel.write(bytes).await,
            ChipSelectMode::ToggleEveryByte => {
                for byte in bytes {
                    self.assert()?;
                    let written =
                        self.channel.write(core::slice::from_ref(byte)).await;
                    let deasserted = self.deassert();
                    written?;
                    deasserted?;
                }
                Ok(())
            }
        }
    }

    /// Deassert chip-select and unlock the channel.
    pub fn end(mut self) -> Result<(), Error<SPI::Error>> {
        Ok(self.deassert()?)
    }
}

impl<M: RawMutex, SPI, P: OutputPin> Transaction<'_, M, SPI, P> {
    fn assert(&mut self) -> Result<(), GpioError> {
        drive(self.chip_select, CS_ASSERTED)?;
        self.asserted = true;
        Ok(())
    }

    fn deassert(&mut self) -> Result<(), GpioError> {
        if !self.asserted {
            return Ok(());
        }
        self.asserted = false;
        drive(self.chip_select, CS_DEASSERTED)
    }
}

impl<M: RawMutex, SPI, P: OutputPin> Drop for Transaction<'_, M, SPI, P> {
    fn drop(&mut self) {
        if let Err(_e) = self.deassert() {
            #[cfg(feature = "defmt")]
            defmt::warn!("four-wire: chip-select {} stuck asserted", _e.0);
        }
    }
}
