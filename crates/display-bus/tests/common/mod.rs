#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use display_bus::{
    BusPool, FourWire, FourWireResources, Pin, PinId, TransportChannel,
};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Everything the mocks observe, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Low(u8),
    High(u8),
    Write(Vec<u8>),
    Delay(u32),
}

#[derive(Debug, Clone, Default)]
pub struct Log(Rc<RefCell<Vec<Event>>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    /// Drain and return every event recorded so far.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Mock SPI bus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSpiError;

impl embedded_hal_async::spi::Error for MockSpiError {
    fn kind(&self) -> embedded_hal_async::spi::ErrorKind {
        embedded_hal_async::spi::ErrorKind::Other
    }
}

pub struct MockSpi {
    log: Log,
    /// Every write fails while set.
    pub fail: Rc<Cell<bool>>,
    /// Yield to the executor once inside every write, so a second future
    /// can run while this transfer is in flight.
    pub yield_in_write: bool,
}

impl MockSpi {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            fail: Rc::new(Cell::new(false)),
            yield_in_write: false,
        }
    }
}

impl embedded_hal_async::spi::ErrorType for MockSpi {
    type Error = MockSpiError;
}

impl embedded_hal_async::spi::SpiBus<u8> for MockSpi {
    async fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        words.fill(0);
        Ok(())
    }

    async fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        if self.fail.get() {
            return Err(MockSpiError);
        }
        self.log.push(Event::Write(words.to_vec()));
        if self.yield_in_write {
            embassy_futures::yield_now().await;
        }
        Ok(())
    }

    async fn transfer(
        &mut self,
        read: &mut [u8],
        write: &[u8],
    ) -> Result<(), Self::Error> {
        self.write(write).await?;
        self.read(read).await
    }

    async fn transfer_in_place(
        &mut self,
        words: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.log.push(Event::Write(words.to_vec()));
        words.fill(0);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock output pin and delay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPinError;

impl embedded_hal::digital::Error for MockPinError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

#[derive(Debug)]
pub struct MockPin {
    raw: u8,
    log: Log,
    pub fail: Rc<Cell<bool>>,
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = MockPinError;
}

impl embedded_hal::digital::OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.fail.get() {
            return Err(MockPinError);
        }
        self.log.push(Event::Low(self.raw));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if self.fail.get() {
            return Err(MockPinError);
        }
        self.log.push(Event::High(self.raw));
        Ok(())
    }
}

pub struct MockDelay {
    log: Log,
}

impl MockDelay {
    pub fn new(log: &Log) -> Self {
        Self { log: log.clone() }
    }
}

impl embedded_hal_async::delay::DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.log.push(Event::Delay(ns));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub type TestChannel = TransportChannel<NoopRawMutex, MockSpi>;
pub type TestBus<'a> = FourWire<'a, NoopRawMutex, MockSpi, MockPin, MockDelay>;
pub type TestPool<'a, const N: usize> =
    BusPool<'a, NoopRawMutex, MockSpi, MockPin, MockDelay, N>;

pub fn id(raw: u8) -> PinId {
    PinId::new(raw).unwrap()
}

pub fn pin(log: &Log, raw: u8) -> Pin<MockPin> {
    Pin::new(
        id(raw),
        MockPin { raw, log: log.clone(), fail: Rc::new(Cell::new(false)) },
    )
}

pub fn resources(
    log: &Log,
    command: u8,
    chip_select: u8,
    reset: Option<u8>,
) -> FourWireResources<MockPin> {
    FourWireResources {
        command: pin(log, command),
        chip_select: pin(log, chip_select),
        reset: reset.map(|raw| pin(log, raw)),
    }
}

pub fn channel(log: &Log) -> TestChannel {
    TransportChannel::new(MockSpi::new(log))
}
