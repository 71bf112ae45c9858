//! The slice of a serial bus the controller needs.
//!
//! The touch controller usually shares its bus with the display, so the
//! driver never owns clock configuration outright. It asks for its settings
//! at the start of each read, clocks single bytes, and hands the bus back.

use embedded_hal::spi::{Mode, SpiBus, MODE_0};

/// XPT2046 tops out around 2.5 MHz; stay comfortably below that.
pub const DEFAULT_FREQUENCY_HZ: u32 = 2_000_000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    #[default]
    MsbFirst,
    LsbFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusSettings {
    pub frequency_hz: u32,
    pub bit_order: BitOrder,
    pub mode: Mode,
}

impl BusSettings {
    pub const fn new(frequency_hz: u32) -> Self {
        Self {
            frequency_hz,
            bit_order: BitOrder::MsbFirst,
            mode: MODE_0,
        }
    }
}

impl Default for BusSettings {
    fn default() -> Self {
        Self::new(DEFAULT_FREQUENCY_HZ)
    }
}

/// Exclusive, byte-at-a-time access to a (possibly shared) bus.
///
/// Every `begin_transaction` is paired with an `end_transaction`, even when a
/// transfer in between fails.
pub trait TouchBus {
    type Error: embedded_hal::spi::Error;

    fn begin_transaction(&mut self, settings: &BusSettings) -> Result<(), Self::Error>;

    /// Clocks `byte` out and returns the byte clocked in at the same time.
    fn transfer(&mut self, byte: u8) -> Result<u8, Self::Error>;

    fn end_transaction(&mut self) -> Result<(), Self::Error>;
}

impl<T: TouchBus + ?Sized> TouchBus for &mut T {
    type Error = T::Error;

    fn begin_transaction(&mut self, settings: &BusSettings) -> Result<(), Self::Error> {
        T::begin_transaction(self, settings)
    }

    fn transfer(&mut self, byte: u8) -> Result<u8, Self::Error> {
        T::transfer(self, byte)
    }

    fn end_transaction(&mut self) -> Result<(), Self::Error> {
        T::end_transaction(self)
    }
}

/// Adapts a HAL `SpiBus` whose clock and mode were fixed when the peripheral
/// was configured. Requested settings are only logged.
#[derive(Debug)]
pub struct HalBus<B>(B);

impl<B> HalBus<B> {
    pub fn new(bus: B) -> Self {
        Self(bus)
    }

    pub fn into_inner(self) -> B {
        self.0
    }
}

impl<B: SpiBus<u8>> TouchBus for HalBus<B> {
    type Error = B::Error;

    fn begin_transaction(&mut self, settings: &BusSettings) -> Result<(), Self::Error> {
        log::trace!(
            "touch transaction at {} Hz, {:?}, {:?}",
            settings.frequency_hz,
            settings.mode,
            settings.bit_order
        );
        Ok(())
    }

    fn transfer(&mut self, byte: u8) -> Result<u8, Self::Error> {
        let mut buf = [byte];
        self.0.transfer_in_place(&mut buf)?;
        Ok(buf[0])
    }

    fn end_transaction(&mut self) -> Result<(), Self::Error> {
        self.0.flush()
    }
}

#[cfg(feature = "bitbang")]
mod bitbang {
    use super::{BitOrder, BusSettings, TouchBus};
    use bitbang_hal::spi::{self as soft, SpiBus as SoftSpi};
    use core::fmt::{Debug, Display};
    use embedded_hal::{
        delay::DelayNs,
        digital::{InputPin, OutputPin},
        spi::SpiBus,
    };

    impl From<BitOrder> for soft::BitOrder {
        fn from(order: BitOrder) -> Self {
            match order {
                BitOrder::MsbFirst => soft::BitOrder::MSBFirst,
                BitOrder::LsbFirst => soft::BitOrder::LSBFirst,
            }
        }
    }

    impl<Miso, Mosi, Sck, Delay, E> TouchBus for SoftSpi<Miso, Mosi, Sck, Delay>
    where
        Miso: InputPin<Error = E>,
        Mosi: OutputPin<Error = E>,
        Sck: OutputPin<Error = E>,
        E: Debug + Display,
        Delay: DelayNs,
    {
        type Error = soft::Error<E>;

        fn begin_transaction(&mut self, settings: &BusSettings) -> Result<(), Self::Error> {
            self.set_mode(settings.mode)?;
            self.set_bit_order(settings.bit_order.into());
            self.set_frequency(settings.frequency_hz);
            Ok(())
        }

        fn transfer(&mut self, byte: u8) -> Result<u8, Self::Error> {
            let mut buf = [byte];
            SpiBus::transfer_in_place(self, &mut buf)?;
            Ok(buf[0])
        }

        fn end_transaction(&mut self) -> Result<(), Self::Error> {
            SpiBus::flush(self)
        }
    }
}
