//! Serial Peripheral Interface
//!
//! This implementation consumes the following hardware resources:
//! - Delay provider used to pace each half clock period
//! - Output GPIO pin for clock signal (SCLK)
//! - Output GPIO pin for data transmission (Master Output Slave Input - MOSI)
//! - Input GPIO pin for data reception (Master Input Slave Output - MISO)
//!
//! SS/CS (slave select) is not part of the bus. Each device driver owns and
//! drives its own line, which is what lets a display and a touch controller
//! share the same three wires.
//!
//! MSB-first and LSB-first bit orders are supported. Mode, bit order and
//! clock rate may be changed between transactions.

use core::fmt::{self, Debug, Display};

pub use embedded_hal::spi::{MODE_0, MODE_1, MODE_2, MODE_3};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::{self, ErrorType, Mode, Polarity};

/// Filler clocked out on MOSI while only reading.
const READ_FILLER: u8 = 0x00;

/// Error type
#[derive(Debug)]
pub enum Error<E: Debug + Display> {
    /// One of the bus pins failed to change or report its level
    Bus(E),
}

impl<E: Debug + Display> core::error::Error for Error<E> {}

impl<E: Debug + Display> Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "Bus error: {}", e),
        }
    }
}

impl<E: Debug + Display> spi::Error for Error<E> {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

/// Transmission bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    /// Most significant bit first
    MSBFirst,
    /// Least significant bit first
    LSBFirst,
}

impl Default for BitOrder {
    /// Default bit order: MSB first
    fn default() -> Self {
        BitOrder::MSBFirst
    }
}

/// Half of one clock period in nanoseconds for the given SCLK frequency.
pub fn half_period_ns(frequency_hz: u32) -> u32 {
    500_000_000 / frequency_hz.max(1)
}

/// A full-duplex SPI bus driven from three pins. A `DelayNs` provider paces
/// each half clock period.
pub struct SpiBus<Miso, Mosi, Sck, Delay>
where
    Miso: InputPin,
    Mosi: OutputPin,
    Sck: OutputPin,
    Delay: DelayNs,
{
    mode: Mode,
    miso: Miso,
    mosi: Mosi,
    sck: Sck,
    delay: Delay,
    delay_ns: u32,
    bit_order: BitOrder,
}

impl<Miso, Mosi, Sck, Delay, E> SpiBus<Miso, Mosi, Sck, Delay>
where
    Miso: InputPin<Error = E>,
    Mosi: OutputPin<Error = E>,
    Sck: OutputPin<Error = E>,
    E: Debug + Display,
    Delay: DelayNs,
{
    /// Create instance, leaving SCLK at the idle level of `mode`
    pub fn build(
        mode: Mode,
        miso: Miso,
        mosi: Mosi,
        sck: Sck,
        delay: Delay,
    ) -> Result<Self, Error<E>> {
        let mut spi = SpiBus {
            mode,
            miso,
            mosi,
            sck,
            delay,
            delay_ns: 0,
            bit_order: BitOrder::default(),
        };

        spi.idle_clock()?;

        Ok(spi)
    }

    /// Sets the half clock period, in nanoseconds, at construction.
    pub fn with_delay_ns(mut self, delay: u32) -> Self {
        self.delay_ns = delay;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch clock polarity/phase. SCLK is moved to the new idle level.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), Error<E>> {
        if self.mode != mode {
            self.mode = mode;
            self.idle_clock()?;
        }
        Ok(())
    }

    pub fn bit_order(&self) -> BitOrder {
        self.bit_order
    }

    /// Set transmission bit order
    pub fn set_bit_order(&mut self, order: BitOrder) {
        self.bit_order = order;
    }

    pub fn delay_ns(&self) -> u32 {
        self.delay_ns
    }

    /// Sets the half clock period in nanoseconds. SCLK spends this long at
    /// each level for every bit.
    pub fn set_delay_ns(&mut self, delay: u32) {
        self.delay_ns = delay;
    }

    /// Pace the clock for roughly `frequency_hz`. Pin toggling overhead is
    /// not compensated, so the real rate is always a little lower.
    pub fn set_frequency(&mut self, frequency_hz: u32) {
        self.delay_ns = half_period_ns(frequency_hz);
    }

    /// Hands the pins and delay back.
    pub fn release(self) -> (Miso, Mosi, Sck, Delay) {
        (self.miso, self.mosi, self.sck, self.delay)
    }

    /// Clocks one byte out on MOSI while shifting one byte in from MISO.
    fn exchange_byte(&mut self, byte: u8) -> Result<u8, Error<E>> {
        let mut read_val = 0u8;

        for bit_offset in 0..8 {
            let out_bit = match self.bit_order {
                BitOrder::MSBFirst => (byte >> (7 - bit_offset)) & 0b1,
                BitOrder::LSBFirst => (byte >> bit_offset) & 0b1,
            };

            if out_bit == 1 {
                self.mosi.set_high().map_err(Error::Bus)?;
            } else {
                self.mosi.set_low().map_err(Error::Bus)?;
            }

            let in_bit = self.churn()?;
            read_val = (read_val << 1) | u8::from(in_bit);
        }

        // Bits were shifted in arrival order, so LSB-first needs flipping.
        let result = match self.bit_order {
            BitOrder::MSBFirst => read_val,
            BitOrder::LSBFirst => read_val.reverse_bits(),
        };

        Ok(result)
    }

    /// One full clock cycle. Returns the MISO level sampled on the edge the
    /// mode designates.
    fn churn(&mut self) -> Result<bool, Error<E>> {
        let sampled = match self.mode {
            MODE_0 => {
                self.wait_for_timer();
                self.set_clk_high()?;
                let bit = self.read_bit()?;
                self.wait_for_timer();
                self.set_clk_low()?;
                bit
            }
            MODE_1 => {
                self.set_clk_high()?;
                self.wait_for_timer();
                let bit = self.read_bit()?;
                self.set_clk_low()?;
                self.wait_for_timer();
                bit
            }
            MODE_2 => {
                self.wait_for_timer();
                self.set_clk_low()?;
                let bit = self.read_bit()?;
                self.wait_for_timer();
                self.set_clk_high()?;
                bit
            }
            MODE_3 => {
                self.set_clk_low()?;
                self.wait_for_timer();
                let bit = self.read_bit()?;
                self.set_clk_high()?;
                self.wait_for_timer();
                bit
            }
        };
        Ok(sampled)
    }

    fn idle_clock(&mut self) -> Result<(), Error<E>> {
        match self.mode.polarity {
            Polarity::IdleLow => self.set_clk_low(),
            Polarity::IdleHigh => self.set_clk_high(),
        }
    }

    #[inline]
    fn read_bit(&mut self) -> Result<bool, Error<E>> {
        self.miso.is_high().map_err(Error::Bus)
    }

    #[inline]
    fn set_clk_high(&mut self) -> Result<(), Error<E>> {
        self.sck.set_high().map_err(Error::Bus)
    }

    #[inline]
    fn set_clk_low(&mut self) -> Result<(), Error<E>> {
        self.sck.set_low().map_err(Error::Bus)
    }

    #[inline]
    fn wait_for_timer(&mut self) {
        self.delay.delay_ns(self.delay_ns);
    }
}

impl<Miso, Mosi, Sck, Delay, E> spi::SpiBus<u8> for SpiBus<Miso, Mosi, Sck, Delay>
where
    Miso: InputPin<Error = E>,
    Mosi: OutputPin<Error = E>,
    Sck: OutputPin<Error = E>,
    E: Debug + Display,
    Delay: DelayNs,
{
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        for byte in words.iter_mut() {
            *byte = self.exchange_byte(READ_FILLER)?;
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        for byte in words.iter() {
            self.exchange_byte(*byte)?;
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        let len = read.len().max(write.len());
        for i in 0..len {
            let out = write.get(i).copied().unwrap_or(READ_FILLER);
            let received = self.exchange_byte(out)?;
            if let Some(slot) = read.get_mut(i) {
                *slot = received;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        for byte in words.iter_mut() {
            *byte = self.exchange_byte(*byte)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        // Every bit is clocked synchronously, nothing is ever buffered.
        Ok(())
    }
}

impl<Miso, Mosi, Sck, Delay, E> ErrorType for SpiBus<Miso, Mosi, Sck, Delay>
where
    Miso: InputPin<Error = E>,
    Mosi: OutputPin<Error = E>,
    Sck: OutputPin<Error = E>,
    E: Debug + Display,
    Delay: DelayNs,
{
    type Error = Error<E>;
}
