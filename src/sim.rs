//! A stand-in XPT2046 for running the pipeline without hardware.
//!
//! Each bus transaction consumes the next scripted contact; once the script
//! runs out the panel reads as untouched.

use std::{collections::VecDeque, convert::Infallible};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use log::trace;
use xpt2046::{BusSettings, TouchBus};

/// Firmest contact a pair of 12-bit Z readings can express.
pub const MAX_PRESSURE: u16 = 2 * 4095;

/// 12-bit ADC readings for one contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub x: u16,
    pub y: u16,
    pub z1: u16,
    pub z2: u16,
}

impl Contact {
    /// A firm press at the given raw position.
    pub const fn press(x: u16, y: u16) -> Self {
        Self::with_pressure(x, y, 400)
    }

    /// Picks Z1/Z2 so that `z1 + (4095 - z2) == pressure`. Both readings are
    /// 12-bit, so pressure saturates at `MAX_PRESSURE`.
    pub const fn with_pressure(x: u16, y: u16, pressure: u16) -> Self {
        let pressure = if pressure > MAX_PRESSURE {
            MAX_PRESSURE
        } else {
            pressure
        };
        Self {
            x,
            y,
            z1: pressure / 2,
            z2: 4095 - (pressure - pressure / 2),
        }
    }

    /// What the controller reports with nothing on the panel.
    pub const fn idle() -> Self {
        Self {
            x: 0,
            y: 0,
            z1: 0,
            z2: 4095,
        }
    }

    fn channel(&self, command: u8) -> u16 {
        match command & 0x70 {
            0x10 => self.y,
            0x30 => self.z1,
            0x40 => self.z2,
            0x50 => self.x,
            _ => 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct SimulatedPanel {
    script: VecDeque<Option<Contact>>,
    current: Option<Contact>,
    shift_out: VecDeque<u8>,
    transactions: usize,
    last_settings: Option<BusSettings>,
}

impl SimulatedPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one poll's worth of panel state; `None` is a lifted finger.
    pub fn push(&mut self, contact: Option<Contact>) -> &mut Self {
        self.script.push_back(contact);
        self
    }

    /// A straight drag from `from` to `to` over `steps` polls, then a release.
    pub fn stroke(from: (u16, u16), to: (u16, u16), steps: u16) -> Self {
        let mut panel = Self::new();
        let steps = steps.max(1);
        for i in 0..=steps {
            let x = lerp(from.0, to.0, i, steps);
            let y = lerp(from.1, to.1, i, steps);
            panel.push(Some(Contact::press(x, y)));
        }
        panel.push(None);
        panel
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    pub fn transactions(&self) -> usize {
        self.transactions
    }

    pub fn last_settings(&self) -> Option<BusSettings> {
        self.last_settings
    }
}

fn lerp(from: u16, to: u16, i: u16, steps: u16) -> u16 {
    let (from, to) = (i32::from(from), i32::from(to));
    (from + (to - from) * i32::from(i) / i32::from(steps)) as u16
}

impl TouchBus for SimulatedPanel {
    type Error = Infallible;

    fn begin_transaction(&mut self, settings: &BusSettings) -> Result<(), Infallible> {
        self.transactions += 1;
        self.last_settings = Some(*settings);
        self.current = self.script.pop_front().flatten();
        self.shift_out.clear();
        Ok(())
    }

    fn transfer(&mut self, byte: u8) -> Result<u8, Infallible> {
        if byte & 0x80 == 0 {
            return Ok(self.shift_out.pop_front().unwrap_or(0));
        }

        // Start bit: latch a conversion, clocked out over the next two bytes.
        let contact = self.current.unwrap_or_else(Contact::idle);
        let word = contact.channel(byte) << 3;
        trace!("sim conversion {byte:#04x} -> {}", word >> 3);
        self.shift_out.clear();
        self.shift_out.extend(word.to_be_bytes());
        Ok(0)
    }

    fn end_transaction(&mut self) -> Result<(), Infallible> {
        self.current = None;
        Ok(())
    }
}

/// A GPIO line that only remembers its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedLine {
    pub pin: u8,
    pub high: bool,
}

impl SimulatedLine {
    pub fn new(pin: u8) -> Self {
        Self { pin, high: false }
    }
}

impl ErrorType for SimulatedLine {
    type Error = Infallible;
}

impl OutputPin for SimulatedLine {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high = true;
        Ok(())
    }
}

impl InputPin for SimulatedLine {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.high)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.high)
    }
}
