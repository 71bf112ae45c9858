#![no_std]

mod calibration;
mod errors;
mod xpt2046;
use embedded_graphics::prelude::Point;

pub use calibration::{map_axis, map_sample, AxisConfig, MappedPoint, Rotation};
pub use errors::Error;
pub(crate) use errors::Result;
pub use xpt2046::spi::{BitOrder, BusSettings, HalBus, TouchBus, DEFAULT_FREQUENCY_HZ};
pub use xpt2046::{NoIrq, Xpt2046, PRESSURE_THRESHOLD};

// Guts stolen from:
// https://github.com/witnessmenow/ESP32-Cheap-Yellow-Display/tree/c4c60bf802afd817e28b223ecc32f0bdc7189f09/Variants/3248S035C/Examples/1-Draw/touchscreen
// Which is a descendant of:
// https://github.com/tommy-gilligan/touchscreen/tree/a5c286eb9bd47d53c4837c0681158c390fc9841d

// Cheers to all involved!

/// One reading straight off the controller. All zero means nothing is
/// pressing the panel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub x: i16,
    pub y: i16,
    /// Pressure metric, higher is firmer contact.
    pub z: i16,
}

impl RawSample {
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    pub fn is_touching(&self) -> bool {
        self.z > PRESSURE_THRESHOLD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchKind {
    Start,
    Move,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEvent {
    pub point: Point,
    pub kind: TouchKind,
}

pub trait TouchScreen {
    type TouchError;

    fn get_touch_event(&mut self) -> ::core::result::Result<Option<TouchEvent>, Self::TouchError>;
}
