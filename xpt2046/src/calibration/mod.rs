use crate::RawSample;

use embedded_graphics::prelude::{Point, Size};
use serde_derive::{Deserialize, Serialize};

// Min/max window mapping: clamp into the calibrated window, then scale to
// pixels. Integer only, existing calibrations depend on the truncating division.

/// Panel orientation relative to the display, in quarter turns clockwise.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Only the low two bits are significant.
    pub const fn from_code(code: u8) -> Self {
        match code & 0x03 {
            0 => Rotation::Deg0,
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub min_x: i16,
    pub max_x: i16,
    pub min_y: i16,
    pub max_y: i16,
    pub width: u16,
    pub height: u16,
    pub rotation: Rotation,
    pub swap_xy: bool,
    pub invert_x: bool,
    pub invert_y: bool,
    /// Rotate mapped points by `rotation`. Off by default, since existing
    /// calibrations were tuned without it.
    pub apply_rotation: bool,
}

impl Default for AxisConfig {
    fn default() -> Self {
        // 3.5" 320x480 ILI9488 panel, mounted upside down.
        AxisConfig {
            min_x: 200,
            max_x: 3800,
            min_y: 150,
            max_y: 3900,
            width: 320,
            height: 480,
            rotation: Rotation::Deg180,
            swap_xy: false,
            invert_x: false,
            invert_y: true,
            apply_rotation: false,
        }
    }
}

impl AxisConfig {
    /// Size of the frame mapped points land in.
    pub fn output_size(&self) -> Size {
        if self.apply_rotation && self.rotation.is_quarter_turn() {
            Size::new(self.height.into(), self.width.into())
        } else {
            Size::new(self.width.into(), self.height.into())
        }
    }

    pub fn map(&self, sample: &RawSample) -> MappedPoint {
        map_sample(sample, self)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MappedPoint {
    pub valid: bool,
    pub x: i16,
    pub y: i16,
    /// Readings as they came off the controller, before any swap.
    pub raw_x: i16,
    pub raw_y: i16,
}

impl MappedPoint {
    pub fn point(&self) -> Option<Point> {
        self.valid
            .then(|| Point::new(self.x.into(), self.y.into()))
    }
}

/// Scales one raw reading onto `0..resolution`.
///
/// A window with `min == max` maps everything to 0. An inverted window
/// (`min > max`) is clamped lower bound first, so readings below `min` land
/// on 0 and everything else on the far edge.
pub fn map_axis(raw: i16, min: i16, max: i16, resolution: u16, invert: bool) -> i16 {
    if min == max {
        return 0;
    }

    let (raw, min, max) = (i64::from(raw), i64::from(min), i64::from(max));
    let last = i64::from(resolution) - 1;

    let clamped = if raw < min {
        min
    } else if raw > max {
        max
    } else {
        raw
    };
    let normalized = clamped - min;
    let span = max - min;
    let mut pixel = (normalized * last) / span;
    if invert {
        pixel = last - pixel;
    }

    pixel.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}

pub fn map_sample(sample: &RawSample, config: &AxisConfig) -> MappedPoint {
    if !sample.is_touching() {
        return MappedPoint::default();
    }

    let (mut rx, mut ry) = (sample.x, sample.y);
    if config.swap_xy {
        core::mem::swap(&mut rx, &mut ry);
    }

    let x = map_axis(rx, config.min_x, config.max_x, config.width, config.invert_x);
    let y = map_axis(ry, config.min_y, config.max_y, config.height, config.invert_y);

    let (x, y) = if config.apply_rotation {
        rotate(x, y, config)
    } else {
        (x, y)
    };

    MappedPoint {
        valid: true,
        x,
        y,
        raw_x: sample.x,
        raw_y: sample.y,
    }
}

/// Turns a point in the unrotated `width x height` frame clockwise by
/// `config.rotation`.
fn rotate(x: i16, y: i16, config: &AxisConfig) -> (i16, i16) {
    let last_x = config.width as i32 - 1;
    let last_y = config.height as i32 - 1;
    let (x, y) = (i32::from(x), i32::from(y));

    let (rx, ry) = match config.rotation {
        Rotation::Deg0 => (x, y),
        Rotation::Deg90 => (last_y - y, x),
        Rotation::Deg180 => (last_x - x, last_y - y),
        Rotation::Deg270 => (y, last_x - x),
    };

    (rx as i16, ry as i16)
}
