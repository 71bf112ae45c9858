use std::{fs, path::Path, time::Duration};

use crate::errors::{AppError, Result};
use derivative::Derivative;
use xpt2046::{AxisConfig, BusSettings};

use serde_derive::{Deserialize, Serialize};

/// Board wiring and touch calibration, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Derivative)]
#[derivative(Default)]
pub struct Settings {
    pub axes: AxisConfig,
    #[derivative(Default(value = "Some(4)"))]
    pub cs_pin: Option<u8>,
    /// `None` polls pressure over the bus instead of watching PENIRQ.
    pub irq_pin: Option<u8>,
    #[derivative(Default(value = "xpt2046::DEFAULT_FREQUENCY_HZ"))]
    pub bus_frequency_hz: u32,
    #[derivative(Default(value = "5"))]
    pub poll_interval_ms: u32,
}

impl Settings {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let settings: Settings = postcard::from_bytes(bytes)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Equal min/max on an axis is let through, that axis just maps to 0.
    pub fn validate(&self) -> Result<()> {
        let axes = &self.axes;
        if axes.width == 0 || axes.height == 0 {
            return Err(AppError::InvalidConfig("output resolution must be non-zero"));
        }
        if axes.min_x > axes.max_x {
            return Err(AppError::InvalidConfig("raw X window is inverted"));
        }
        if axes.min_y > axes.max_y {
            return Err(AppError::InvalidConfig("raw Y window is inverted"));
        }
        if self.bus_frequency_hz == 0 {
            return Err(AppError::InvalidConfig("bus frequency must be non-zero"));
        }
        Ok(())
    }

    pub fn bus_settings(&self) -> BusSettings {
        BusSettings::new(self.bus_frequency_hz)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.into())
    }
}
