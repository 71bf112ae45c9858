use crate::{errors::Error, RawSample, Result};
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use log::{debug, trace, warn};

pub mod spi;
use spi::{BusSettings, TouchBus};

/// Pressure at or below this is treated as noise rather than a finger.
pub const PRESSURE_THRESHOLD: i16 = 120;

/// 12-bit full scale, used to flip Z2 so that firmer contact reads higher.
const FULL_SCALE: i32 = 4095;

/// Control bytes: start bit, channel select, 12-bit differential mode,
/// power-down between conversions.
mod command {
    pub const READ_Y: u8 = 0x90;
    pub const READ_X: u8 = 0xD0;
    pub const READ_Z1: u8 = 0xB0;
    pub const READ_Z2: u8 = 0xC0;
    pub const NOP: u8 = 0x00;
}

/// Stand-in for boards that leave PENIRQ unconnected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIrq;

impl ErrorType for NoIrq {
    type Error = core::convert::Infallible;
}

impl InputPin for NoIrq {
    fn is_high(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(true)
    }

    fn is_low(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(false)
    }
}

/// Polling driver for the XPT2046 resistive touch controller.
///
/// The PENIRQ line, when wired, is only ever sampled for its level. The HAL
/// is expected to hand it over configured as an input with pull-up, and the
/// chip-select line as a push-pull output.
pub struct Xpt2046<BUS, CS, IRQ = NoIrq> {
    bus: Option<BUS>,
    cs: Option<CS>,
    irq: Option<IRQ>,
    settings: BusSettings,
    rotation: u8,
    initialized: bool,
    last_z: i16,
}

impl<BUS, CS, IRQ> Xpt2046<BUS, CS, IRQ>
where
    BUS: TouchBus,
    CS: OutputPin,
    IRQ: InputPin,
{
    pub fn new(cs: Option<CS>, irq: Option<IRQ>) -> Self {
        Self {
            bus: None,
            cs,
            irq,
            settings: BusSettings::default(),
            rotation: 0,
            initialized: false,
            last_z: 0,
        }
    }

    pub fn with_bus_settings(mut self, settings: BusSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Binds the bus and parks chip-select high.
    ///
    /// Without a chip-select line the driver stays disabled for good: every
    /// later read reports "not touching" and never touches the bus.
    pub fn begin(&mut self, bus: BUS) -> Result<()> {
        self.bus = Some(bus);

        let Some(cs) = self.cs.as_mut() else {
            warn!("XPT2046 has no chip-select line, touch disabled");
            return Err(Error::NoChipSelect);
        };
        cs.set_high().map_err(Error::pin)?;

        self.initialized = true;
        debug!(
            "XPT2046 ready ({} Hz, {})",
            self.settings.frequency_hz,
            if self.irq.is_some() { "irq" } else { "polling" }
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Stored for the layers above; the sampler itself ignores it.
    pub fn set_rotation(&mut self, rotation: u8) {
        self.rotation = rotation & 0x03;
    }

    pub fn rotation(&self) -> u8 {
        self.rotation
    }

    /// Pressure derived by the most recent full read.
    pub fn last_pressure(&self) -> i16 {
        self.last_z
    }

    /// With PENIRQ wired this is its live level and costs no bus traffic.
    /// Otherwise it reports the pressure of the last `get_point`, which can
    /// be one poll stale.
    pub fn touched(&mut self) -> Result<bool> {
        if !self.initialized {
            return Ok(false);
        }

        match self.irq.as_mut() {
            Some(irq) => irq.is_low().map_err(Error::pin),
            None => Ok(self.last_z > PRESSURE_THRESHOLD),
        }
    }

    pub fn get_point(&mut self) -> Result<RawSample> {
        if !self.initialized {
            return Ok(RawSample::default());
        }
        let (Some(bus), Some(cs)) = (self.bus.as_mut(), self.cs.as_mut()) else {
            return Ok(RawSample::default());
        };

        if let Some(irq) = self.irq.as_mut() {
            if irq.is_high().map_err(Error::pin)? {
                self.last_z = 0;
                return Ok(RawSample::default());
            }
        }

        let conversions = transact(bus, cs, &self.settings)?;
        let z = conversions.pressure();
        self.last_z = z;

        if z < PRESSURE_THRESHOLD {
            trace!("XPT2046 pressure {z} below threshold");
            return Ok(RawSample::default());
        }

        trace!(
            "XPT2046 x:{} y:{} z:{z}",
            conversions.x,
            conversions.y
        );
        // Conversions are at most 13 bits wide, so they always fit.
        Ok(RawSample::new(
            conversions.x as i16,
            conversions.y as i16,
            z,
        ))
    }

    /// Gives back the bus and lines.
    pub fn release(self) -> (Option<BUS>, Option<CS>, Option<IRQ>) {
        (self.bus, self.cs, self.irq)
    }
}

struct Conversions {
    x: u16,
    y: u16,
    z1: u16,
    z2: u16,
}

impl Conversions {
    fn pressure(&self) -> i16 {
        // Stays within -4096..=12286.
        (i32::from(self.z1) + (FULL_SCALE - i32::from(self.z2))) as i16
    }
}

/// Runs one acquire-select-read-deselect-release cycle. Chip-select and the
/// bus are let go even when a transfer in the middle fails.
fn transact<BUS, CS>(bus: &mut BUS, cs: &mut CS, settings: &BusSettings) -> Result<Conversions>
where
    BUS: TouchBus,
    CS: OutputPin,
{
    bus.begin_transaction(settings).map_err(Error::bus)?;
    if let Err(e) = cs.set_low() {
        let _ = bus.end_transaction();
        return Err(Error::pin(e));
    }

    let conversions = read_conversions(bus);

    let deselected = cs.set_high();
    let released = bus.end_transaction();

    let conversions = conversions.map_err(Error::bus)?;
    deselected.map_err(Error::pin)?;
    released.map_err(Error::bus)?;
    Ok(conversions)
}

fn read_conversions<BUS: TouchBus>(bus: &mut BUS) -> core::result::Result<Conversions, BUS::Error> {
    // First conversion after chip-select comes out of power-down and is junk.
    read_channel(bus, command::READ_Y)?;

    let y = read_channel(bus, command::READ_Y)?;
    let x = read_channel(bus, command::READ_X)?;
    let z1 = read_channel(bus, command::READ_Z1)?;
    let z2 = read_channel(bus, command::READ_Z2)?;

    bus.transfer(command::NOP)?;

    Ok(Conversions { x, y, z1, z2 })
}

/// Result is left-justified across two bytes with three trailing don't-care bits.
fn read_channel<BUS: TouchBus>(bus: &mut BUS, command: u8) -> core::result::Result<u16, BUS::Error> {
    bus.transfer(command)?;
    let high = bus.transfer(command::NOP)?;
    let low = bus.transfer(command::NOP)?;
    Ok(u16::from_be_bytes([high, low]) >> 3)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::{cell::Cell, convert::Infallible};
    use embedded_hal::{digital, spi::ErrorKind};
    use std::{collections::VecDeque, rc::Rc, vec, vec::Vec};

    #[derive(Default)]
    struct ScriptedBus {
        replies: VecDeque<u8>,
        sent: Vec<u8>,
        transactions: usize,
        open: bool,
        last_settings: Option<BusSettings>,
        fail_after: Option<usize>,
    }

    impl ScriptedBus {
        fn with_readings(x: u16, y: u16, z1: u16, z2: u16) -> Self {
            let mut replies = VecDeque::new();
            // settle read, then y, x, z1, z2, then the trailing nop
            for value in [y, y, x, z1, z2] {
                let word = (value << 3) | 0b101;
                let [high, low] = word.to_be_bytes();
                replies.extend([0, high, low]);
            }
            replies.push_back(0);
            Self {
                replies,
                ..Default::default()
            }
        }
    }

    impl TouchBus for ScriptedBus {
        type Error = ErrorKind;

        fn begin_transaction(&mut self, settings: &BusSettings) -> core::result::Result<(), ErrorKind> {
            assert!(!self.open, "nested transaction");
            self.open = true;
            self.transactions += 1;
            self.last_settings = Some(*settings);
            Ok(())
        }

        fn transfer(&mut self, byte: u8) -> core::result::Result<u8, ErrorKind> {
            assert!(self.open, "transfer outside a transaction");
            if self.fail_after == Some(self.sent.len()) {
                return Err(ErrorKind::Overrun);
            }
            self.sent.push(byte);
            Ok(self.replies.pop_front().unwrap_or(0))
        }

        fn end_transaction(&mut self) -> core::result::Result<(), ErrorKind> {
            self.open = false;
            Ok(())
        }
    }

    /// A GPIO whose level is shared with the test body.
    #[derive(Clone, Default)]
    struct Line(Rc<Cell<bool>>);

    impl digital::ErrorType for Line {
        type Error = Infallible;
    }

    impl OutputPin for Line {
        fn set_low(&mut self) -> core::result::Result<(), Infallible> {
            self.0.set(false);
            Ok(())
        }
        fn set_high(&mut self) -> core::result::Result<(), Infallible> {
            self.0.set(true);
            Ok(())
        }
    }

    impl InputPin for Line {
        fn is_high(&mut self) -> core::result::Result<bool, Infallible> {
            Ok(self.0.get())
        }
        fn is_low(&mut self) -> core::result::Result<bool, Infallible> {
            Ok(!self.0.get())
        }
    }

    fn expected_frame() -> Vec<u8> {
        vec![
            0x90, 0, 0, // settle
            0x90, 0, 0, // y
            0xD0, 0, 0, // x
            0xB0, 0, 0, // z1
            0xC0, 0, 0, // z2
            0x00,
        ]
    }

    fn polling(bus: ScriptedBus) -> (Xpt2046<ScriptedBus, Line>, Line) {
        let cs = Line::default();
        let mut touch = Xpt2046::new(Some(cs.clone()), None);
        touch.begin(bus).unwrap();
        (touch, cs)
    }

    #[test]
    fn begin_without_chip_select_disables_driver() {
        let mut touch: Xpt2046<ScriptedBus, Line> = Xpt2046::new(None, None);

        assert_eq!(
            touch.begin(ScriptedBus::with_readings(2000, 2025, 300, 4000)),
            Err(Error::NoChipSelect)
        );
        assert!(!touch.is_initialized());
        assert_eq!(touch.get_point(), Ok(RawSample::default()));
        assert_eq!(touch.touched(), Ok(false));

        let (bus, _, _) = touch.release();
        assert_eq!(bus.unwrap().transactions, 0);
    }

    #[test]
    fn unbound_driver_reports_nothing() {
        let mut touch: Xpt2046<ScriptedBus, Line> = Xpt2046::new(Some(Line::default()), None);

        assert_eq!(touch.get_point(), Ok(RawSample::default()));
        assert_eq!(touch.touched(), Ok(false));
    }

    #[test]
    fn begin_parks_chip_select_high() {
        let (_touch, cs) = polling(ScriptedBus::default());
        assert!(cs.0.get());
    }

    #[test]
    fn full_read_follows_command_sequence() {
        let (mut touch, cs) = polling(ScriptedBus::with_readings(2000, 2025, 300, 4000));

        let sample = touch.get_point().unwrap();

        assert_eq!(sample, RawSample::new(2000, 2025, 395));
        assert_eq!(touch.last_pressure(), 395);
        assert_eq!(touch.touched(), Ok(true));
        assert!(cs.0.get(), "chip-select released after the read");

        let (bus, _, _) = touch.release();
        let bus = bus.unwrap();
        assert_eq!(bus.sent, expected_frame());
        assert_eq!(bus.transactions, 1);
        assert!(!bus.open);
        assert_eq!(bus.last_settings, Some(BusSettings::default()));
    }

    #[test]
    fn light_contact_is_filtered() {
        let (mut touch, _) = polling(ScriptedBus::with_readings(1500, 1500, 10, 4050));

        assert_eq!(touch.get_point(), Ok(RawSample::default()));
        assert_eq!(touch.last_pressure(), 55);
        assert_eq!(touch.touched(), Ok(false));
    }

    #[test]
    fn threshold_pressure_passes_sampler_but_is_not_touching() {
        let (mut touch, _) = polling(ScriptedBus::with_readings(1500, 1600, 120, 4095));

        let sample = touch.get_point().unwrap();
        assert_eq!(sample, RawSample::new(1500, 1600, 120));
        assert!(!sample.is_touching());
        assert_eq!(touch.touched(), Ok(false));
    }

    #[test]
    fn released_irq_skips_the_bus() {
        let irq = Line::default();
        irq.0.set(true);
        let mut touch = Xpt2046::new(Some(Line::default()), Some(irq.clone()));
        touch
            .begin(ScriptedBus::with_readings(2000, 2025, 300, 4000))
            .unwrap();

        assert_eq!(touch.touched(), Ok(false));
        assert_eq!(touch.get_point(), Ok(RawSample::default()));

        let (bus, _, _) = touch.release();
        let bus = bus.unwrap();
        assert_eq!(bus.transactions, 0);
        assert!(bus.sent.is_empty());
    }

    #[test]
    fn irq_release_clears_last_pressure() {
        let irq = Line::default();
        let mut touch = Xpt2046::new(Some(Line::default()), Some(irq.clone()));
        touch
            .begin(ScriptedBus::with_readings(2000, 2025, 300, 4000))
            .unwrap();

        assert_eq!(touch.touched(), Ok(true));
        assert!(touch.get_point().unwrap().is_touching());
        assert_eq!(touch.last_pressure(), 395);

        irq.0.set(true);
        assert_eq!(touch.get_point(), Ok(RawSample::default()));
        assert_eq!(touch.last_pressure(), 0);
    }

    #[test]
    fn rotation_is_masked_to_two_bits() {
        let mut touch: Xpt2046<ScriptedBus, Line> = Xpt2046::new(Some(Line::default()), None);
        touch.set_rotation(6);
        assert_eq!(touch.rotation(), 2);
    }

    #[test]
    fn custom_bus_settings_reach_the_bus() {
        let cs = Line::default();
        let mut touch = Xpt2046::<_, _, NoIrq>::new(Some(cs), None)
            .with_bus_settings(BusSettings::new(1_000_000));
        touch
            .begin(ScriptedBus::with_readings(2000, 2025, 300, 4000))
            .unwrap();
        touch.get_point().unwrap();

        let (bus, _, _) = touch.release();
        assert_eq!(
            bus.unwrap().last_settings.map(|s| s.frequency_hz),
            Some(1_000_000)
        );
    }

    #[test]
    fn bus_failure_still_releases_everything() {
        let mut bus = ScriptedBus::with_readings(2000, 2025, 300, 4000);
        bus.fail_after = Some(7);
        let (mut touch, cs) = polling(bus);

        assert_eq!(touch.get_point(), Err(Error::Bus(ErrorKind::Overrun)));
        assert!(cs.0.get());

        let (bus, _, _) = touch.release();
        assert!(!bus.unwrap().open);
    }
}
