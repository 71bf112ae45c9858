use embedded_graphics::prelude::{Point, Size};
use embedded_hal::digital::{InputPin, OutputPin};
use log::{info, trace, warn};
use xpt2046::{
    map_sample, AxisConfig, MappedPoint, NoIrq, TouchBus, TouchEvent, TouchKind, TouchScreen,
    Xpt2046,
};

use crate::{
    errors::{AppError, Result},
    settings::Settings,
};

/// What the UI's pointer device sees on a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    Released,
    Pressed(Point),
}

/// Everything the touch path needs between polls: the sampler, the axis
/// calibration it is mapped with, and the most recent mapped point.
pub struct TouchApp<BUS, CS, IRQ = NoIrq> {
    touch: Xpt2046<BUS, CS, IRQ>,
    axes: AxisConfig,
    available: bool,
    last_touch: MappedPoint,
    pressed_at: Option<Point>,
}

impl<BUS, CS, IRQ> TouchApp<BUS, CS, IRQ>
where
    BUS: TouchBus,
    CS: OutputPin,
    IRQ: InputPin,
{
    pub fn new(touch: Xpt2046<BUS, CS, IRQ>, axes: AxisConfig) -> Self {
        Self {
            touch,
            axes,
            available: false,
            last_touch: MappedPoint::default(),
            pressed_at: None,
        }
    }

    pub fn from_settings(cs: Option<CS>, irq: Option<IRQ>, settings: &Settings) -> Self {
        let touch = Xpt2046::new(cs, irq).with_bus_settings(settings.bus_settings());
        Self::new(touch, settings.axes)
    }

    /// Brings the controller up. On failure touch stays unavailable and every
    /// poll reports Released; the caller is free to carry on without it.
    pub fn init(&mut self, bus: BUS) -> Result<()> {
        if let Err(e) = self.touch.begin(bus) {
            warn!("Touch init failed: {e}");
            return Err(e.into());
        }
        self.touch.set_rotation(self.axes.rotation.code());
        self.available = true;
        info!(
            "Touch ready: {}x{}, rotation {:?} ({})",
            self.axes.width,
            self.axes.height,
            self.axes.rotation,
            if self.axes.apply_rotation {
                "applied"
            } else {
                "not applied"
            }
        );
        Ok(())
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn axes(&self) -> &AxisConfig {
        &self.axes
    }

    pub fn sampler(&mut self) -> &mut Xpt2046<BUS, CS, IRQ> {
        &mut self.touch
    }

    /// One sample, mapped. Never fails: a bus or line error reads as no touch.
    pub fn read_touch(&mut self) -> MappedPoint {
        if !self.available {
            return MappedPoint::default();
        }

        match self.touch.get_point() {
            Ok(raw) => map_sample(&raw, &self.axes),
            Err(e) => {
                warn!("Touch read failed: {e}");
                MappedPoint::default()
            }
        }
    }

    /// Samples once and records the result for the rest of the tick.
    pub fn poll(&mut self) -> InputState {
        let point = self.read_touch();

        match point.point() {
            Some(pixel) => {
                trace!(
                    "Touch at {},{} (raw {},{})",
                    pixel.x,
                    pixel.y,
                    point.raw_x,
                    point.raw_y
                );
                self.last_touch = point;
                InputState::Pressed(pixel)
            }
            None => {
                self.last_touch.valid = false;
                InputState::Released
            }
        }
    }

    pub fn last_touch(&self) -> &MappedPoint {
        &self.last_touch
    }

    /// Top-left corner that centers a `size` box on the current touch while
    /// keeping it inside the output frame. `None` while nothing is pressed.
    pub fn follow_anchor(&self, size: Size) -> Option<Point> {
        let touch = self.last_touch.point()?;
        let frame = self.axes.output_size();

        let max_x = (frame.width as i32 - size.width as i32).max(0);
        let max_y = (frame.height as i32 - size.height as i32).max(0);

        Some(Point::new(
            (touch.x - size.width as i32 / 2).clamp(0, max_x),
            (touch.y - size.height as i32 / 2).clamp(0, max_y),
        ))
    }
}

impl<BUS, CS, IRQ> TouchScreen for TouchApp<BUS, CS, IRQ>
where
    BUS: TouchBus,
    CS: OutputPin,
    IRQ: InputPin,
{
    type TouchError = AppError;

    fn get_touch_event(&mut self) -> Result<Option<TouchEvent>> {
        match self.poll() {
            InputState::Pressed(point) => {
                let kind = if self.pressed_at.is_some() {
                    TouchKind::Move
                } else {
                    TouchKind::Start
                };
                self.pressed_at = Some(point);

                Ok(Some(TouchEvent { point, kind }))
            }
            InputState::Released => Ok(self.pressed_at.take().map(|point| TouchEvent {
                point,
                kind: TouchKind::End,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Contact, SimulatedLine, SimulatedPanel};

    type SimApp = TouchApp<SimulatedPanel, SimulatedLine>;

    fn app(panel: SimulatedPanel) -> SimApp {
        let mut app = SimApp::from_settings(Some(SimulatedLine::new(4)), None, &Settings::default());
        app.init(panel).unwrap();
        app
    }

    #[test]
    fn missing_chip_select_leaves_touch_unavailable() {
        let mut panel = SimulatedPanel::new();
        panel.push(Some(Contact::press(2000, 2000)));
        let mut app = SimApp::from_settings(None, None, &Settings::default());

        assert!(matches!(
            app.init(panel),
            Err(AppError::Touch(xpt2046::Error::NoChipSelect))
        ));
        assert!(!app.is_available());
        assert_eq!(app.poll(), InputState::Released);
        assert_eq!(app.get_touch_event().unwrap(), None);
    }

    #[test]
    fn init_hands_rotation_to_sampler() {
        let mut app = app(SimulatedPanel::new());
        assert!(app.is_available());
        assert_eq!(app.sampler().rotation(), 2);
    }

    #[test]
    fn poll_maps_and_remembers_touch() {
        let mut panel = SimulatedPanel::new();
        panel.push(Some(Contact::with_pressure(2000, 2025, 200)));
        panel.push(None);
        let mut app = app(panel);

        assert_eq!(app.poll(), InputState::Pressed(Point::new(159, 240)));
        assert_eq!(
            *app.last_touch(),
            MappedPoint {
                valid: true,
                x: 159,
                y: 240,
                raw_x: 2000,
                raw_y: 2025,
            }
        );

        assert_eq!(app.poll(), InputState::Released);
        let last = app.last_touch();
        assert!(!last.valid);
        assert_eq!((last.x, last.y), (159, 240));
    }

    #[test]
    fn events_track_press_drag_release() {
        let mut app = app(SimulatedPanel::stroke((200, 3900), (3800, 150), 2));

        let kinds: Vec<_> = std::iter::from_fn(|| app.get_touch_event().unwrap())
            .map(|event| (event.kind, event.point))
            .collect();

        assert_eq!(
            kinds,
            [
                (TouchKind::Start, Point::new(0, 0)),
                (TouchKind::Move, Point::new(159, 240)),
                (TouchKind::Move, Point::new(319, 479)),
                (TouchKind::End, Point::new(319, 479)),
            ]
        );
    }

    #[test]
    fn idle_panel_produces_no_events() {
        let mut app = app(SimulatedPanel::new());
        for _ in 0..3 {
            assert_eq!(app.get_touch_event().unwrap(), None);
        }
    }

    #[test]
    fn anchor_centres_box_and_stays_on_screen() {
        let mut panel = SimulatedPanel::new();
        panel.push(Some(Contact::with_pressure(2000, 2025, 200)));
        panel.push(Some(Contact::press(200, 3900)));
        panel.push(None);
        let mut app = app(panel);
        let size = Size::new(200, 200);

        app.poll();
        assert_eq!(app.follow_anchor(size), Some(Point::new(59, 140)));

        // Top-left corner of the panel pins the box to the origin.
        app.poll();
        assert_eq!(app.follow_anchor(size), Some(Point::new(0, 0)));

        app.poll();
        assert_eq!(app.follow_anchor(size), None);
    }

    #[test]
    fn oversized_box_pins_to_origin() {
        let mut panel = SimulatedPanel::new();
        panel.push(Some(Contact::press(3800, 150)));
        let mut app = app(panel);

        app.poll();
        assert_eq!(app.follow_anchor(Size::new(1000, 1000)), Some(Point::new(0, 0)));
    }
}
