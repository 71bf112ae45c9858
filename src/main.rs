use std::{env, thread};

use log::{error, info, warn};
use touch_panel::{
    sim::{SimulatedLine, SimulatedPanel},
    Settings, TouchApp,
};
use xpt2046::{NoIrq, TouchScreen};

/// Raw ADC corners of the demo drag, inside the default calibration window.
const STROKE_FROM: (u16, u16) = (400, 3700);
const STROKE_TO: (u16, u16) = (3600, 300);
const STROKE_STEPS: u16 = 24;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match env::args_os().nth(1) {
        Some(path) => Settings::load(&path)?,
        None => Settings::default(),
    };
    info!("{settings:#?}");

    if settings.irq_pin.is_some() {
        warn!("Simulated panel has no PENIRQ, polling pressure instead");
    }

    let cs = settings.cs_pin.map(SimulatedLine::new);
    let mut touch: TouchApp<SimulatedPanel, SimulatedLine, NoIrq> =
        TouchApp::from_settings(cs, None, &settings);

    let panel = SimulatedPanel::stroke(STROKE_FROM, STROKE_TO, STROKE_STEPS);
    let ticks = panel.remaining() + 2;
    if touch.init(panel).is_err() {
        error!("Continuing without touch");
    }

    for _ in 0..ticks {
        match touch.get_touch_event() {
            Ok(Some(event)) => info!("{event:?}"),
            Ok(None) => {}
            Err(e) => error!("{e}"),
        }
        thread::sleep(settings.poll_interval());
    }

    Ok(())
}
