use anyhow::{bail, Result};
use clap::Parser;
use colored::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gaze_reflex::args::Args;
use gaze_reflex::bridge::ProcessGazeSource;
use gaze_reflex::clock::{Clock, SystemClock};
use gaze_reflex::config::{AppConfig, TrackerConfig};
use gaze_reflex::gaze_source::{
    GazeSource, NullGazeSource, PointerGazeSource, PointerSlot, ReplayGazeSource,
    SimulatedGazeSource, SimulationProfile,
};
use gaze_reflex::output::WindowOutput;
use gaze_reflex::renderer::Renderer;
use gaze_reflex::session::Session;
use gaze_reflex::types::{ScreenSize, TrackerStatus, ViewportExtent};

fn create_source(tracker: &TrackerConfig, viewport: ViewportExtent, pointer: PointerSlot) -> Result<Box<dyn GazeSource>> {
    let source: Box<dyn GazeSource> = match tracker.source.as_str() {
        "pointer" | "mouse" => Box::new(PointerGazeSource::new(pointer)),
        "simulated" => Box::new(SimulatedGazeSource::new(
            viewport,
            SimulationProfile::default(),
            tracker.seed.unwrap_or(0),
        )),
        "replay" => match &tracker.replay_path {
            Some(path) => Box::new(ReplayGazeSource::from_file(Path::new(path))?),
            None => bail!("The replay source needs a trace file (--replay <path>)"),
        },
        "bridge" => Box::new(ProcessGazeSource::new(&tracker.bridge_command)),
        "none" => Box::new(NullGazeSource),
        other => bail!("Unknown gaze source '{}'", other),
    };
    Ok(source)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    // 0. Config, with CLI overrides
    let mut config = AppConfig::load(&args.config)?;
    args.apply(&mut config);
    let settings = config.session_settings();

    // 1. Display surface; its size is fixed for the session
    let pointer: PointerSlot = Rc::new(Cell::new(None));
    let requested = ScreenSize::new(config.ui.screen_width, config.ui.screen_height);
    let mut window = WindowOutput::new(
        "Gaze Reflex",
        requested,
        settings.frame_rate,
        &config.ui.font_family,
        config.ui.font_size_pt,
    )?
    .with_pointer(pointer.clone())
    .with_trail(config.ui.show_trail);
    let screen = window.screen_size();
    println!("{}", format!("Display: {}x{}", screen.width, screen.height).green());

    // 2. Gaze source, declared over the display resolution
    let viewport = ViewportExtent::from_screen(screen);
    let mut source = create_source(&config.tracker, viewport, pointer)?;

    let rng = match config.tracker.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let clock: Rc<dyn Clock> = Rc::new(SystemClock::new());
    let mut session = Session::start(source.as_mut(), screen, viewport, settings, clock, rng);

    match session.tracker() {
        TrackerStatus::Active => println!("{}", format!("Gaze source: {}", source.name()).green()),
        TrackerStatus::Unavailable => println!("{}", format!("Gaze source unavailable: {}", source.name()).red()),
    }
    println!("Controls: [Space] Show target  [R] Recalibrate  [Esc] Quit");

    // 3. Calibrate, then play
    if session.tracker() == TrackerStatus::Active && !args.skip_calibration {
        let result = session.calibrate(source.as_mut(), &mut window);
        if result.is_degraded() {
            println!("{}", "Calibration failed - using zero offset".yellow());
        }
    }

    let metrics = session.run(source.as_mut(), &mut window)?;

    let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    info!("session ended: {}", metrics.summary());
    println!("{}", format!("[{}] {}", stamp, metrics.summary()).cyan());
    Ok(())
}
