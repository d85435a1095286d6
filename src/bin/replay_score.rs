use anyhow::{bail, Result};
use chrono::Local;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use gaze_reflex::clock::TestClock;
use gaze_reflex::config::AppConfig;
use gaze_reflex::game::Metrics;
use gaze_reflex::gaze_source::{GazeSource, ReplayGazeSource, SimulatedGazeSource, SimulationProfile};
use gaze_reflex::renderer::HeadlessRenderer;
use gaze_reflex::session::Session;
use gaze_reflex::types::{ScreenSize, ViewportExtent};

/// Scores a recorded gaze trace (or a simulated run) without a window.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Gaze trace: JSON array of samples or nulls, one per tick
    trace: Option<PathBuf>,

    /// Run the simulated tracker for this many frames instead of a trace
    #[arg(long)]
    simulate: Option<usize>,

    #[arg(short, long, default_value = AppConfig::DEFAULT_PATH)]
    config: PathBuf,

    #[arg(long)]
    width: Option<i32>,

    #[arg(long)]
    height: Option<i32>,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Treat the whole trace as gameplay
    #[arg(long, default_value_t = false)]
    skip_calibration: bool,
}

#[derive(Serialize)]
struct CalibrationSummary {
    offset_x: f64,
    offset_y: f64,
    valid_samples: usize,
    attempted_samples: usize,
    degraded: bool,
    residual_px: Option<f64>,
}

#[derive(Serialize)]
struct ScoreReport {
    run_id: String,
    source: String,
    screen: ScreenSize,
    frames: usize,
    calibration: Option<CalibrationSummary>,
    metrics: Metrics,
    reaction_times: Vec<f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = if args.config.exists() {
        AppConfig::load(&args.config)?
    } else {
        AppConfig::default()
    };

    // Calibration pauses run on the test clock, so they cost no real time
    let settings = config.session_settings();

    let width = args.width.unwrap_or(config.ui.screen_width);
    let height = args.height.unwrap_or(config.ui.screen_height);
    if width < 1 || height < 1 {
        warn!("screen size {}x{} is not usable, clamping to at least 1x1", width, height);
    }
    let screen = ScreenSize::new(width.max(1), height.max(1));
    let viewport = ViewportExtent::from_screen(screen);

    // A trace plays one sample per frame until it runs dry
    let (mut source, trace_len): (Box<dyn GazeSource>, Option<usize>) = match (&args.trace, args.simulate) {
        (Some(path), None) => {
            let replay = ReplayGazeSource::from_file(path)?;
            let len = replay.remaining();
            (Box::new(replay), Some(len))
        }
        (None, Some(_)) => (
            Box::new(SimulatedGazeSource::new(viewport, SimulationProfile::default(), args.seed)),
            None,
        ),
        _ => bail!("Pass either a trace file or --simulate <frames>"),
    };

    let clock = Rc::new(TestClock::new());
    let mut session = Session::start(
        source.as_mut(),
        screen,
        viewport,
        settings,
        clock,
        StdRng::seed_from_u64(args.seed),
    );
    let mut renderer = HeadlessRenderer::new(screen);

    let calibration = if args.skip_calibration {
        None
    } else {
        let r = session.calibrate(source.as_mut(), &mut renderer);
        Some(CalibrationSummary {
            offset_x: r.offset.x,
            offset_y: r.offset.y,
            valid_samples: r.valid_samples,
            attempted_samples: r.attempted_samples,
            degraded: r.is_degraded(),
            residual_px: r.residual_px,
        })
    };

    let frames = match trace_len {
        Some(len) => len.saturating_sub(calibration.as_ref().map_or(0, |c| c.attempted_samples)),
        None => args.simulate.unwrap_or(0),
    };
    let mut renderer = renderer.with_max_frames(frames);
    let metrics = session.run(source.as_mut(), &mut renderer)?;

    let report = ScoreReport {
        run_id: Local::now().format("%Y%m%d_%H%M%S").to_string(),
        source: source.name(),
        screen,
        frames: renderer.frames.len(),
        calibration,
        metrics,
        reaction_times: session.game().log().times().to_vec(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    eprintln!("{}", metrics.summary());
    Ok(())
}
