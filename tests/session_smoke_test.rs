use std::rc::Rc;
use std::time::Duration;

use gaze_reflex::clock::TestClock;
use gaze_reflex::game::TargetEvent;
use gaze_reflex::gaze_source::{
    GazeSource, ReplayGazeSource, SimulatedGazeSource, SimulationProfile,
};
use gaze_reflex::renderer::HeadlessRenderer;
use gaze_reflex::session::{Session, SessionSettings};
use gaze_reflex::types::{
    GazeSample, InputEvent, Point2, ScreenPoint, ScreenSize, TrackerStatus, ViewportExtent,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn screen() -> ScreenSize {
    ScreenSize::new(1920, 1080)
}

fn fast_settings() -> SessionSettings {
    SessionSettings {
        sample_delay: Duration::ZERO,
        samples_per_point: 4,
        ..SessionSettings::default()
    }
}

#[test]
fn gaze_on_target_hits_on_first_tick() {
    let clock = Rc::new(TestClock::new());
    let mut source = ReplayGazeSource::new(vec![Some(GazeSample::ok(500.0, 500.0, 0.0))]);
    let mut session = Session::start(
        &mut source,
        screen(),
        ViewportExtent::from_screen(screen()),
        fast_settings(),
        clock.clone(),
        StdRng::seed_from_u64(3),
    );
    assert_eq!(session.tracker(), TrackerStatus::Active);
    session.game_mut().place_target(ScreenPoint::new(500, 500), 0.0);

    clock.advance(Duration::from_millis(420));
    let outcome = session.step(&mut source);
    assert_eq!(outcome.cursor, Some(ScreenPoint::new(500, 500)));
    match outcome.event {
        Some(TargetEvent::Hit { reaction, next }) => {
            assert!((reaction - 0.42).abs() < 1e-9);
            assert!(next.x >= 30 && next.x <= 1890);
            assert!(next.y >= 30 && next.y <= 1050);
        }
        other => panic!("expected a hit, got {:?}", other),
    }
    assert_eq!(session.game().log().count(), 1);
    assert!(session.game().target().visible);
}

#[test]
fn calibrated_simulation_scores_hits() {
    let clock = Rc::new(TestClock::new());
    let viewport = ViewportExtent::from_screen(screen());
    let profile = SimulationProfile {
        jitter: 0.0,
        follow_rate: 1.0,
        outage_period: 0,
        ..SimulationProfile::default()
    };
    let mut source = SimulatedGazeSource::new(viewport, profile, 9);
    let mut session = Session::start(
        &mut source,
        screen(),
        viewport,
        fast_settings(),
        clock.clone(),
        StdRng::seed_from_u64(9),
    );

    let mut renderer = HeadlessRenderer::new(screen());
    let result = session.calibrate(&mut source, &mut renderer);
    assert!(!result.is_degraded());
    assert_eq!(result.valid_samples, 20);
    assert!((result.offset.x + 35.0).abs() <= 1.0, "offset {:?}", result.offset);
    assert!((result.offset.y - 20.0).abs() <= 1.0, "offset {:?}", result.offset);

    let mut renderer = renderer.with_max_frames(120);
    let metrics = session.run(&mut source, &mut renderer).unwrap();
    assert_eq!(renderer.frames.len(), 120);
    // Once the smoothing window fills with the new position the cursor sits
    // exactly on the target, so every target falls within ten ticks
    assert!(metrics.count >= 10, "only {} hits", metrics.count);
    assert_eq!(metrics.timeouts, 0);
    assert!(metrics.best.is_some());
}

#[test]
fn uncalibrated_bias_misses_a_small_target() {
    let clock = Rc::new(TestClock::new());
    let viewport = ViewportExtent::from_screen(screen());
    let profile = SimulationProfile {
        bias: Point2::new(80.0, 0.0),
        jitter: 0.0,
        follow_rate: 1.0,
        outage_period: 0,
        outage_len: 0,
    };
    let mut source = SimulatedGazeSource::new(viewport, profile, 1);
    let mut session = Session::start(
        &mut source,
        screen(),
        viewport,
        fast_settings(),
        clock,
        StdRng::seed_from_u64(1),
    );
    session.game_mut().place_target(ScreenPoint::new(900, 500), 0.0);

    let mut renderer = HeadlessRenderer::new(screen()).with_max_frames(60);
    let metrics = session.run(&mut source, &mut renderer).unwrap();
    assert_eq!(metrics.count, 0);
    assert!(renderer.frames.iter().all(|f| f.cursor.is_some()));
}

#[test]
fn replay_trace_file_drives_a_session() {
    let dir = std::env::temp_dir().join(format!("gaze_reflex_trace_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("trace.json");

    let mut trace: Vec<Option<GazeSample>> = vec![None; 5];
    trace.extend(std::iter::repeat(Some(GazeSample::ok(1000.0, 600.0, 1.0))).take(5));
    std::fs::write(&path, serde_json::to_string(&trace).unwrap()).unwrap();

    let mut source = ReplayGazeSource::from_file(&path).unwrap();
    assert_eq!(source.remaining(), 10);
    assert!(source.name().contains("trace.json"));

    let clock = Rc::new(TestClock::new());
    let mut session = Session::start(
        &mut source,
        screen(),
        ViewportExtent::from_screen(screen()),
        fast_settings(),
        clock,
        StdRng::seed_from_u64(5),
    );
    session.game_mut().place_target(ScreenPoint::new(1000, 600), 0.0);

    let mut renderer = HeadlessRenderer::new(screen()).with_event(9, InputEvent::Quit);
    let metrics = session.run(&mut source, &mut renderer).unwrap();

    assert_eq!(renderer.frames.len(), 9);
    assert!(renderer.frames[..5].iter().all(|f| f.cursor.is_none()));
    assert_eq!(renderer.frames[5].cursor, Some(ScreenPoint::new(1000, 600)));
    assert_eq!(metrics.count, 1);
    assert_eq!(renderer.frames[5].metrics.count, 1);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_trace_file_is_an_error() {
    let err = ReplayGazeSource::from_file(std::path::Path::new("/nonexistent/trace.json"))
        .err()
        .expect("should fail");
    assert!(format!("{:#}", err).contains("Failed to open gaze trace"));
}
