use anyhow::Result;
use rand::Rng;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::calibration::{calibrate, CalibrationPlan, CalibrationResult};
use crate::clock::{Clock, FramePacer};
use crate::game::{GameSettings, Metrics, TargetEvent, TargetGameLoop};
use crate::gaze_source::GazeSource;
use crate::mapper::GazeMapper;
use crate::renderer::{CalibrationView, FrameView, Renderer};
use crate::types::{
    CalibrationOffset, InputEvent, ScreenPoint, ScreenSize, TrackerStatus, TrainerNotice,
    ViewportExtent,
};

/// Parameters fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub calibration_margin: i32,
    pub include_center: bool,
    pub samples_per_point: usize,
    pub sample_delay: Duration,
    pub game: GameSettings,
    pub smoothing_window: usize,
    pub frame_rate: u32,
    pub timer_warning: f64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            calibration_margin: 50,
            include_center: true,
            samples_per_point: 15,
            sample_delay: Duration::from_millis(50),
            game: GameSettings::default(),
            smoothing_window: 10,
            frame_rate: 60,
            timer_warning: 2.0,
        }
    }
}

/// Result of one gameplay tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub cursor: Option<ScreenPoint>,
    pub event: Option<TargetEvent>,
}

/// All mutable state of a training session: calibration offset, smoothing
/// history, target and reaction log. Every mutation happens through this
/// object on the caller's thread.
pub struct Session<R: Rng> {
    settings: SessionSettings,
    clock: Rc<dyn Clock>,
    mapper: GazeMapper,
    offset: CalibrationOffset,
    game: TargetGameLoop<R>,
    tracker: TrackerStatus,
    notice: Option<TrainerNotice>,
    last_calibration: Option<CalibrationResult>,
    cursor: Option<ScreenPoint>,
    quit_requested: bool,
}

impl<R: Rng> Session<R> {
    pub fn new(
        screen: ScreenSize,
        viewport: ViewportExtent,
        settings: SessionSettings,
        tracker: TrackerStatus,
        clock: Rc<dyn Clock>,
        rng: R,
    ) -> Self {
        let now = clock.now();
        let mapper = GazeMapper::new(viewport, screen, settings.smoothing_window);
        let game = TargetGameLoop::new(screen, settings.game, rng, now);
        let notice = match tracker {
            TrackerStatus::Active => None,
            TrackerStatus::Unavailable => Some(TrainerNotice::TrackerUnavailable),
        };
        Self {
            settings,
            clock,
            mapper,
            offset: CalibrationOffset::ZERO,
            game,
            tracker,
            notice,
            last_calibration: None,
            cursor: None,
            quit_requested: false,
        }
    }

    /// Starts `source` and builds a session around the outcome.
    pub fn start(
        source: &mut dyn GazeSource,
        screen: ScreenSize,
        viewport: ViewportExtent,
        settings: SessionSettings,
        clock: Rc<dyn Clock>,
        rng: R,
    ) -> Self {
        let tracker = if source.start() {
            info!("Gaze source ready: {}", source.name());
            TrackerStatus::Active
        } else {
            warn!("Gaze source unavailable: {}", source.name());
            TrackerStatus::Unavailable
        };
        Self::new(screen, viewport, settings, tracker, clock, rng)
    }

    pub fn offset(&self) -> CalibrationOffset {
        self.offset
    }

    pub fn tracker(&self) -> TrackerStatus {
        self.tracker
    }

    pub fn notice(&self) -> Option<TrainerNotice> {
        self.notice
    }

    pub fn last_calibration(&self) -> Option<&CalibrationResult> {
        self.last_calibration.as_ref()
    }

    pub fn game(&self) -> &TargetGameLoop<R> {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut TargetGameLoop<R> {
        &mut self.game
    }

    pub fn mapper(&self) -> &GazeMapper {
        &self.mapper
    }

    pub fn cursor(&self) -> Option<ScreenPoint> {
        self.cursor
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn metrics(&self) -> Metrics {
        self.game.metrics()
    }

    pub fn calibration_plan(&self) -> CalibrationPlan {
        CalibrationPlan {
            points: CalibrationPlan::corners(
                self.mapper.screen(),
                self.settings.calibration_margin,
                self.settings.include_center,
            ),
            samples_per_point: self.settings.samples_per_point,
            sample_delay: self.settings.sample_delay,
        }
    }

    /// Runs calibration interactively and installs the new offset.
    ///
    /// The previous offset is discarded, the smoothing history is cleared and
    /// the target timer restarts so the time spent calibrating is not scored.
    /// A quit seen while calibrating is remembered for the main loop. Without
    /// a tracker there is nothing to sample and the run ends degraded at once.
    pub fn calibrate(
        &mut self,
        source: &mut dyn GazeSource,
        renderer: &mut dyn Renderer,
    ) -> CalibrationResult {
        if self.tracker == TrackerStatus::Unavailable {
            warn!("no gaze source, skipping calibration");
            let result = CalibrationResult::degraded(0);
            self.install_calibration(result);
            return result;
        }

        let plan = self.calibration_plan();
        let total = plan.points.len();
        let fixation: Cell<Option<ScreenPoint>> = Cell::new(None);
        let mut quit = false;

        info!(points = total, samples = plan.samples_per_point, "calibration started");

        let result = calibrate(
            &plan,
            &self.mapper,
            self.clock.as_ref(),
            || {
                source.focus_hint(fixation.get());
                source.poll()
            },
            |point, index| {
                fixation.set(Some(point));
                if let Err(e) = renderer.draw_calibration(&CalibrationView { point, index, total }) {
                    warn!("calibration frame failed: {:#}", e);
                }
                if renderer.poll_events().contains(&InputEvent::Quit) {
                    quit = true;
                }
            },
        );

        self.install_calibration(result);
        if quit {
            self.quit_requested = true;
        }
        result
    }

    /// Replaces the offset with `result`'s and resets dependent state.
    pub fn install_calibration(&mut self, result: CalibrationResult) {
        self.offset = result.offset;
        self.mapper.reset_history();
        self.cursor = None;
        self.notice = if self.tracker == TrackerStatus::Unavailable {
            Some(TrainerNotice::TrackerUnavailable)
        } else if result.is_degraded() {
            Some(TrainerNotice::CalibrationDegraded)
        } else {
            None
        };
        self.game.restart_timer(self.clock.now());
        self.last_calibration = Some(result);
    }

    /// Applies the non-calibration input events of one tick.
    pub fn handle_events(&mut self, events: &[InputEvent]) {
        for event in events {
            match event {
                InputEvent::Quit => self.quit_requested = true,
                InputEvent::Reveal => {
                    debug!("manual reveal");
                    self.game.reveal(self.clock.now());
                }
                InputEvent::Recalibrate => {}
            }
        }
    }

    /// Polls one sample, updates the cursor and advances the game.
    ///
    /// A missing or unusable sample leaves the cursor undrawn and skips the
    /// hit test; the timeout still advances.
    pub fn step(&mut self, source: &mut dyn GazeSource) -> TickOutcome {
        let now = self.clock.now();
        let cursor = if self.tracker == TrackerStatus::Active {
            let target = self.game.target();
            source.focus_hint(target.visible.then_some(target.position));
            let sample = source.poll();
            if !source.is_alive() {
                self.mark_tracker_lost(source.name());
            }
            sample
                .filter(|s| s.is_usable())
                .map(|s| self.mapper.track(s.raw, self.offset))
        } else {
            None
        };
        self.cursor = cursor;
        let event = self.game.update(cursor, now);
        TickOutcome { cursor, event }
    }

    /// The source stopped for good: gaze input is off for the rest of the
    /// session.
    fn mark_tracker_lost(&mut self, name: String) {
        warn!("gaze source lost: {}", name);
        self.tracker = TrackerStatus::Unavailable;
        self.notice = Some(TrainerNotice::TrackerUnavailable);
    }

    pub fn frame_view(&self, source_name: &str) -> FrameView {
        let target = *self.game.target();
        FrameView {
            cursor: self.cursor,
            trail: self.mapper.history().iter().copied().collect(),
            target,
            target_elapsed: target.elapsed(self.clock.now()),
            target_timeout: self.settings.game.target_timeout,
            timer_warning: self.settings.timer_warning,
            metrics: self.game.metrics(),
            tracker: self.tracker,
            notice: self.notice,
            source_name: source_name.to_string(),
        }
    }

    /// The frame loop. Returns the final metrics once the renderer closes or
    /// a quit event arrives.
    pub fn run(
        &mut self,
        source: &mut dyn GazeSource,
        renderer: &mut dyn Renderer,
    ) -> Result<Metrics> {
        let mut pacer = FramePacer::new(self.settings.frame_rate);
        let source_name = source.name();

        while renderer.is_open() && !self.quit_requested {
            let events = renderer.poll_events();
            self.handle_events(&events);
            if self.quit_requested {
                break;
            }
            if events.contains(&InputEvent::Recalibrate) {
                info!("recalibration requested");
                self.calibrate(source, renderer);
                if self.quit_requested {
                    break;
                }
            }

            self.step(source);
            renderer.draw_frame(&self.frame_view(&source_name))?;
            pacer.wait(self.clock.as_ref());
        }

        Ok(self.game.metrics())
    }
}
