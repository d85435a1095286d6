use anyhow::Result;

use crate::game::{Metrics, Target};
use crate::types::{InputEvent, ScreenPoint, ScreenSize, TrackerStatus, TrainerNotice};

/// Everything needed to draw one gameplay frame.
#[derive(Debug, Clone)]
pub struct FrameView {
    /// `None` when no usable sample arrived this tick.
    pub cursor: Option<ScreenPoint>,
    /// Smoothing history, oldest first.
    pub trail: Vec<ScreenPoint>,
    pub target: Target,
    /// Seconds since the target was shown.
    pub target_elapsed: f64,
    pub target_timeout: f64,
    /// Elapsed time after which the countdown ring is drawn.
    pub timer_warning: f64,
    pub metrics: Metrics,
    pub tracker: TrackerStatus,
    pub notice: Option<TrainerNotice>,
    pub source_name: String,
}

/// A fixation marker shown while calibrating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationView {
    pub point: ScreenPoint,
    pub index: usize,
    pub total: usize,
}

/// The display surface and its input queue.
pub trait Renderer {
    /// Fixed for the lifetime of the session.
    fn screen_size(&self) -> ScreenSize;

    fn is_open(&self) -> bool;

    fn poll_events(&mut self) -> Vec<InputEvent>;

    fn draw_calibration(&mut self, view: &CalibrationView) -> Result<()>;

    fn draw_frame(&mut self, frame: &FrameView) -> Result<()>;
}

// =========================================================================
// Headless renderer for tests and replays
// =========================================================================

/// Summary of one drawn frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub cursor: Option<ScreenPoint>,
    pub target: Target,
    pub metrics: Metrics,
}

/// Renderer without a window: delivers scripted events keyed by frame
/// number and records what it was asked to draw.
pub struct HeadlessRenderer {
    size: ScreenSize,
    script: Vec<(usize, InputEvent)>,
    max_frames: Option<usize>,
    pub frames: Vec<FrameRecord>,
    pub calibration_draws: Vec<CalibrationView>,
}

impl HeadlessRenderer {
    pub fn new(size: ScreenSize) -> Self {
        Self {
            size,
            script: Vec::new(),
            max_frames: None,
            frames: Vec::new(),
            calibration_draws: Vec::new(),
        }
    }

    /// Delivers `event` on the first poll after `frame` frames were drawn.
    pub fn with_event(mut self, frame: usize, event: InputEvent) -> Self {
        self.script.push((frame, event));
        self
    }

    /// Closes the surface once `frames` frames were drawn.
    pub fn with_max_frames(mut self, frames: usize) -> Self {
        self.max_frames = Some(frames);
        self
    }
}

impl Renderer for HeadlessRenderer {
    fn screen_size(&self) -> ScreenSize {
        self.size
    }

    fn is_open(&self) -> bool {
        self.max_frames.map_or(true, |max| self.frames.len() < max)
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        let drawn = self.frames.len();
        let (due, pending): (Vec<_>, Vec<_>) = self.script.drain(..).partition(|(f, _)| *f <= drawn);
        self.script = pending;
        due.into_iter().map(|(_, e)| e).collect()
    }

    fn draw_calibration(&mut self, view: &CalibrationView) -> Result<()> {
        self.calibration_draws.push(*view);
        Ok(())
    }

    fn draw_frame(&mut self, frame: &FrameView) -> Result<()> {
        self.frames.push(FrameRecord {
            cursor: frame.cursor,
            target: frame.target,
            metrics: frame.metrics,
        });
        Ok(())
    }
}
