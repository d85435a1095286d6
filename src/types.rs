use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in tracker-native or fractional screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Integer pixel position on the display surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn as_point2(&self) -> Point2 {
        Point2::new(self.x as f64, self.y as f64)
    }
}

/// Display resolution in pixels, queried once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

impl ScreenSize {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.width / 2, self.height / 2)
    }
}

/// The coordinate bounds the tracker declares its gaze points live in.
///
/// `p00` is the top-left corner and `p11` the bottom-right one. A usable
/// extent has `p11` strictly greater than `p00` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportExtent {
    pub p00: Point2,
    pub p11: Point2,
}

impl ViewportExtent {
    pub fn new(p00: Point2, p11: Point2) -> Self {
        Self { p00, p11 }
    }

    /// Extent covering `[0, width] x [0, height]`, the usual declaration
    /// when the tracker reports in display pixels.
    pub fn from_screen(size: ScreenSize) -> Self {
        Self::new(
            Point2::new(0.0, 0.0),
            Point2::new(size.width as f64, size.height as f64),
        )
    }

    pub fn width(&self) -> f64 {
        self.p11.x - self.p00.x
    }

    pub fn height(&self) -> f64 {
        self.p11.y - self.p00.y
    }

    pub fn is_valid(&self) -> bool {
        let (w, h) = (self.width(), self.height());
        w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Lost,
    Ok,
}

/// One reading from a gaze source.
///
/// `timestamp` is `None` when the tracker reports its "no data" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub raw: Point2,
    pub confidence: Confidence,
    pub timestamp: Option<f64>,
}

impl GazeSample {
    pub fn ok(x: f64, y: f64, timestamp: f64) -> Self {
        Self {
            raw: Point2::new(x, y),
            confidence: Confidence::Ok,
            timestamp: Some(timestamp),
        }
    }

    pub fn lost(timestamp: f64) -> Self {
        Self {
            raw: Point2::default(),
            confidence: Confidence::Lost,
            timestamp: Some(timestamp),
        }
    }

    /// Usable samples have tracking confidence and a real timestamp.
    pub fn is_usable(&self) -> bool {
        self.confidence == Confidence::Ok && self.timestamp.is_some() && self.raw.is_finite()
    }
}

/// Additive correction applied after scaling, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationOffset {
    pub x: f64,
    pub y: f64,
}

impl CalibrationOffset {
    pub const ZERO: CalibrationOffset = CalibrationOffset { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Input events the renderer delivers each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    Quit,
    Recalibrate,
    Reveal,
}

/// Whether a gaze source came up at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    Active,
    Unavailable,
}

/// Recoverable conditions the session surfaces instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerNotice {
    TrackerUnavailable,
    CalibrationDegraded,
}

impl fmt::Display for TrainerNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainerNotice::TrackerUnavailable => write!(f, "Tracker unavailable, gaze input disabled"),
            TrainerNotice::CalibrationDegraded => write!(f, "Calibration failed, using zero offset"),
        }
    }
}
