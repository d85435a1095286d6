use std::collections::VecDeque;

use crate::types::{CalibrationOffset, Point2, ScreenPoint, ScreenSize, ViewportExtent};

/// Maps a raw tracker point to a pixel on screen.
///
/// The point is normalized by the viewport extent, scaled to the screen,
/// shifted by `offset`, truncated and clamped to `[0, size - 1]`. A degenerate
/// viewport or a non-finite point lands on the screen center.
pub fn map_to_screen(
    raw: Point2,
    viewport: &ViewportExtent,
    screen: ScreenSize,
    offset: CalibrationOffset,
) -> ScreenPoint {
    if !viewport.is_valid() || !raw.is_finite() || screen.width <= 0 || screen.height <= 0 {
        return screen.center();
    }

    // Scale before dividing so whole-pixel inputs on a same-sized viewport
    // come back exact
    let sx = (raw.x - viewport.p00.x) * screen.width as f64 / viewport.width();
    let sy = (raw.y - viewport.p00.y) * screen.height as f64 / viewport.height();

    let gx = (sx + offset.x) as i64;
    let gy = (sy + offset.y) as i64;

    ScreenPoint::new(
        gx.clamp(0, screen.width as i64 - 1) as i32,
        gy.clamp(0, screen.height as i64 - 1) as i32,
    )
}

/// Fixed-capacity FIFO of recent cursor positions.
pub struct GazeHistory {
    points: VecDeque<ScreenPoint>,
    capacity: usize,
}

impl GazeHistory {
    /// A capacity of zero is treated as one (no averaging).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, point: ScreenPoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Arithmetic mean of the buffered points, truncated to whole pixels.
    pub fn mean(&self) -> Option<ScreenPoint> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
        Some(ScreenPoint::new((sx / n) as i32, (sy / n) as i32))
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ScreenPoint> {
        self.points.iter()
    }
}

/// Screen projection plus the rolling smoothing window.
pub struct GazeMapper {
    viewport: ViewportExtent,
    screen: ScreenSize,
    history: GazeHistory,
}

impl GazeMapper {
    pub fn new(viewport: ViewportExtent, screen: ScreenSize, smoothing_window: usize) -> Self {
        Self {
            viewport,
            screen,
            history: GazeHistory::new(smoothing_window),
        }
    }

    pub fn viewport(&self) -> &ViewportExtent {
        &self.viewport
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    /// Unsmoothed mapping.
    pub fn map(&self, raw: Point2, offset: CalibrationOffset) -> ScreenPoint {
        map_to_screen(raw, &self.viewport, self.screen, offset)
    }

    /// Maps `raw`, records it in the history and returns the smoothed cursor.
    pub fn track(&mut self, raw: Point2, offset: CalibrationOffset) -> ScreenPoint {
        let mapped = self.map(raw, offset);
        self.history.push(mapped);
        self.history.mean().unwrap_or(mapped)
    }

    pub fn history(&self) -> &GazeHistory {
        &self.history
    }

    /// Called whenever the offset is replaced.
    pub fn reset_history(&mut self) {
        self.history.clear();
    }
}
