use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::mapper::GazeMapper;
use crate::types::{CalibrationOffset, GazeSample, ScreenPoint, ScreenSize};

/// The fixation targets and sampling cadence of one calibration run.
#[derive(Debug, Clone)]
pub struct CalibrationPlan {
    pub points: Vec<ScreenPoint>,
    pub samples_per_point: usize,
    pub sample_delay: Duration,
}

impl CalibrationPlan {
    /// Four corners inset by `margin`, clockwise from top-left, optionally
    /// followed by the screen center.
    pub fn corners(screen: ScreenSize, margin: i32, include_center: bool) -> Vec<ScreenPoint> {
        let mut points = vec![
            ScreenPoint::new(margin, margin),
            ScreenPoint::new(screen.width - margin, margin),
            ScreenPoint::new(screen.width - margin, screen.height - margin),
            ScreenPoint::new(margin, screen.height - margin),
        ];
        if include_center {
            points.push(screen.center());
        }
        points
    }

    pub fn total_samples(&self) -> usize {
        self.points.len() * self.samples_per_point
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStatus {
    Calibrated,
    /// No usable sample arrived; the offset is zero.
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationResult {
    pub offset: CalibrationOffset,
    pub status: CalibrationStatus,
    pub valid_samples: usize,
    pub attempted_samples: usize,
    /// Mean distance between corrected samples and their targets, in pixels.
    pub residual_px: Option<f64>,
}

impl CalibrationResult {
    /// Outcome of a run that produced no usable sample.
    pub fn degraded(attempted_samples: usize) -> Self {
        Self {
            offset: CalibrationOffset::ZERO,
            status: CalibrationStatus::Degraded,
            valid_samples: 0,
            attempted_samples,
            residual_px: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == CalibrationStatus::Degraded
    }
}

/// Runs one calibration pass.
///
/// For every point the `render_hook` is called before each sample so the
/// caller can draw the fixation marker and pump its event queue. Usable
/// samples are mapped with a zero offset and the per-axis difference to the
/// target is averaged. The pause between samples goes through `clock`. The
/// engine keeps no state between runs: the returned offset replaces whatever
/// the caller had before.
pub fn calibrate<S, H>(
    plan: &CalibrationPlan,
    mapper: &GazeMapper,
    clock: &dyn Clock,
    mut sampler: S,
    mut render_hook: H,
) -> CalibrationResult
where
    S: FnMut() -> Option<GazeSample>,
    H: FnMut(ScreenPoint, usize),
{
    let mut sum_dx = 0.0;
    let mut sum_dy = 0.0;
    let mut deltas: Vec<(f64, f64)> = Vec::with_capacity(plan.total_samples());
    let mut attempted = 0;

    for (index, &target) in plan.points.iter().enumerate() {
        for _ in 0..plan.samples_per_point {
            render_hook(target, index);
            attempted += 1;

            if let Some(sample) = sampler().filter(GazeSample::is_usable) {
                let mapped = mapper.map(sample.raw, CalibrationOffset::ZERO);
                let dx = (target.x - mapped.x) as f64;
                let dy = (target.y - mapped.y) as f64;
                sum_dx += dx;
                sum_dy += dy;
                deltas.push((dx, dy));
            }

            clock.sleep(plan.sample_delay);
        }
        debug!(point = index, valid = deltas.len(), "calibration point done");
    }

    if deltas.is_empty() {
        warn!(attempted, "calibration gathered no usable samples, using zero offset");
        return CalibrationResult::degraded(attempted);
    }

    let n = deltas.len() as f64;
    let offset = CalibrationOffset::new(sum_dx / n, sum_dy / n);
    let residual = deltas
        .iter()
        .map(|(dx, dy)| ((dx - offset.x).powi(2) + (dy - offset.y).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    info!(
        valid = deltas.len(),
        attempted,
        "calibration complete: offset ({:.2}, {:.2}), residual {:.1}px",
        offset.x,
        offset.y,
        residual
    );

    CalibrationResult {
        offset,
        status: CalibrationStatus::Calibrated,
        valid_samples: deltas.len(),
        attempted_samples: attempted,
        residual_px: Some(residual),
    }
}
