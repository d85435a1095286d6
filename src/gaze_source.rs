use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::Cell;
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;
use tracing::info;

use crate::types::{GazeSample, Point2, ScreenPoint, ViewportExtent};

/// Anything that can deliver gaze samples to the trainer.
///
/// `poll` must never block: it returns `None` when there is nothing new.
pub trait GazeSource {
    fn name(&self) -> String;

    /// Attempts to bring the device up. `false` means the source is
    /// unavailable and will only ever return `None`.
    fn start(&mut self) -> bool;

    fn poll(&mut self) -> Option<GazeSample>;

    /// Where the user is expected to look right now. Real trackers ignore
    /// this; synthetic sources use it to aim.
    fn focus_hint(&mut self, _point: Option<ScreenPoint>) {}

    /// `false` once the source has stopped for good and will never deliver
    /// another sample.
    fn is_alive(&self) -> bool {
        true
    }
}

/// Stand-in when no tracker is present.
pub struct NullGazeSource;

impl GazeSource for NullGazeSource {
    fn name(&self) -> String {
        "none".to_string()
    }

    fn start(&mut self) -> bool {
        false
    }

    fn poll(&mut self) -> Option<GazeSample> {
        None
    }
}

// =========================================================================
// Simulated tracker: chases the focus hint with bias, jitter and dropouts
// =========================================================================
#[derive(Debug, Clone, Copy)]
pub struct SimulationProfile {
    /// Systematic error in tracker units, the thing calibration removes.
    pub bias: Point2,
    /// Peak uniform noise per axis in tracker units.
    pub jitter: f64,
    /// Fraction of the remaining distance covered per poll.
    pub follow_rate: f64,
    /// Every `outage_period` polls, the last `outage_len` report lost tracking.
    pub outage_period: u32,
    pub outage_len: u32,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            bias: Point2::new(35.0, -20.0),
            jitter: 6.0,
            follow_rate: 0.2,
            outage_period: 240,
            outage_len: 12,
        }
    }
}

pub struct SimulatedGazeSource {
    viewport: ViewportExtent,
    profile: SimulationProfile,
    rng: StdRng,
    position: Point2,
    focus: Option<Point2>,
    polls: u32,
    started: bool,
}

impl SimulatedGazeSource {
    /// `viewport` is the tracker space; focus hints in screen pixels are
    /// assumed to share it. Swapped corners are put back in order.
    pub fn new(viewport: ViewportExtent, profile: SimulationProfile, seed: u64) -> Self {
        let viewport = ViewportExtent::new(
            Point2::new(viewport.p00.x.min(viewport.p11.x), viewport.p00.y.min(viewport.p11.y)),
            Point2::new(viewport.p00.x.max(viewport.p11.x), viewport.p00.y.max(viewport.p11.y)),
        );
        let center = Point2::new(
            viewport.p00.x + viewport.width() / 2.0,
            viewport.p00.y + viewport.height() / 2.0,
        );
        Self {
            viewport,
            profile,
            rng: StdRng::seed_from_u64(seed),
            position: center,
            focus: None,
            polls: 0,
            started: false,
        }
    }

    fn in_outage(&self) -> bool {
        let period = self.profile.outage_period;
        period > 0 && self.polls % period >= period.saturating_sub(self.profile.outage_len)
    }
}

impl GazeSource for SimulatedGazeSource {
    fn name(&self) -> String {
        "Simulated Gaze".to_string()
    }

    fn start(&mut self) -> bool {
        self.started = true;
        true
    }

    fn poll(&mut self) -> Option<GazeSample> {
        if !self.started {
            return None;
        }
        self.polls += 1;
        let timestamp = self.polls as f64 / 60.0;

        if let Some(focus) = self.focus {
            let rate = self.profile.follow_rate.clamp(0.0, 1.0);
            self.position.x += (focus.x - self.position.x) * rate;
            self.position.y += (focus.y - self.position.y) * rate;
        }

        if self.in_outage() {
            return Some(GazeSample::lost(timestamp));
        }

        let j = self.profile.jitter.abs();
        let (nx, ny) = if j > 0.0 {
            (self.rng.gen_range(-j..=j), self.rng.gen_range(-j..=j))
        } else {
            (0.0, 0.0)
        };
        // max/min rather than clamp: a NaN corner must not panic
        let vp = &self.viewport;
        let x = (self.position.x + self.profile.bias.x + nx).max(vp.p00.x).min(vp.p11.x);
        let y = (self.position.y + self.profile.bias.y + ny).max(vp.p00.y).min(vp.p11.y);
        Some(GazeSample::ok(x, y, timestamp))
    }

    fn focus_hint(&mut self, point: Option<ScreenPoint>) {
        self.focus = point.map(|p| p.as_point2());
    }
}

// =========================================================================
// Replay: recorded samples, one per poll
// =========================================================================
pub struct ReplayGazeSource {
    label: String,
    samples: VecDeque<Option<GazeSample>>,
    started: bool,
}

impl ReplayGazeSource {
    pub fn new(samples: Vec<Option<GazeSample>>) -> Self {
        Self {
            label: "Replay".to_string(),
            samples: samples.into(),
            started: false,
        }
    }

    /// Reads a JSON array where each entry is a sample or `null` (a tick
    /// without data).
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open gaze trace {}", path.display()))?;
        let samples: Vec<Option<GazeSample>> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse gaze trace {}", path.display()))?;
        info!(samples = samples.len(), "loaded gaze trace {}", path.display());
        let mut source = Self::new(samples);
        source.label = format!("Replay ({})", path.display());
        Ok(source)
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl GazeSource for ReplayGazeSource {
    fn name(&self) -> String {
        self.label.clone()
    }

    fn start(&mut self) -> bool {
        self.started = !self.samples.is_empty();
        self.started
    }

    fn poll(&mut self) -> Option<GazeSample> {
        if !self.started {
            return None;
        }
        self.samples.pop_front().flatten()
    }
}

// =========================================================================
// Pointer: mouse position written by the window, read as gaze
// =========================================================================

/// Shared slot the window writes the pointer position into.
pub type PointerSlot = Rc<Cell<Option<Point2>>>;

pub struct PointerGazeSource {
    slot: PointerSlot,
    epoch: Instant,
}

impl PointerGazeSource {
    pub fn new(slot: PointerSlot) -> Self {
        Self {
            slot,
            epoch: Instant::now(),
        }
    }
}

impl GazeSource for PointerGazeSource {
    fn name(&self) -> String {
        "Mouse Pointer".to_string()
    }

    fn start(&mut self) -> bool {
        true
    }

    fn poll(&mut self) -> Option<GazeSample> {
        let p = self.slot.get()?;
        Some(GazeSample::ok(p.x, p.y, self.epoch.elapsed().as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Confidence, ScreenSize};

    fn viewport() -> ViewportExtent {
        ViewportExtent::from_screen(ScreenSize::new(1920, 1080))
    }

    #[test]
    fn test_null_source_is_unavailable() {
        let mut src = NullGazeSource;
        assert!(!src.start());
        assert_eq!(src.poll(), None);
    }

    #[test]
    fn test_simulated_source_converges_on_focus_with_bias() {
        let profile = SimulationProfile {
            jitter: 0.0,
            outage_period: 0,
            ..SimulationProfile::default()
        };
        let mut src = SimulatedGazeSource::new(viewport(), profile, 3);
        assert_eq!(src.poll(), None);
        assert!(src.start());
        src.focus_hint(Some(ScreenPoint::new(400, 300)));
        let mut last = None;
        for _ in 0..200 {
            last = src.poll();
        }
        let s = last.unwrap();
        assert_eq!(s.confidence, Confidence::Ok);
        assert!((s.raw.x - 435.0).abs() < 0.01, "x = {}", s.raw.x);
        assert!((s.raw.y - 280.0).abs() < 0.01, "y = {}", s.raw.y);
    }

    #[test]
    fn test_simulated_source_survives_inverted_viewport() {
        let inverted = ViewportExtent::from_screen(ScreenSize::new(-5, 1080));
        let mut src = SimulatedGazeSource::new(inverted, SimulationProfile::default(), 3);
        assert!(src.start());
        src.focus_hint(Some(ScreenPoint::new(400, 300)));
        for _ in 0..50 {
            if let Some(s) = src.poll().filter(GazeSample::is_usable) {
                assert!(s.raw.x >= -5.0 && s.raw.x <= 0.0, "x = {}", s.raw.x);
                assert!(s.raw.y >= 0.0 && s.raw.y <= 1080.0, "y = {}", s.raw.y);
            }
        }
    }

    #[test]
    fn test_simulated_source_reports_outages() {
        let profile = SimulationProfile {
            outage_period: 10,
            outage_len: 2,
            ..SimulationProfile::default()
        };
        let mut src = SimulatedGazeSource::new(viewport(), profile, 3);
        src.start();
        let lost = (0..100)
            .filter_map(|_| src.poll())
            .filter(|s| s.confidence == Confidence::Lost)
            .count();
        assert_eq!(lost, 20);
    }

    #[test]
    fn test_replay_source_drains_in_order() {
        let mut src = ReplayGazeSource::new(vec![
            Some(GazeSample::ok(1.0, 2.0, 0.0)),
            None,
            Some(GazeSample::lost(0.2)),
        ]);
        assert!(src.start());
        assert_eq!(src.poll(), Some(GazeSample::ok(1.0, 2.0, 0.0)));
        assert_eq!(src.poll(), None);
        assert_eq!(src.poll(), Some(GazeSample::lost(0.2)));
        assert_eq!(src.poll(), None);
        assert_eq!(src.remaining(), 0);
    }

    #[test]
    fn test_empty_replay_does_not_start() {
        let mut src = ReplayGazeSource::new(Vec::new());
        assert!(!src.start());
    }

    #[test]
    fn test_replay_trace_json_shape() {
        let json = r#"[
            {"raw": {"x": 10.0, "y": 20.0}, "confidence": "Ok", "timestamp": 0.016},
            null,
            {"raw": {"x": 0.0, "y": 0.0}, "confidence": "Lost", "timestamp": null}
        ]"#;
        let samples: Vec<Option<GazeSample>> = serde_json::from_str(json).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], Some(GazeSample::ok(10.0, 20.0, 0.016)));
        assert!(samples[1].is_none());
        assert!(!samples[2].unwrap().is_usable());
    }

    #[test]
    fn test_pointer_source_reads_slot() {
        let slot: PointerSlot = Rc::new(Cell::new(None));
        let mut src = PointerGazeSource::new(slot.clone());
        assert!(src.start());
        assert_eq!(src.poll(), None);
        slot.set(Some(Point2::new(12.0, 34.0)));
        let s = src.poll().unwrap();
        assert_eq!(s.raw, Point2::new(12.0, 34.0));
        assert!(s.is_usable());
    }
}
