use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::types::{Point2, ScreenPoint, ScreenSize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub position: ScreenPoint,
    pub radius: i32,
    pub visible: bool,
    /// Session seconds at which the target was last shown.
    pub appeared_at: f64,
}

impl Target {
    /// Inclusive Euclidean hit test: a point exactly `radius` away counts.
    pub fn contains(&self, point: Point2) -> bool {
        let dx = point.x - self.position.x as f64;
        let dy = point.y - self.position.y as f64;
        (dx * dx + dy * dy).sqrt() <= self.radius as f64
    }

    pub fn elapsed(&self, now: f64) -> f64 {
        now - self.appeared_at
    }
}

/// Append-only record of reaction times with running aggregates.
#[derive(Debug, Clone, Default)]
pub struct ReactionLog {
    times: Vec<f64>,
    sum: f64,
    best: Option<f64>,
}

impl ReactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, seconds: f64) {
        self.times.push(seconds);
        self.sum += seconds;
        self.best = Some(self.best.map_or(seconds, |b| b.min(seconds)));
    }

    pub fn count(&self) -> usize {
        self.times.len()
    }

    pub fn average(&self) -> Option<f64> {
        if self.times.is_empty() {
            None
        } else {
            Some(self.sum / self.times.len() as f64)
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }
}

/// Snapshot handed to the renderer and to the end-of-session summary.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Metrics {
    pub average: Option<f64>,
    pub best: Option<f64>,
    pub count: usize,
    pub timeouts: usize,
}

impl Metrics {
    pub fn summary(&self) -> String {
        match (self.average, self.best) {
            (Some(avg), Some(best)) => format!(
                "{} hits, average {:.3}s, best {:.3}s, {} missed",
                self.count, avg, best, self.timeouts
            ),
            _ => format!("no hits, {} missed", self.timeouts),
        }
    }
}

/// What happened to the target during one update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetEvent {
    Hit { reaction: f64, next: ScreenPoint },
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameSettings {
    pub target_radius: i32,
    pub target_timeout: f64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            target_radius: 30,
            target_timeout: 3.0,
        }
    }
}

/// Target placement, visibility and reaction bookkeeping.
pub struct TargetGameLoop<R: Rng> {
    screen: ScreenSize,
    settings: GameSettings,
    target: Target,
    log: ReactionLog,
    timeouts: usize,
    rng: R,
}

impl<R: Rng> TargetGameLoop<R> {
    /// Starts with a visible target at a random in-bounds position.
    pub fn new(screen: ScreenSize, settings: GameSettings, mut rng: R, now: f64) -> Self {
        let position = random_position(&mut rng, screen, settings.target_radius);
        debug!(x = position.x, y = position.y, "first target");
        Self {
            screen,
            settings,
            target: Target {
                position,
                radius: settings.target_radius,
                visible: true,
                appeared_at: now,
            },
            log: ReactionLog::new(),
            timeouts: 0,
            rng,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn log(&self) -> &ReactionLog {
        &self.log
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// Moves the current target and shows it, restarting its timer.
    pub fn place_target(&mut self, position: ScreenPoint, now: f64) {
        self.target.position = position;
        self.target.visible = true;
        self.target.appeared_at = now;
    }

    /// Advances the state machine by one tick.
    ///
    /// With a cursor, a visible target is hit-tested first. The timeout is
    /// checked afterwards and fires on the first tick where the elapsed time
    /// strictly exceeds the configured limit.
    pub fn update(&mut self, cursor: Option<ScreenPoint>, now: f64) -> Option<TargetEvent> {
        if self.target.visible {
            if let Some(cursor) = cursor {
                if self.target.contains(cursor.as_point2()) {
                    return Some(self.register_hit(now));
                }
            }
            if self.target.elapsed(now) > self.settings.target_timeout {
                self.target.visible = false;
                self.timeouts += 1;
                debug!(
                    x = self.target.position.x,
                    y = self.target.position.y,
                    "target timed out"
                );
                return Some(TargetEvent::TimedOut);
            }
        }
        None
    }

    /// Manual reveal: shows the target where it is and restarts its timer.
    pub fn reveal(&mut self, now: f64) {
        self.target.visible = true;
        self.target.appeared_at = now;
    }

    /// Restarts the timer without changing visibility, used after time the
    /// player could not spend on the target.
    pub fn restart_timer(&mut self, now: f64) {
        self.target.appeared_at = now;
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            average: self.log.average(),
            best: self.log.best(),
            count: self.log.count(),
            timeouts: self.timeouts,
        }
    }

    fn register_hit(&mut self, now: f64) -> TargetEvent {
        let reaction = self.target.elapsed(now);
        self.log.record(reaction);
        let next = random_position(&mut self.rng, self.screen, self.settings.target_radius);
        self.place_target(next, now);
        info!(
            hits = self.log.count(),
            "hit in {:.3}s, next target at ({}, {})",
            reaction,
            next.x,
            next.y
        );
        TargetEvent::Hit { reaction, next }
    }
}

/// Uniform position keeping the whole circle on screen. An axis shorter
/// than the target diameter pins the center on that axis.
pub fn random_position<R: Rng>(rng: &mut R, screen: ScreenSize, radius: i32) -> ScreenPoint {
    let axis = |rng: &mut R, size: i32| {
        if size - radius >= radius {
            rng.gen_range(radius..=size - radius)
        } else {
            size / 2
        }
    };
    let x = axis(rng, screen.width);
    let y = axis(rng, screen.height);
    ScreenPoint::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn game_at(position: ScreenPoint) -> TargetGameLoop<StdRng> {
        let mut game = TargetGameLoop::new(
            ScreenSize::new(1920, 1080),
            GameSettings::default(),
            StdRng::seed_from_u64(7),
            0.0,
        );
        game.place_target(position, 0.0);
        game
    }

    #[test]
    fn test_hit_boundary_is_inclusive() {
        let target = Target {
            position: ScreenPoint::new(500, 500),
            radius: 30,
            visible: true,
            appeared_at: 0.0,
        };
        assert!(target.contains(Point2::new(529.9, 500.0)));
        assert!(target.contains(Point2::new(530.0, 500.0)));
        assert!(!target.contains(Point2::new(530.1, 500.0)));
        // Off-axis: (18, 24) is exactly 30 away
        assert!(target.contains(Point2::new(518.0, 524.0)));
        assert!(!target.contains(Point2::new(518.0, 524.1)));
    }

    #[test]
    fn test_reaction_stats() {
        let mut log = ReactionLog::new();
        assert_eq!(log.average(), None);
        assert_eq!(log.best(), None);
        for t in [0.20, 0.40, 0.30] {
            log.record(t);
        }
        assert!((log.average().unwrap() - 0.30).abs() < 1e-12);
        assert_eq!(log.best(), Some(0.20));
        assert_eq!(log.count(), 3);
    }

    #[test]
    fn test_random_positions_keep_circle_on_screen() {
        let mut rng = StdRng::seed_from_u64(42);
        let screen = ScreenSize::new(640, 480);
        for _ in 0..2000 {
            let p = random_position(&mut rng, screen, 30);
            assert!(p.x >= 30 && p.x <= 610, "x = {}", p.x);
            assert!(p.y >= 30 && p.y <= 450, "y = {}", p.y);
        }
    }

    #[test]
    fn test_tiny_screen_pins_center() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = random_position(&mut rng, ScreenSize::new(40, 200), 30);
        assert_eq!(p.x, 20);
        assert!(p.y >= 30 && p.y <= 170);
    }

    #[test]
    fn test_hit_records_reaction_and_respawns() {
        let mut game = game_at(ScreenPoint::new(500, 500));
        let event = game.update(Some(ScreenPoint::new(510, 490)), 0.35);
        match event {
            Some(TargetEvent::Hit { reaction, next }) => {
                assert!((reaction - 0.35).abs() < 1e-12);
                assert_eq!(game.target().position, next);
            }
            other => panic!("expected hit, got {:?}", other),
        }
        assert_eq!(game.log().count(), 1);
        assert!(game.target().visible);
        assert_eq!(game.target().appeared_at, 0.35);
    }

    #[test]
    fn test_miss_keeps_target() {
        let mut game = game_at(ScreenPoint::new(500, 500));
        assert_eq!(game.update(Some(ScreenPoint::new(531, 500)), 0.5), None);
        assert_eq!(game.target().position, ScreenPoint::new(500, 500));
        assert_eq!(game.log().count(), 0);
    }

    #[test]
    fn test_timeout_fires_only_after_limit() {
        let mut game = game_at(ScreenPoint::new(500, 500));
        assert_eq!(game.update(None, 2.9), None);
        assert_eq!(game.update(None, 3.0), None);
        assert!(game.target().visible);
        assert_eq!(game.update(None, 3.0001), Some(TargetEvent::TimedOut));
        assert!(!game.target().visible);
        assert_eq!(game.target().position, ScreenPoint::new(500, 500));
        assert_eq!(game.metrics().timeouts, 1);
        // Stays hidden, no double counting
        assert_eq!(game.update(None, 10.0), None);
        assert_eq!(game.metrics().timeouts, 1);
    }

    #[test]
    fn test_hidden_target_cannot_be_hit() {
        let mut game = game_at(ScreenPoint::new(500, 500));
        game.update(None, 3.5);
        assert_eq!(game.update(Some(ScreenPoint::new(500, 500)), 3.6), None);
        assert_eq!(game.log().count(), 0);
    }

    #[test]
    fn test_reveal_restarts_timer() {
        let mut game = game_at(ScreenPoint::new(500, 500));
        game.update(None, 3.5);
        game.reveal(4.0);
        assert!(game.target().visible);
        assert_eq!(game.update(None, 4.1), None);
        match game.update(Some(ScreenPoint::new(500, 500)), 4.25) {
            Some(TargetEvent::Hit { reaction, .. }) => assert!((reaction - 0.25).abs() < 1e-12),
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    fn test_hit_beats_timeout_in_the_same_tick() {
        let mut game = game_at(ScreenPoint::new(500, 500));
        match game.update(Some(ScreenPoint::new(500, 500)), 3.5) {
            Some(TargetEvent::Hit { reaction, .. }) => assert!((reaction - 3.5).abs() < 1e-12),
            other => panic!("expected hit, got {:?}", other),
        }
        assert_eq!(game.metrics().timeouts, 0);
        assert_eq!(game.log().count(), 1);
    }

    #[test]
    fn test_reveal_while_visible_restarts_timer() {
        let mut game = game_at(ScreenPoint::new(500, 500));
        assert_eq!(game.update(None, 2.5), None);
        game.reveal(6.0);
        assert!(game.target().visible);
        assert_eq!(game.target().position, ScreenPoint::new(500, 500));
        // Without the restart this would have timed out after 3.0
        assert_eq!(game.update(None, 8.9), None);
        assert_eq!(game.update(None, 9.1), Some(TargetEvent::TimedOut));
    }

    #[test]
    fn test_no_cursor_is_a_quiet_tick() {
        let mut game = game_at(ScreenPoint::new(500, 500));
        for i in 0..100 {
            assert_eq!(game.update(None, i as f64 * 0.01), None);
        }
        assert_eq!(game.metrics(), Metrics { average: None, best: None, count: 0, timeouts: 0 });
    }

    #[test]
    fn test_metrics_summary() {
        let m = Metrics { average: Some(0.3), best: Some(0.2), count: 3, timeouts: 1 };
        assert_eq!(m.summary(), "3 hits, average 0.300s, best 0.200s, 1 missed");
        assert_eq!(Metrics::default().summary(), "no hits, 0 missed");
    }
}
