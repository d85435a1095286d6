//! Session time source.
//!
//! Production code uses `SystemClock` (real time, real sleeps).
//! Tests and headless replays use `TestClock`, where sleeping advances time.

use std::cell::Cell;
use std::time::{Duration, Instant};

pub trait Clock {
    /// Seconds since the session epoch.
    fn now(&self) -> f64;

    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Manually driven clock; `sleep` returns immediately after advancing.
#[derive(Debug, Default)]
pub struct TestClock {
    secs: Cell<f64>,
}

impl TestClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.secs.set(self.secs.get() + duration.as_secs_f64());
    }

    pub fn set(&self, secs: f64) {
        self.secs.set(secs);
    }
}

impl Clock for TestClock {
    fn now(&self) -> f64 {
        self.secs.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Caps the tick loop at a fixed rate.
pub struct FramePacer {
    period: f64,
    next_frame: Option<f64>,
}

impl FramePacer {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            period: 1.0 / frame_rate.max(1) as f64,
            next_frame: None,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.period)
    }

    /// Sleeps until the next frame boundary. A late frame resynchronizes
    /// instead of trying to catch up.
    pub fn wait(&mut self, clock: &dyn Clock) {
        let now = clock.now();
        let deadline = self.next_frame.unwrap_or(now + self.period);
        if deadline > now {
            clock.sleep(Duration::from_secs_f64(deadline - now));
            self.next_frame = Some(deadline + self.period);
        } else {
            self.next_frame = Some(now + self.period);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_on_sleep() {
        let clock = TestClock::new();
        clock.sleep(Duration::from_millis(250));
        assert!((clock.now() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_pacer_holds_frame_rate_on_test_clock() {
        let clock = TestClock::new();
        let mut pacer = FramePacer::new(60);
        for _ in 0..60 {
            pacer.wait(&clock);
        }
        assert!((clock.now() - 1.0).abs() < 1e-6, "now = {}", clock.now());
    }

    #[test]
    fn test_pacer_does_not_sleep_when_late() {
        let clock = TestClock::new();
        let mut pacer = FramePacer::new(60);
        pacer.wait(&clock);
        clock.advance(Duration::from_millis(100));
        let before = clock.now();
        pacer.wait(&clock);
        assert_eq!(clock.now(), before);
    }
}
