//! Gaze source backed by an external tracker bridge process.
//!
//! Vendor SDKs rarely ship Rust bindings, so the trainer spawns a small
//! helper that talks to the tracker and prints one line per reading on
//! stdout:
//!
//! ```text
//! G <x> <y> [timestamp]   gaze point in tracker units
//! L [timestamp]           tracking lost
//! ```
//!
//! A missing timestamp, or `-`, is the tracker's "no data" sentinel.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::gaze_source::GazeSource;
use crate::types::{Confidence, GazeSample, Point2};

pub fn parse_line(line: &str) -> Option<GazeSample> {
    let mut parts = line.split_whitespace();
    let tag = parts.next()?;
    let timestamp = |tok: Option<&str>| tok.and_then(|t| t.parse::<f64>().ok());

    match tag {
        "G" => {
            let x = parts.next()?.parse::<f64>().ok()?;
            let y = parts.next()?.parse::<f64>().ok()?;
            Some(GazeSample {
                raw: Point2::new(x, y),
                confidence: Confidence::Ok,
                timestamp: timestamp(parts.next()),
            })
        }
        "L" => Some(GazeSample {
            raw: Point2::default(),
            confidence: Confidence::Lost,
            timestamp: timestamp(parts.next()),
        }),
        _ => None,
    }
}

pub struct ProcessGazeSource {
    command: String,
    startup_timeout: Duration,
    process: Option<Child>,
    rx: Option<Receiver<GazeSample>>,
    /// First reading, received while waiting for the bridge to come up.
    pending: Option<GazeSample>,
}

impl ProcessGazeSource {
    /// `command` is split on whitespace into program and arguments.
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            startup_timeout: Duration::from_secs(2),
            process: None,
            rx: None,
            pending: None,
        }
    }

    /// How long `start` waits for the first reading before deciding.
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Waits for the first reading. A bridge that closes its output or exits
    /// before then is treated as unavailable; one that is merely slow is not.
    fn await_first_sample(&mut self) -> Result<()> {
        let rx = self.rx.as_ref().context("Tracker bridge not spawned")?;
        match rx.recv_timeout(self.startup_timeout) {
            Ok(sample) => {
                self.pending = Some(sample);
                Ok(())
            }
            Err(RecvTimeoutError::Disconnected) => {
                anyhow::bail!("Tracker bridge `{}` exited before sending data", self.command)
            }
            Err(RecvTimeoutError::Timeout) => {
                let exited = match self.process.as_mut() {
                    Some(child) => child.try_wait()?.is_some(),
                    None => true,
                };
                if exited {
                    anyhow::bail!("Tracker bridge `{}` exited before sending data", self.command)
                }
                warn!(
                    "tracker bridge sent nothing in {:.1}s, waiting for data",
                    self.startup_timeout.as_secs_f64()
                );
                Ok(())
            }
        }
    }

    fn shutdown(&mut self) {
        self.rx = None;
        self.pending = None;
        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }

    fn spawn(&mut self) -> Result<()> {
        let mut parts = self.command.split_whitespace();
        let program = parts.next().context("Empty tracker bridge command")?;
        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to spawn tracker bridge `{}`", self.command))?;

        let stdout = child
            .stdout
            .take()
            .context("Failed to open stdout from tracker bridge")?;

        // The reader only parses and forwards; all session state stays on
        // the caller's thread.
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                match parse_line(&line) {
                    Some(sample) => {
                        if tx.send(sample).is_err() {
                            break;
                        }
                    }
                    None => debug!("ignoring bridge line: {}", line),
                }
            }
            debug!("tracker bridge stdout closed");
        });

        self.process = Some(child);
        self.rx = Some(rx);
        Ok(())
    }
}

impl GazeSource for ProcessGazeSource {
    fn name(&self) -> String {
        format!("Tracker Bridge ({})", self.command)
    }

    fn start(&mut self) -> bool {
        match self.spawn().and_then(|()| self.await_first_sample()) {
            Ok(()) => {
                info!("tracker bridge started: {}", self.command);
                true
            }
            Err(e) => {
                warn!("tracker bridge unavailable: {:#}", e);
                self.shutdown();
                false
            }
        }
    }

    /// Drains everything queued since the last tick and keeps the newest.
    fn poll(&mut self) -> Option<GazeSample> {
        let mut latest = self.pending.take();
        let Some(rx) = self.rx.as_ref() else {
            return latest;
        };
        loop {
            match rx.try_recv() {
                Ok(sample) => latest = Some(sample),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("tracker bridge exited, gaze input stopped");
                    self.rx = None;
                    break;
                }
            }
        }
        latest
    }

    fn is_alive(&self) -> bool {
        self.rx.is_some() || self.pending.is_some()
    }
}

impl Drop for ProcessGazeSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gaze_line() {
        let s = parse_line("G 812.5 430 12.75").unwrap();
        assert_eq!(s.raw, Point2::new(812.5, 430.0));
        assert_eq!(s.confidence, Confidence::Ok);
        assert_eq!(s.timestamp, Some(12.75));
        assert!(s.is_usable());
    }

    #[test]
    fn test_parse_sentinel_timestamp() {
        let s = parse_line("G 1 2 -").unwrap();
        assert_eq!(s.timestamp, None);
        assert!(!s.is_usable());
        assert_eq!(parse_line("G 1 2").unwrap().timestamp, None);
    }

    #[test]
    fn test_parse_lost_line() {
        let s = parse_line("L 3.5").unwrap();
        assert_eq!(s.confidence, Confidence::Lost);
        assert!(!s.is_usable());
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("hello"), None);
        assert_eq!(parse_line("G abc 2 1"), None);
        assert_eq!(parse_line("G 1"), None);
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let mut src = ProcessGazeSource::new("/nonexistent/gaze-bridge --flag");
        assert!(!src.start());
        assert_eq!(src.poll(), None);
    }

    #[test]
    fn test_empty_command_is_unavailable() {
        let mut src = ProcessGazeSource::new("   ");
        assert!(!src.start());
    }

    #[test]
    fn test_bridge_that_exits_at_once_is_unavailable() {
        let mut src = ProcessGazeSource::new("true");
        assert!(!src.start());
        assert!(!src.is_alive());
        assert_eq!(src.poll(), None);
    }

    #[test]
    fn test_first_reading_is_kept_and_exit_is_noticed() {
        let mut src = ProcessGazeSource::new("echo G 640 360 0.5");
        assert!(src.start());
        let s = src.poll().unwrap();
        assert_eq!(s.raw, Point2::new(640.0, 360.0));
        // echo has exited; the channel closes once the reader drains stdout
        for _ in 0..100 {
            if !src.is_alive() {
                break;
            }
            src.poll();
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!src.is_alive());
    }
}
