use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::game::GameSettings;
use crate::session::SessionSettings;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub calibration: CalibrationConfig,
    pub game: GameConfig,
    pub tracker: TrackerConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Inset of the corner fixation points from the screen edges.
    pub margin_px: i32,
    pub include_center: bool,
    pub samples_per_point: usize,
    pub sample_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub target_radius: i32,
    pub target_timeout_s: f64,
    /// Cursor averaging window; 0 or 1 disables smoothing.
    pub smoothing_window: usize,
    pub frame_rate: u32,
    /// Elapsed time after which the countdown ring appears on a target.
    pub timer_warning_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// One of "pointer", "simulated", "replay", "bridge", "none".
    pub source: String,
    pub bridge_command: String,
    pub replay_path: Option<String>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    // minifb cannot query the display resolution, so it is configured
    pub screen_width: i32,
    pub screen_height: i32,
    pub font_family: String,
    pub font_size_pt: u32,
    pub show_trail: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            margin_px: 50,
            include_center: true,
            samples_per_point: 15,
            sample_delay_ms: 50,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            target_radius: 30,
            target_timeout_s: 3.0,
            smoothing_window: 10,
            frame_rate: 60,
            timer_warning_s: 2.0,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            source: "pointer".to_string(),
            bridge_command: "gaze-bridge".to_string(),
            replay_path: None,
            seed: None,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            screen_width: 1920,
            screen_height: 1080,
            font_family: "Arial".to_string(),
            font_size_pt: 24,
            show_trail: true,
        }
    }
}

impl AppConfig {
    pub const DEFAULT_PATH: &'static str = "gaze_reflex.json";

    /// Reads `path` if it exists. Missing fields take their defaults and a
    /// malformed file is replaced by defaults. The result is written back so
    /// the file always lists every field.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(c) => {
                    info!("Loaded configuration from {}", path.display());
                    c
                }
                Err(e) => {
                    warn!("Error parsing config: {}. Loading defaults.", e);
                    Self::default()
                }
            }
        } else {
            info!("Configuration file not found. Creating default at {}", path.display());
            Self::default()
        };

        config.save(path)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// Session parameters with out-of-range values pulled back to sane ones.
    pub fn session_settings(&self) -> SessionSettings {
        let radius = self.game.target_radius.max(1);
        if radius != self.game.target_radius {
            warn!("target_radius {} is too small, using 1", self.game.target_radius);
        }
        let timeout = if self.game.target_timeout_s.is_finite() && self.game.target_timeout_s > 0.0 {
            self.game.target_timeout_s
        } else {
            warn!("invalid target_timeout_s {}, using 3.0", self.game.target_timeout_s);
            3.0
        };

        SessionSettings {
            calibration_margin: self.calibration.margin_px,
            include_center: self.calibration.include_center,
            samples_per_point: self.calibration.samples_per_point,
            sample_delay: Duration::from_millis(self.calibration.sample_delay_ms),
            game: GameSettings {
                target_radius: radius,
                target_timeout: timeout,
            },
            smoothing_window: self.game.smoothing_window,
            frame_rate: self.game.frame_rate.max(1),
            timer_warning: self.game.timer_warning_s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "game": { "target_radius": 45 }, "tracker": { "source": "simulated" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.game.target_radius, 45);
        assert_eq!(config.game.target_timeout_s, 3.0);
        assert_eq!(config.game.smoothing_window, 10);
        assert_eq!(config.tracker.source, "simulated");
        assert_eq!(config.calibration, CalibrationConfig::default());
    }

    #[test]
    fn test_session_settings_defaults() {
        let s = AppConfig::default().session_settings();
        assert_eq!(s.samples_per_point, 15);
        assert_eq!(s.sample_delay, Duration::from_millis(50));
        assert_eq!(s.game.target_radius, 30);
        assert_eq!(s.game.target_timeout, 3.0);
        assert_eq!(s.smoothing_window, 10);
        assert_eq!(s.frame_rate, 60);
        assert!(s.include_center);
    }

    #[test]
    fn test_session_settings_repairs_bad_values() {
        let mut config = AppConfig::default();
        config.game.target_radius = -5;
        config.game.target_timeout_s = f64::NAN;
        config.game.frame_rate = 0;
        let s = config.session_settings();
        assert_eq!(s.game.target_radius, 1);
        assert_eq!(s.game.target_timeout, 3.0);
        assert_eq!(s.frame_rate, 1);
    }

    #[test]
    fn test_load_writes_back_full_file() {
        let dir = std::env::temp_dir().join(format!("gaze_reflex_cfg_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        fs::write(&path, r#"{ "ui": { "screen_width": 1280 } }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.ui.screen_width, 1280);
        assert_eq!(config.ui.screen_height, 1080);

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("samples_per_point"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("gaze_reflex_bad_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        let _ = fs::remove_dir_all(&dir);
    }
}
