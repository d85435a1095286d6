use clap::Parser;
use std::path::PathBuf;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (created with defaults if missing)
    #[arg(short, long, default_value = AppConfig::DEFAULT_PATH)]
    pub config: PathBuf,

    /// Gaze source: pointer, simulated, replay, bridge, none
    #[arg(short, long)]
    pub source: Option<String>,

    /// Tracker bridge command for the `bridge` source
    #[arg(long)]
    pub bridge: Option<String>,

    /// Gaze trace (JSON) for the `replay` source
    #[arg(long)]
    pub replay: Option<String>,

    /// Screen width in pixels
    #[arg(long)]
    pub width: Option<i32>,

    /// Screen height in pixels
    #[arg(long)]
    pub height: Option<i32>,

    /// Seed for target placement and the simulated tracker
    #[arg(long)]
    pub seed: Option<u64>,

    /// Start playing straight away with a zero offset
    #[arg(long, default_value_t = false)]
    pub skip_calibration: bool,
}

impl Args {
    /// Command-line values win over the config file.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(source) = &self.source {
            config.tracker.source = source.clone();
        }
        if let Some(bridge) = &self.bridge {
            config.tracker.bridge_command = bridge.clone();
        }
        if let Some(replay) = &self.replay {
            config.tracker.replay_path = Some(replay.clone());
        }
        if let Some(w) = self.width {
            config.ui.screen_width = w;
        }
        if let Some(h) = self.height {
            config.ui.screen_height = h;
        }
        if self.seed.is_some() {
            config.tracker.seed = self.seed;
        }
    }
}
