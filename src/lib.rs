pub mod args;
pub mod bridge;
pub mod calibration;
pub mod clock;
pub mod config;
pub mod font;
pub mod game;
pub mod gaze_source;
pub mod mapper;
pub mod output;
pub mod renderer;
pub mod session;
pub mod ttf;
pub mod types;
