//! Motion Sensing
//!
//! Continuous motion detection on the camera's lores stream:
//! - Frame differencing against the previous blurred luma frame
//! - Settle-window suppression after capture mode switches
//! - Backlight power that follows motion activity
//! - Read-only motion status for the HTTP layer

pub mod config;
pub mod detector;
pub mod display;
pub mod monitor;
pub mod state;

pub use config::MotionConfig;
pub use detector::{motion_score, MotionDetector};
pub use display::{DisplayConfig, DisplayPower, NullDisplay, SysfsBacklight};
pub use monitor::{MotionMonitor, MotionStatus};
pub use state::MotionState;

use thiserror::Error;

/// Motion sensing error types
#[derive(Error, Debug)]
pub enum MotionError {
    #[error("Failed to spawn motion thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Display power write failure. Logged and swallowed, never retried.
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Display power write failed: {0}")]
    Io(#[from] std::io::Error),
}
