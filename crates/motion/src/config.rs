//! Motion detection configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::MotionError;

/// Motion detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Time between two motion checks (milliseconds)
    pub check_interval_ms: u64,

    /// Time without motion before the display turns off (seconds)
    pub inactivity_timeout_secs: u64,

    /// Changed-pixel count above which a frame counts as motion
    pub motion_threshold: usize,

    /// Per-pixel luma difference (0-255) that counts as changed
    pub pixel_threshold: u8,

    /// Gaussian smoothing sigma applied before differencing
    pub blur_sigma: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 1000,
            inactivity_timeout_secs: 15,
            motion_threshold: 1500,
            pixel_threshold: 25,
            // Same kernel OpenCV derives for a 5x5 window with sigma 0
            blur_sigma: 1.1,
        }
    }
}

impl MotionConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    /// Reject values the detector cannot run with
    pub fn validate(&self) -> Result<(), MotionError> {
        if self.check_interval_ms == 0 {
            return Err(MotionError::Config("check_interval_ms must be positive".into()));
        }
        if self.blur_sigma.is_nan() || self.blur_sigma <= 0.0 {
            return Err(MotionError::Config("blur_sigma must be positive".into()));
        }
        Ok(())
    }
}
