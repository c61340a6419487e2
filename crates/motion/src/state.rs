//! Motion state tracking

use image::GrayImage;
use std::time::Instant;

/// Motion detector state, owned by the detector thread
#[derive(Debug, Clone)]
pub struct MotionState {
    /// Blurred luma of the previous sample
    pub previous_frame: Option<GrayImage>,

    /// Time of the last frame scored as motion
    pub last_motion: Option<Instant>,

    /// Whether motion is currently considered active
    pub motion_active: bool,

    /// Backlight state as last commanded
    pub display_on: bool,
}

impl Default for MotionState {
    fn default() -> Self {
        Self {
            previous_frame: None,
            last_motion: None,
            motion_active: false,
            // The panel is lit at boot
            display_on: true,
        }
    }
}
