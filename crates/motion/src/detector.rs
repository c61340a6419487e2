//! Frame-difference motion detector

use std::time::Instant;

use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

use crate::{MotionConfig, MotionState};

/// Count pixels whose luma changed by more than `pixel_threshold`.
///
/// Returns `None` when the frames cannot be compared (size changed).
pub fn motion_score(previous: &GrayImage, current: &GrayImage, pixel_threshold: u8) -> Option<usize> {
    if previous.dimensions() != current.dimensions() {
        return None;
    }
    let changed = previous
        .as_raw()
        .iter()
        .zip(current.as_raw())
        .filter(|(a, b)| a.abs_diff(**b) > pixel_threshold)
        .count();
    Some(changed)
}

/// Motion/display state machine fed one lores luma frame per tick
pub struct MotionDetector {
    config: MotionConfig,
    state: MotionState,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            state: MotionState::default(),
        }
    }

    pub fn state(&self) -> &MotionState {
        &self.state
    }

    /// Run one detection step on a raw luma frame captured at `now`.
    ///
    /// With `suppressed` set (settle window) the frame is only stored as the
    /// new reference. Returns the backlight state to apply, if it changed.
    pub fn observe(&mut self, frame: GrayImage, now: Instant, suppressed: bool) -> Option<bool> {
        let blurred = gaussian_blur_f32(&frame, self.config.blur_sigma);

        let mut display_change = None;
        if let Some(previous) = &self.state.previous_frame {
            if suppressed {
                debug!("Motion check suppressed inside settle window");
            } else {
                match motion_score(previous, &blurred, self.config.pixel_threshold) {
                    Some(score) => display_change = self.apply_score(score, now),
                    None => debug!("Frame size changed, resetting motion reference"),
                }
            }
        }

        self.state.previous_frame = Some(blurred);
        display_change
    }

    /// Update motion state from a score computed at `now`
    pub fn apply_score(&mut self, score: usize, now: Instant) -> Option<bool> {
        if score > self.config.motion_threshold {
            debug!("Motion score {} over threshold {}", score, self.config.motion_threshold);
            self.state.last_motion = Some(now);
            self.state.motion_active = true;
            self.set_display(true)
        } else if self.inactive_at(now) {
            self.state.motion_active = false;
            self.set_display(false)
        } else {
            None
        }
    }

    fn inactive_at(&self, now: Instant) -> bool {
        match self.state.last_motion {
            Some(last) => now.saturating_duration_since(last) > self.config.inactivity_timeout(),
            None => true,
        }
    }

    fn set_display(&mut self, on: bool) -> Option<bool> {
        if self.state.display_on == on {
            return None;
        }
        self.state.display_on = on;
        Some(on)
    }
}
