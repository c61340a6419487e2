//! Capture Mode Arbitration
//!
//! Owns the decision of which [`CaptureMode`] the shared camera runs in:
//! - Mode arbiter: single-lock state machine over mode, viewer count,
//!   recording flag and the post-switch settle window
//! - Viewer sessions: RAII claims on full-resolution mode
//! - Recording controller: start/stop toggle for the hardware encoder

mod arbiter;
mod recording;
mod viewer;

pub use arbiter::{ArbiterConfig, ArbiterState, ModeArbiter};
pub use recording::{RecordingConfig, RecordingController, RecordingState, ToggleOutcome};
pub use viewer::ViewerSession;

pub use camera_capture::CaptureMode;

use camera_capture::DeviceError;
use thiserror::Error;

/// Arbiter error types
#[derive(Error, Debug)]
pub enum ArbiterError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Arbiter state lock poisoned")]
    Poisoned,
}

/// Recording controller error types
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Could not claim full resolution mode: {0}")]
    Arbiter(#[from] ArbiterError),

    #[error("Encoder error: {0}")]
    Device(#[from] DeviceError),

    #[error("Recording state lock poisoned")]
    Poisoned,
}
