//! Camera Capture Library for the surveillance controller
//!
//! Wraps the single physical camera behind the [`CaptureDevice`] contract.
//! The device runs in exactly one [`CaptureMode`] at a time:
//! - LowRes: 320x180 YUV420 lores stream only (motion sensing)
//! - FullRes: the same lores stream plus a 1920x1080 main stream
//!   for viewing and H.264 recording

pub mod device;
#[cfg(feature = "picamera")]
pub mod ffi;
pub mod frame;
pub mod simulated;

pub use device::{CaptureDevice, SharedDevice};
pub use frame::{Frame, PixelFormat};
pub use simulated::SimulatedCamera;

#[cfg(feature = "picamera")]
pub use ffi::PiCamera;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Camera device error types
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Failed to configure {mode} mode: {reason}")]
    Configure { mode: CaptureMode, reason: String },

    #[error("Failed to start camera: {0}")]
    Start(String),

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Stream {0} is not available in the current mode")]
    StreamUnavailable(StreamId),

    #[error("Invalid frame format: {0}")]
    Format(String),

    #[error("Frame encoding failed: {0}")]
    Encode(String),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Capture timeout")]
    Timeout,

    #[error("Camera not initialized")]
    NotInitialized,
}

/// Capture configuration the device is running in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Lores stream only, used for motion sensing
    #[default]
    LowRes,
    /// Lores stream plus the main stream for viewers and recording
    FullRes,
}

impl CaptureMode {
    /// Short label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::LowRes => "low_res",
            CaptureMode::FullRes => "full_res",
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stream to pull a frame from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamId {
    /// Low-resolution YUV420 stream, present in both modes
    Lores,
    /// Full-resolution RGB stream, present only in [`CaptureMode::FullRes`]
    Main,
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamId::Lores => f.write_str("lores"),
            StreamId::Main => f.write_str("main"),
        }
    }
}

/// Width and height of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSize {
    pub width: u32,
    pub height: u32,
}

impl StreamSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Camera configuration shared by both capture modes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Lores stream size (YUV420)
    pub lores: StreamSize,
    /// Main stream size (RGB888), FullRes only
    pub main: StreamSize,
    /// Frame rate while in LowRes
    pub low_res_fps: u32,
    /// Frame rate while in FullRes
    pub full_res_fps: u32,
    /// Flip the sensor image vertically
    pub vflip: bool,
    /// Fixed auto-white-balance mode passed to the driver
    pub awb_mode: i32,
    /// H.264 encoder bitrate (bits/s)
    pub h264_bitrate: u32,
    /// Frame read timeout (milliseconds)
    pub capture_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            lores: StreamSize::new(320, 180),
            main: StreamSize::new(1920, 1080),
            low_res_fps: 2,
            full_res_fps: 10,
            vflip: true,
            awb_mode: 0,
            h264_bitrate: 10_000_000,
            capture_timeout_ms: 2000,
        }
    }
}

impl CameraConfig {
    /// Frame rate the device runs at in `mode`
    pub fn fps(&self, mode: CaptureMode) -> u32 {
        match mode {
            CaptureMode::LowRes => self.low_res_fps,
            CaptureMode::FullRes => self.full_res_fps,
        }
    }

    /// Time between two frames in `mode`
    pub fn frame_period(&self, mode: CaptureMode) -> Duration {
        Duration::from_micros(1_000_000 / self.fps(mode).max(1) as u64)
    }
}
