//! Application settings
//!
//! Loaded once at startup and passed down to every component:
//! - Built-in defaults
//! - Optional TOML file (`wakeonpi.toml`, or an explicit path)
//! - `WAKEONPI__SECTION__KEY` environment variables
//! - `MOTION_USERNAME` / `MOTION_PASSWORD` for the viewer credentials

use std::fmt;
use std::path::Path;

use camera_capture::CameraConfig;
use ::config::{Config, Environment, File};
use mode_arbiter::{ArbiterConfig, RecordingConfig};
use motion::{DisplayConfig, MotionConfig};
use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitConfig;
use crate::ApiError;

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "wakeonpi";

/// Environment prefix for overrides
pub const ENV_PREFIX: &str = "WAKEONPI";

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub camera: CameraConfig,
    pub arbiter: ArbiterConfig,
    pub motion: MotionConfig,
    pub display: DisplayConfig,
    pub recording: RecordingConfig,
    pub stream: StreamConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
    pub device: DeviceConfig,
}

impl Settings {
    /// Load settings, layering file and environment over the defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ApiError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.auth.apply_overrides(
            std::env::var("MOTION_USERNAME").ok(),
            std::env::var("MOTION_PASSWORD").ok(),
        );
        Ok(settings)
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
        }
    }
}

/// Viewer credentials for HTTP Basic authentication
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AuthConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Configured credential pair; `None` rejects every protected request
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// Replace each credential that is present
    pub fn apply_overrides(&mut self, username: Option<String>, password: Option<String>) {
        if username.is_some() {
            self.username = username;
        }
        if password.is_some() {
            self.password = password;
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// MJPEG viewer stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Output width after downscaling
    pub width: u32,
    /// Output height after downscaling
    pub height: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Encoded parts buffered per viewer before the pump blocks
    pub buffer_frames: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 854,
            height: 480,
            jpeg_quality: 75,
            buffer_frames: 2,
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Camera backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceBackend {
    /// Synthetic frames, for development hosts
    #[default]
    Simulated,
    /// Raspberry Pi camera through the native shim
    Picamera,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub backend: DeviceBackend,
}
