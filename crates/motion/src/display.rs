//! Display power control

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::DisplayError;

/// Backlight power file on the Raspberry Pi touch display
pub const DEFAULT_BACKLIGHT_PATH: &str = "/sys/class/backlight/11-0045/bl_power";

/// Something that can switch the display backlight
pub trait DisplayPower: Send {
    fn set_power(&mut self, on: bool) -> Result<(), DisplayError>;
}

/// Backlight driven through the kernel's `bl_power` attribute.
///
/// `bl_power` uses framebuffer blanking levels: `0` is unblanked (on),
/// anything else powers the panel down.
#[derive(Debug, Clone)]
pub struct SysfsBacklight {
    path: PathBuf,
}

impl SysfsBacklight {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DisplayPower for SysfsBacklight {
    fn set_power(&mut self, on: bool) -> Result<(), DisplayError> {
        let value = if on { "0" } else { "1" };
        fs::write(&self.path, value)?;
        info!("Display {}", if on { "on" } else { "off" });
        Ok(())
    }
}

/// Display sink for hosts without a panel
#[derive(Debug, Default, Clone)]
pub struct NullDisplay;

impl DisplayPower for NullDisplay {
    fn set_power(&mut self, on: bool) -> Result<(), DisplayError> {
        debug!("No display attached, ignoring power {}", on);
        Ok(())
    }
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Backlight power file; `None` disables display control
    pub backlight_path: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            backlight_path: Some(PathBuf::from(DEFAULT_BACKLIGHT_PATH)),
        }
    }
}

impl DisplayConfig {
    /// Build the configured display driver
    pub fn build(&self) -> Box<dyn DisplayPower> {
        match &self.backlight_path {
            Some(path) => Box::new(SysfsBacklight::new(path.clone())),
            None => Box::new(NullDisplay),
        }
    }
}
