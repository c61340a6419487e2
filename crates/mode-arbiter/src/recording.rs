//! Recording Controller

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{ModeArbiter, RecordingError};

/// Recording configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Directory for recordings; defaults to `$HOME`
    pub output_dir: Option<PathBuf>,
}

impl RecordingConfig {
    /// Directory recordings are written to
    pub fn resolve_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Encoder state owned by the controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingState {
    pub recording: bool,
    /// Set exactly while `recording` is true
    pub active_path: Option<PathBuf>,
}

/// Result of a toggle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started { path: PathBuf },
    Stopped { path: PathBuf },
}

impl fmt::Display for ToggleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToggleOutcome::Started { .. } => write!(f, "Recording started"),
            ToggleOutcome::Stopped { path } => {
                write!(f, "Recording stopped, saved as {}", path.display())
            }
        }
    }
}

/// Operator-facing start/stop control for the hardware encoder
pub struct RecordingController {
    arbiter: Arc<ModeArbiter>,
    output_dir: PathBuf,
    state: Mutex<RecordingState>,
}

impl RecordingController {
    pub fn new(arbiter: Arc<ModeArbiter>, config: &RecordingConfig) -> Self {
        let output_dir = config.resolve_output_dir();
        info!("Recordings will be saved to {}", output_dir.display());
        Self {
            arbiter,
            output_dir,
            state: Mutex::new(RecordingState::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RecordingState>, RecordingError> {
        self.state.lock().map_err(|_| RecordingError::Poisoned)
    }

    /// Start recording if idle, stop it otherwise
    pub fn toggle(&self) -> Result<ToggleOutcome, RecordingError> {
        let mut state = self.lock()?;
        match state.active_path.clone() {
            None => self.start(&mut state),
            Some(path) => self.stop(&mut state, path),
        }
    }

    fn start(&self, state: &mut RecordingState) -> Result<ToggleOutcome, RecordingError> {
        self.arbiter.begin_recording()?;

        let path = self.next_path();
        if let Err(e) = self.arbiter.device().start_recording(&path) {
            warn!("Encoder failed to start: {}", e);
            if let Err(rollback) = self.arbiter.end_recording() {
                warn!("Failed to release recording claim: {}", rollback);
            }
            return Err(e.into());
        }

        *state = RecordingState {
            recording: true,
            active_path: Some(path.clone()),
        };
        info!("Recording started: {}", path.display());
        Ok(ToggleOutcome::Started { path })
    }

    fn stop(
        &self,
        state: &mut RecordingState,
        path: PathBuf,
    ) -> Result<ToggleOutcome, RecordingError> {
        self.arbiter.device().stop_recording()?;
        *state = RecordingState::default();
        info!("Recording stopped, saved as {}", path.display());

        // Stopping the encoder disturbs the sensor even when the mode stays
        if let Err(e) = self.arbiter.extend_settle_window() {
            warn!("Failed to extend settle window: {}", e);
        }
        // The file is complete at this point; a failed relax only delays LowRes
        if let Err(e) = self.arbiter.end_recording() {
            warn!("Failed to release recording claim: {}", e);
        }
        Ok(ToggleOutcome::Stopped { path })
    }

    fn next_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("video_{}.h264", Utc::now().timestamp()))
    }

    /// Whether the encoder is running
    pub fn is_recording(&self) -> bool {
        self.lock().map(|s| s.recording).unwrap_or(false)
    }

    /// File currently being written
    pub fn active_path(&self) -> Option<PathBuf> {
        self.lock().ok().and_then(|s| s.active_path.clone())
    }

    /// Snapshot of the encoder state
    pub fn state(&self) -> RecordingState {
        self.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArbiterConfig;
    use camera_capture::{CameraConfig, CaptureMode, SimulatedCamera};
    use std::time::{Duration, Instant};

    fn setup() -> (Arc<SimulatedCamera>, Arc<ModeArbiter>, RecordingController) {
        let camera = Arc::new(SimulatedCamera::new(CameraConfig::default()));
        let arbiter = Arc::new(ModeArbiter::start(camera.clone(), ArbiterConfig::default()).unwrap());
        let config = RecordingConfig {
            output_dir: Some(PathBuf::from("/var/recordings")),
        };
        let controller = RecordingController::new(arbiter.clone(), &config);
        (camera, arbiter, controller)
    }

    #[test]
    fn test_toggle_on_and_off() {
        let (camera, arbiter, controller) = setup();

        let started = controller.toggle().unwrap();
        let ToggleOutcome::Started { path } = started.clone() else {
            panic!("expected start, got {:?}", started);
        };
        assert!(path.starts_with("/var/recordings"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("video_") && name.ends_with(".h264"));

        assert!(controller.is_recording());
        assert_eq!(controller.active_path(), Some(path.clone()));
        assert_eq!(camera.recording_path(), Some(path.clone()));
        assert_eq!(arbiter.state().unwrap().mode, CaptureMode::FullRes);

        let stopped = controller.toggle().unwrap();
        assert_eq!(stopped, ToggleOutcome::Stopped { path: path.clone() });
        assert_eq!(
            stopped.to_string(),
            format!("Recording stopped, saved as {}", path.display())
        );
        assert!(!controller.is_recording());
        assert_eq!(controller.active_path(), None);
        assert_eq!(arbiter.state().unwrap().mode, CaptureMode::LowRes);
    }

    #[test]
    fn test_recording_with_viewer_keeps_full_mode() {
        let (camera, arbiter, controller) = setup();
        arbiter.acquire_viewer().unwrap();

        controller.toggle().unwrap();
        assert_eq!(arbiter.state().unwrap().mode, CaptureMode::FullRes);
        controller.toggle().unwrap();

        let state = arbiter.state().unwrap();
        assert_eq!(state.mode, CaptureMode::FullRes);
        assert_eq!(state.active_viewers, 1);
        assert_eq!(camera.configure_count(CaptureMode::FullRes), 1);
    }

    #[test]
    fn test_stop_with_viewer_extends_settle_window() {
        let camera = Arc::new(SimulatedCamera::new(CameraConfig::default()));
        let arbiter = Arc::new(
            ModeArbiter::start(camera.clone(), ArbiterConfig { settle_window_ms: 50 }).unwrap(),
        );
        let controller = RecordingController::new(arbiter.clone(), &RecordingConfig::default());
        arbiter.acquire_viewer().unwrap();
        controller.toggle().unwrap();

        std::thread::sleep(Duration::from_millis(80));
        assert!(!arbiter.is_within_settle_window(Instant::now()));
        let before = arbiter.state().unwrap().settle_until;

        controller.toggle().unwrap();
        let state = arbiter.state().unwrap();
        assert!(state.settle_until > before);
        assert!(arbiter.is_within_settle_window(Instant::now()));
        // Extended without another switch
        assert_eq!(state.mode, CaptureMode::FullRes);
        assert_eq!(camera.configure_count(CaptureMode::FullRes), 1);
    }

    #[test]
    fn test_encoder_failure_rolls_back_claim() {
        let (camera, arbiter, controller) = setup();
        camera.fail_next_start_recording();

        assert!(matches!(controller.toggle(), Err(RecordingError::Device(_))));
        assert_eq!(controller.state(), RecordingState::default());

        let state = arbiter.state().unwrap();
        assert!(!state.recording);
        assert_eq!(state.mode, CaptureMode::LowRes);
    }

    #[test]
    fn test_mode_failure_leaves_controller_idle() {
        let (camera, arbiter, controller) = setup();
        camera.fail_next_configure(1);

        assert!(matches!(controller.toggle(), Err(RecordingError::Arbiter(_))));
        assert!(!controller.is_recording());
        assert!(!arbiter.state().unwrap().recording);
        assert_eq!(camera.recording_path(), None);
    }

    #[test]
    fn test_started_message() {
        let outcome = ToggleOutcome::Started {
            path: PathBuf::from("/tmp/video_1.h264"),
        };
        assert_eq!(outcome.to_string(), "Recording started");
    }

    #[test]
    fn test_output_dir_override() {
        let config = RecordingConfig {
            output_dir: Some(PathBuf::from("/data")),
        };
        assert_eq!(config.resolve_output_dir(), PathBuf::from("/data"));
    }
}
