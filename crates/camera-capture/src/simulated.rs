//! Simulated camera backend
//!
//! Produces synthetic frames with the same layout as the real sensor and
//! enforces the same mode rules (no main stream in LowRes, no reconfigure
//! while encoding). Used on development hosts and throughout the tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::{
    CameraConfig, CaptureDevice, CaptureMode, DeviceError, Frame, PixelFormat, StreamId,
};

/// Size of the bright square drawn when scene motion is enabled
const MOTION_BLOCK: u32 = 80;

#[derive(Debug, Default)]
struct SimState {
    configured: Option<CaptureMode>,
    running: bool,
    recording: Option<PathBuf>,
    sequence: u32,
    scene_motion: bool,
    fail_configure: usize,
    fail_start_recording: bool,
}

/// Synthetic camera implementing [`CaptureDevice`]
#[derive(Debug)]
pub struct SimulatedCamera {
    config: CameraConfig,
    state: Mutex<SimState>,
    /// Sleep one frame period per capture
    pacing: bool,
    /// Time a reconfiguration takes
    switch_latency: Duration,
    low_res_configures: AtomicUsize,
    full_res_configures: AtomicUsize,
    starts: AtomicUsize,
    in_configure: AtomicBool,
    overlapping_configure: AtomicBool,
}

impl SimulatedCamera {
    /// Create an unpaced simulated camera (captures return immediately)
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SimState::default()),
            pacing: false,
            switch_latency: Duration::ZERO,
            low_res_configures: AtomicUsize::new(0),
            full_res_configures: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            in_configure: AtomicBool::new(false),
            overlapping_configure: AtomicBool::new(false),
        }
    }

    /// Pace captures at the configured frame rate, like the real sensor
    pub fn with_frame_pacing(mut self, pacing: bool) -> Self {
        self.pacing = pacing;
        self
    }

    /// Make every reconfiguration block for `latency`
    pub fn with_switch_latency(mut self, latency: Duration) -> Self {
        self.switch_latency = latency;
        self
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        // State is plain data; a panic mid-update cannot leave it torn
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of `configure` calls that targeted `mode`
    pub fn configure_count(&self, mode: CaptureMode) -> usize {
        match mode {
            CaptureMode::LowRes => self.low_res_configures.load(Ordering::SeqCst),
            CaptureMode::FullRes => self.full_res_configures.load(Ordering::SeqCst),
        }
    }

    /// Number of `start` calls
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// True if two `configure` calls ever ran at the same time
    pub fn saw_overlapping_configure(&self) -> bool {
        self.overlapping_configure.load(Ordering::SeqCst)
    }

    /// Mode most recently configured on the device
    pub fn configured_mode(&self) -> Option<CaptureMode> {
        self.state().configured
    }

    /// Whether the device is streaming
    pub fn is_running(&self) -> bool {
        self.state().running
    }

    /// Path the encoder is writing to, if recording
    pub fn recording_path(&self) -> Option<PathBuf> {
        self.state().recording.clone()
    }

    /// Draw a moving square in the lores stream
    pub fn set_scene_motion(&self, moving: bool) {
        self.state().scene_motion = moving;
    }

    /// Fail the next `count` configure calls
    pub fn fail_next_configure(&self, count: usize) {
        self.state().fail_configure = count;
    }

    /// Fail the next `start_recording` call
    pub fn fail_next_start_recording(&self) {
        self.state().fail_start_recording = true;
    }

    fn timestamp_ns() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }

    fn lores_frame(&self, sequence: u32, scene_motion: bool) -> Frame {
        let size = self.config.lores;
        let (w, h) = (size.width, size.height);
        let mut data = vec![16u8; (w * h) as usize];

        if scene_motion && w > MOTION_BLOCK && h > MOTION_BLOCK {
            let x0 = sequence.wrapping_mul(MOTION_BLOCK / 2) % (w - MOTION_BLOCK);
            let y0 = (h - MOTION_BLOCK) / 2;
            for y in y0..y0 + MOTION_BLOCK {
                let row = (y * w) as usize;
                data[row + x0 as usize..row + (x0 + MOTION_BLOCK) as usize].fill(235);
            }
        }

        // Neutral chroma planes
        data.resize(PixelFormat::Yuv420.buffer_len(w, h), 128);
        Frame::new(data, w, h, PixelFormat::Yuv420, Self::timestamp_ns(), sequence)
    }

    fn main_frame(&self, sequence: u32) -> Frame {
        let size = self.config.main;
        let (w, h) = (size.width, size.height);
        let mut data = Vec::with_capacity(PixelFormat::Rgb888.buffer_len(w, h));
        for y in 0..h {
            for x in 0..w {
                data.push(((x + sequence) % 256) as u8);
                data.push((y % 256) as u8);
                data.push(128);
            }
        }
        Frame::new(data, w, h, PixelFormat::Rgb888, Self::timestamp_ns(), sequence)
    }
}

impl CaptureDevice for SimulatedCamera {
    fn configure(&self, mode: CaptureMode) -> Result<(), DeviceError> {
        if self.in_configure.swap(true, Ordering::SeqCst) {
            self.overlapping_configure.store(true, Ordering::SeqCst);
        }

        let result = {
            let mut state = self.state();
            if state.recording.is_some() {
                Err(DeviceError::Configure {
                    mode,
                    reason: "encoder is running".into(),
                })
            } else if state.fail_configure > 0 {
                state.fail_configure -= 1;
                Err(DeviceError::Configure {
                    mode,
                    reason: "injected failure".into(),
                })
            } else {
                if !self.switch_latency.is_zero() {
                    std::thread::sleep(self.switch_latency);
                }
                state.configured = Some(mode);
                state.running = false;
                Ok(())
            }
        };

        if result.is_ok() {
            let counter = match mode {
                CaptureMode::LowRes => &self.low_res_configures,
                CaptureMode::FullRes => &self.full_res_configures,
            };
            counter.fetch_add(1, Ordering::SeqCst);
            debug!("Simulated camera configured for {}", mode);
        }

        self.in_configure.store(false, Ordering::SeqCst);
        result
    }

    fn start(&self) -> Result<(), DeviceError> {
        let mut state = self.state();
        if state.configured.is_none() {
            return Err(DeviceError::Start("no configuration applied".into()));
        }
        state.running = true;
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn capture_frame(&self, stream: StreamId) -> Result<Frame, DeviceError> {
        let (mode, sequence, scene_motion) = {
            let mut state = self.state();
            let mode = match (state.configured, state.running) {
                (Some(mode), true) => mode,
                _ => return Err(DeviceError::NotInitialized),
            };
            if stream == StreamId::Main && mode != CaptureMode::FullRes {
                return Err(DeviceError::StreamUnavailable(stream));
            }
            state.sequence = state.sequence.wrapping_add(1);
            (mode, state.sequence, state.scene_motion)
        };

        if self.pacing {
            std::thread::sleep(self.config.frame_period(mode));
        }

        Ok(match stream {
            StreamId::Lores => self.lores_frame(sequence, scene_motion),
            StreamId::Main => self.main_frame(sequence),
        })
    }

    fn start_recording(&self, path: &Path) -> Result<(), DeviceError> {
        let mut state = self.state();
        if state.configured != Some(CaptureMode::FullRes) || !state.running {
            return Err(DeviceError::StreamUnavailable(StreamId::Main));
        }
        if state.recording.is_some() {
            return Err(DeviceError::Recording("encoder already running".into()));
        }
        if state.fail_start_recording {
            state.fail_start_recording = false;
            return Err(DeviceError::Recording("injected encoder failure".into()));
        }
        info!("Simulated encoder writing to {}", path.display());
        state.recording = Some(path.to_path_buf());
        Ok(())
    }

    fn stop_recording(&self) -> Result<(), DeviceError> {
        let mut state = self.state();
        match state.recording.take() {
            Some(path) => {
                info!("Simulated encoder closed {}", path.display());
                Ok(())
            }
            None => Err(DeviceError::Recording("no recording in progress".into())),
        }
    }
}
