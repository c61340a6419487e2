//! Mode Arbiter Implementation

use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use camera_capture::{CaptureMode, SharedDevice};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ArbiterError;

/// Arbiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// Motion suppression period after every mode switch (milliseconds)
    pub settle_window_ms: u64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            settle_window_ms: 2000,
        }
    }
}

impl ArbiterConfig {
    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }
}

/// Snapshot of the arbitrated device state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbiterState {
    /// Mode the device is currently configured in
    pub mode: CaptureMode,
    /// Viewer sessions holding a claim on full resolution
    pub active_viewers: usize,
    /// Whether the encoder holds a claim on full resolution
    pub recording: bool,
    /// Motion signals before this instant are ignored
    pub settle_until: Option<Instant>,
}

impl ArbiterState {
    /// Whether anyone currently needs the main stream
    pub fn needs_full_mode(&self) -> bool {
        self.active_viewers > 0 || self.recording
    }

    /// Mode matches the claims held on it
    pub fn is_consistent(&self) -> bool {
        (self.mode == CaptureMode::FullRes) == self.needs_full_mode()
    }
}

/// Single owner of the device's capture mode.
///
/// Every mutating operation holds one lock across the whole
/// read-modify-device-call sequence, so concurrent viewers and the recording
/// toggle observe a single reconfiguration and never interleave.
///
/// The settle deadline is mirrored outside that lock so the motion thread can
/// query it while a switch is in progress.
pub struct ModeArbiter {
    device: SharedDevice,
    settle_window: Duration,
    state: Mutex<ArbiterState>,
    settle_deadline: RwLock<Option<Instant>>,
}

impl ModeArbiter {
    /// Put the device into LowRes, start it, and take ownership of its mode
    pub fn start(device: SharedDevice, config: ArbiterConfig) -> Result<Self, ArbiterError> {
        device.configure(CaptureMode::LowRes)?;
        device.start()?;

        let settle_window = config.settle_window();
        info!(
            "Mode arbiter started in {} mode (settle window {:?})",
            CaptureMode::LowRes,
            settle_window
        );
        gauge!("arbiter_active_viewers").set(0.0);

        // The sensor is still adjusting exposure right after start
        let settle_until = Some(Instant::now() + settle_window);
        Ok(Self {
            device,
            settle_window,
            state: Mutex::new(ArbiterState {
                mode: CaptureMode::LowRes,
                active_viewers: 0,
                recording: false,
                settle_until,
            }),
            settle_deadline: RwLock::new(settle_until),
        })
    }

    /// Device this arbiter controls
    pub fn device(&self) -> &SharedDevice {
        &self.device
    }

    fn lock(&self) -> Result<MutexGuard<'_, ArbiterState>, ArbiterError> {
        self.state.lock().map_err(|_| ArbiterError::Poisoned)
    }

    /// Start a new settle window. Callers hold the state lock.
    fn restart_settle_window(&self, state: &mut ArbiterState) {
        let until = Some(Instant::now() + self.settle_window);
        state.settle_until = until;
        match self.settle_deadline.write() {
            Ok(mut deadline) => *deadline = until,
            Err(poisoned) => *poisoned.into_inner() = until,
        }
    }

    /// Reconfigure the device. Only advances `state` if both calls succeed.
    fn switch_to(&self, state: &mut ArbiterState, mode: CaptureMode) -> Result<(), ArbiterError> {
        let result = self
            .device
            .configure(mode)
            .and_then(|_| self.device.start());

        if let Err(e) = result {
            warn!("Failed to switch camera to {} mode: {}", mode, e);
            counter!("arbiter_device_errors_total").increment(1);
            return Err(e.into());
        }

        state.mode = mode;
        self.restart_settle_window(state);
        counter!("arbiter_mode_switches_total", "mode" => mode.as_str()).increment(1);
        Ok(())
    }

    fn ensure_full(&self, state: &mut ArbiterState) -> Result<(), ArbiterError> {
        if state.mode == CaptureMode::FullRes {
            debug!("Already in full stream mode");
            return Ok(());
        }
        info!("Switching to full stream mode");
        self.switch_to(state, CaptureMode::FullRes)
    }

    fn relax_if_idle(&self, state: &mut ArbiterState) -> Result<(), ArbiterError> {
        if state.mode != CaptureMode::FullRes || state.needs_full_mode() {
            return Ok(());
        }
        info!("Switching back to lores mode");
        self.switch_to(state, CaptureMode::LowRes)
    }

    /// Guarantee FullRes. Blocks for the hardware switch if one is needed.
    pub fn request_full_mode(&self) -> Result<(), ArbiterError> {
        let mut state = self.lock()?;
        self.ensure_full(&mut state)
    }

    /// Register a viewer and guarantee FullRes before its first frame.
    ///
    /// The registration is rolled back if the device cannot switch.
    pub fn acquire_viewer(&self) -> Result<(), ArbiterError> {
        let mut state = self.lock()?;
        state.active_viewers += 1;

        if let Err(e) = self.ensure_full(&mut state) {
            state.active_viewers -= 1;
            return Err(e);
        }

        gauge!("arbiter_active_viewers").set(state.active_viewers as f64);
        debug!("Viewer acquired ({} active)", state.active_viewers);
        Ok(())
    }

    /// Deregister a viewer; relax to LowRes when nobody needs FullRes
    pub fn release_viewer(&self) -> Result<(), ArbiterError> {
        let mut state = self.lock()?;
        match state.active_viewers.checked_sub(1) {
            Some(count) => state.active_viewers = count,
            None => warn!("Viewer released with no active viewers"),
        }

        gauge!("arbiter_active_viewers").set(state.active_viewers as f64);
        debug!("Viewer released ({} active)", state.active_viewers);
        self.relax_if_idle(&mut state)
    }

    /// Claim FullRes for the encoder. No-op if already recording.
    pub fn begin_recording(&self) -> Result<(), ArbiterError> {
        let mut state = self.lock()?;
        if state.recording {
            debug!("Recording claim already held");
            return Ok(());
        }
        self.ensure_full(&mut state)?;
        state.recording = true;
        Ok(())
    }

    /// Drop the encoder's claim. The mode relaxes only if no viewers remain.
    pub fn end_recording(&self) -> Result<(), ArbiterError> {
        let mut state = self.lock()?;
        if !state.recording {
            debug!("No recording claim to release");
            return Ok(());
        }

        state.recording = false;

        let viewers_remaining = state.active_viewers > 0;
        if viewers_remaining {
            info!(
                "Keeping camera in full stream mode for {} active viewers",
                state.active_viewers
            );
            Ok(())
        } else {
            self.relax_if_idle(&mut state)
        }
    }

    /// Push the settle deadline out by one window from now.
    ///
    /// Used when the sensor is disturbed without a mode switch, such as the
    /// encoder stopping while viewers keep FullRes.
    pub fn extend_settle_window(&self) -> Result<(), ArbiterError> {
        let mut state = self.lock()?;
        self.restart_settle_window(&mut state);
        Ok(())
    }

    /// Whether motion signals at `now` fall inside the settle window.
    ///
    /// Never waits for an in-progress mode switch.
    pub fn is_within_settle_window(&self, now: Instant) -> bool {
        let deadline = match self.settle_deadline.read() {
            Ok(deadline) => *deadline,
            Err(poisoned) => *poisoned.into_inner(),
        };
        deadline.is_some_and(|until| now < until)
    }

    /// Consistent snapshot of the current state
    pub fn state(&self) -> Result<ArbiterState, ArbiterError> {
        Ok(self.lock()?.clone())
    }
}
