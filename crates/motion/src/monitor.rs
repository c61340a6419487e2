//! Background motion monitor

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use camera_capture::StreamId;
use metrics::{counter, gauge};
use mode_arbiter::ModeArbiter;
use tracing::{debug, info, warn};

use crate::{DisplayPower, MotionConfig, MotionDetector, MotionError};

/// Read-only view of the detector's flags, shared with request handlers
#[derive(Debug, Clone)]
pub struct MotionStatus {
    motion_active: Arc<AtomicBool>,
    display_on: Arc<AtomicBool>,
}

impl Default for MotionStatus {
    fn default() -> Self {
        Self {
            motion_active: Arc::new(AtomicBool::new(false)),
            display_on: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl MotionStatus {
    pub fn is_motion_active(&self) -> bool {
        self.motion_active.load(Ordering::SeqCst)
    }

    pub fn is_display_on(&self) -> bool {
        self.display_on.load(Ordering::SeqCst)
    }

    fn publish(&self, motion_active: bool, display_on: bool) {
        self.motion_active.store(motion_active, Ordering::SeqCst);
        self.display_on.store(display_on, Ordering::SeqCst);
    }
}

/// Motion detector running on its own thread for the life of the process
pub struct MotionMonitor {
    status: MotionStatus,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MotionMonitor {
    /// Start sampling the lores stream once per check interval
    pub fn spawn(
        arbiter: Arc<ModeArbiter>,
        mut display: Box<dyn DisplayPower>,
        config: MotionConfig,
    ) -> Result<Self, MotionError> {
        config.validate()?;

        let status = MotionStatus::default();
        let shutdown = Arc::new(AtomicBool::new(false));
        let interval = config.check_interval();

        let thread_status = status.clone();
        let thread_shutdown = shutdown.clone();
        let handle = thread::Builder::new()
            .name("motion-detector".into())
            .spawn(move || {
                let mut detector = MotionDetector::new(config);
                info!("Motion detector running every {:?}", interval);

                while !thread_shutdown.load(Ordering::SeqCst) {
                    let frame = arbiter
                        .device()
                        .capture_frame(StreamId::Lores)
                        .and_then(|frame| frame.luma());

                    match frame {
                        Ok(gray) => {
                            let now = Instant::now();
                            let suppressed = arbiter.is_within_settle_window(now);
                            if let Some(on) = detector.observe(gray, now, suppressed) {
                                if let Err(e) = display.set_power(on) {
                                    warn!("Failed to switch display {}: {}", if on { "on" } else { "off" }, e);
                                    counter!("motion_display_errors_total").increment(1);
                                }
                            }
                            let state = detector.state();
                            thread_status.publish(state.motion_active, state.display_on);
                            gauge!("motion_active").set(if state.motion_active { 1.0 } else { 0.0 });
                        }
                        Err(e) => {
                            warn!("Lores capture failed: {}", e);
                            counter!("motion_capture_errors_total").increment(1);
                        }
                    }

                    thread::sleep(interval);
                }
                debug!("Motion detector stopped");
            })?;

        Ok(Self {
            status,
            shutdown,
            handle: Some(handle),
        })
    }

    /// Shared status handle
    pub fn status(&self) -> MotionStatus {
        self.status.clone()
    }

    /// Stop the detector thread and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Motion detector thread panicked");
            }
        }
    }
}

impl Drop for MotionMonitor {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}
