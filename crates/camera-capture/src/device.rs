//! Capture device contract

use std::path::Path;
use std::sync::Arc;

use crate::{CaptureMode, DeviceError, Frame, StreamId};

/// The physical camera as seen by the rest of the system.
///
/// Implementations must be callable from several threads at once: the motion
/// loop keeps pulling lores frames while viewers pull main frames. Mode changes
/// are serialized by the caller, so `configure`/`start` never overlap.
/// Reconfiguration is slow and stalls capture on every stream while it runs.
pub trait CaptureDevice: Send + Sync {
    /// Load the stream configuration for `mode`. Leaves the device stopped.
    fn configure(&self, mode: CaptureMode) -> Result<(), DeviceError>;

    /// Start streaming with the last applied configuration.
    fn start(&self) -> Result<(), DeviceError>;

    /// Block until the next frame of `stream` is available.
    fn capture_frame(&self, stream: StreamId) -> Result<Frame, DeviceError>;

    /// Start hardware H.264 encoding of the main stream into `path`.
    fn start_recording(&self, path: &Path) -> Result<(), DeviceError>;

    /// Stop the encoder. Capture keeps running in the current mode.
    fn stop_recording(&self) -> Result<(), DeviceError>;
}

/// Device handle shared by the arbiter, the motion loop and viewers
pub type SharedDevice = Arc<dyn CaptureDevice>;
