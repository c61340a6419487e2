//! Viewer session guard

use std::sync::Arc;

use tracing::warn;

use crate::{ArbiterError, ModeArbiter};

/// A viewer's claim on full-resolution mode.
///
/// Created only after `acquire_viewer` succeeded; dropping it releases the
/// claim exactly once, however the session ends.
pub struct ViewerSession {
    arbiter: Arc<ModeArbiter>,
}

impl ViewerSession {
    /// Register a viewer. Blocks while the device switches to FullRes.
    pub fn acquire(arbiter: Arc<ModeArbiter>) -> Result<Self, ArbiterError> {
        arbiter.acquire_viewer()?;
        Ok(Self { arbiter })
    }

    /// Arbiter this session holds a claim on
    pub fn arbiter(&self) -> &Arc<ModeArbiter> {
        &self.arbiter
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        if let Err(e) = self.arbiter.release_viewer() {
            warn!("Failed to release viewer session: {}", e);
        }
    }
}
