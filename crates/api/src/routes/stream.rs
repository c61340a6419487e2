//! MJPEG Viewer Route
//!
//! Each request holds a [`ViewerSession`] for as long as its body is being
//! read. Frames are captured and encoded on a blocking thread and handed to
//! the response body through a small channel; when the client disconnects
//! the channel closes, the pump exits and the session releases its claim.
//! Server shutdown ends the body the same way.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use camera_capture::StreamId;
use futures_util::stream;
use mode_arbiter::ViewerSession;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::{ApiError, AppState};

/// Multipart boundary between JPEG parts
pub const BOUNDARY: &str = "frame";

/// Response content type of the viewer stream
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Wrap one JPEG as a multipart part
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", BOUNDARY);
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

/// `GET /` - live main-stream feed
pub async fn video_feed(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let arbiter = state.arbiter.clone();
    // Blocks for the mode switch when this is the first viewer
    let session = tokio::task::spawn_blocking(move || ViewerSession::acquire(arbiter)).await??;
    info!("Viewer connected");

    let config = state.stream.clone();
    let (tx, rx) = mpsc::channel::<Bytes>(config.buffer_frames.max(1));
    let pump_shutdown = state.shutdown_receiver();
    tokio::task::spawn_blocking(move || pump_frames(session, tx, pump_shutdown, config));

    let parts = stream::unfold((rx, state.shutdown_receiver()), |(mut rx, mut shutdown)| async move {
        if *shutdown.borrow_and_update() {
            return None;
        }
        tokio::select! {
            part = rx.recv() => part.map(|part| (Ok::<_, Infallible>(part), (rx, shutdown))),
            // Dropping `rx` here unblocks the pump
            _ = shutdown.changed() => None,
        }
    });

    Ok((
        [(header::CONTENT_TYPE, MJPEG_CONTENT_TYPE)],
        Body::from_stream(parts),
    )
        .into_response())
}

/// Capture, encode and send frames until the viewer goes away
fn pump_frames(
    session: ViewerSession,
    tx: mpsc::Sender<Bytes>,
    shutdown: watch::Receiver<bool>,
    config: StreamConfig,
) {
    let device = session.arbiter().device().clone();

    loop {
        if *shutdown.borrow() {
            debug!("Server shutting down, closing viewer stream");
            break;
        }

        let jpeg = device
            .capture_frame(StreamId::Main)
            .and_then(|frame| frame.encode_jpeg(config.width, config.height, config.jpeg_quality));

        let jpeg = match jpeg {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!("Ending viewer stream: {}", e);
                break;
            }
        };

        if tx.blocking_send(multipart_part(&jpeg)).is_err() {
            debug!("Viewer went away");
            break;
        }
    }

    drop(session);
    info!("Viewer disconnected");
}
