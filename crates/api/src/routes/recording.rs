//! Recording Routes

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};

use crate::{ApiError, AppState};

const RECORDER_PAGE: &str = include_str!("recorder.html");

/// `GET /record` - recorder control page
pub async fn record_page() -> Html<&'static str> {
    Html(RECORDER_PAGE)
}

/// `POST /toggle_record` - start or stop the encoder
pub async fn toggle_record(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    let recorder = state.recorder.clone();
    let outcome = tokio::task::spawn_blocking(move || recorder.toggle()).await??;
    Ok(outcome.to_string())
}

/// `GET /record_status` - `recording` or `not_recording`
pub async fn record_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = if state.recorder.is_recording() {
        "recording"
    } else {
        "not_recording"
    };
    ([(header::CONTENT_TYPE, "text/plain")], status)
}
