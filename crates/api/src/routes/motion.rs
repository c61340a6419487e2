//! Motion Status Route

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::AppState;

/// `GET /motion_alerts` - `motion` or `nomotion`, polled by the display client
pub async fn motion_alerts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = if state.motion.is_motion_active() {
        "motion"
    } else {
        "nomotion"
    };
    ([(header::CONTENT_TYPE, "text/plain")], status)
}
