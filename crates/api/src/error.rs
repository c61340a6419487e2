//! API error types

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use mode_arbiter::{ArbiterError, RecordingError};
use motion::MotionError;
use thiserror::Error;
use tracing::warn;

/// Realm sent with 401 challenges
pub const AUTH_REALM: &str = "Basic realm=\"Login Required\"";

/// HTTP boundary error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Camera unavailable: {0}")]
    Arbiter(#[from] ArbiterError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Motion monitor error: {0}")]
    Motion(#[from] MotionError),

    #[error("Startup error: {0}")]
    Startup(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, AUTH_REALM)],
                "Authentication required",
            )
                .into_response(),
            ApiError::Arbiter(e) => {
                warn!("Rejecting request, camera unavailable: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, format!("Camera unavailable: {}", e)).into_response()
            }
            other => {
                warn!("Request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", other)).into_response()
            }
        }
    }
}
