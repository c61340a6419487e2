//! HTTP Basic authentication middleware

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::config::AuthConfig;
use crate::{ApiError, AppState};

/// Extract `(username, password)` from an `Authorization: Basic` header
pub fn parse_basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Byte comparison whose running time depends only on the input lengths
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

/// Whether the request carries the configured credentials
pub fn is_authorized(auth: &AuthConfig, headers: &HeaderMap) -> bool {
    let Some((expected_user, expected_pass)) = auth.credentials() else {
        return false;
    };
    match parse_basic_auth(headers) {
        Some((user, pass)) => {
            // Both halves are always compared
            let user_ok = constant_time_eq(user.as_bytes(), expected_user.as_bytes());
            let pass_ok = constant_time_eq(pass.as_bytes(), expected_pass.as_bytes());
            user_ok & pass_ok
        }
        None => false,
    }
}

/// Reject requests without valid credentials
pub async fn require_basic_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if is_authorized(&state.auth, request.headers()) {
        next.run(request).await
    } else {
        debug!("Rejected unauthenticated request to {}", request.uri().path());
        ApiError::Unauthorized.into_response()
    }
}
