//! Request logging middleware.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, trace, warn};

use crate::state::AppState;

/// Log method, path, status and duration of each request.
///
/// Headers and bodies are never logged; they carry the hook token and
/// user prompts. Successful hook traffic is frequent, so it stays at trace.
pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let code = status.as_u16();
    let duration_ms = started.elapsed().as_millis() as u64;
    match status {
        StatusCode::UNAUTHORIZED => {
            warn!(%method, %path, status = code, duration_ms, "Hook request without a valid token")
        }
        s if s.is_server_error() => {
            error!(%method, %path, status = code, duration_ms, "Hook request failed")
        }
        s if s.is_client_error() => {
            debug!(%method, %path, status = code, duration_ms, "Hook request refused")
        }
        _ => trace!(%method, %path, status = code, duration_ms, "Hook request handled"),
    }

    response
}
