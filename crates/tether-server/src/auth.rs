//! Hook token authentication.
//!
//! Every request must carry `X-Hook-Token` matching the token generated at
//! startup and published in the discovery file. The comparison runs in
//! constant time, and the token is never logged.

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Header carrying the hook token.
pub const HOOK_TOKEN_HEADER: &str = "x-hook-token";

/// Random bytes per generated token.
const TOKEN_BYTES: usize = 32;

/// Authentication error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `X-Hook-Token` header.
    MissingToken,
    /// Header present but not valid UTF-8 or not matching.
    InvalidToken,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing hook token"),
            AuthError::InvalidToken => write!(f, "Invalid hook token"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::UNAUTHORIZED;
        let body = serde_json::json!({
            "error": self.to_string(),
            "code": status.as_u16(),
        });
        (status, axum::Json(body)).into_response()
    }
}

/// Generate a fresh random token (URL-safe base64, 256 bits).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compare two strings in constant time.
///
/// Unequal lengths still run a comparison so the timing does not depend on
/// where the inputs differ.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}

/// Reject requests without a matching hook token before any routing.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    validate_request(&request, &state.config.token)?;
    Ok(next.run(request).await)
}

fn validate_request(request: &Request<Body>, expected: &str) -> Result<(), AuthError> {
    let header = request
        .headers()
        .get(HOOK_TOKEN_HEADER)
        .ok_or(AuthError::MissingToken)?;
    let token = header.to_str().map_err(|_| AuthError::InvalidToken)?;

    if constant_time_eq(token.trim(), expected) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}
