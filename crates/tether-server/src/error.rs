//! Error types for the server.

use std::path::PathBuf;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Empty or malformed request body.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No route for the path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Could not bind or serve.
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading, writing or removing the discovery file failed.
    #[error("Discovery file {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The discovery file exists but cannot be decoded.
    #[error("Invalid discovery file {}: {source}", path.display())]
    InvalidDiscovery {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// HTTP status code.
    pub code: u16,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, error = %message, "Client error");
        }

        let body = ErrorResponse {
            error: message,
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
