//! Route handlers.

mod control;
mod hooks;

pub use control::{ClearCacheResponse, clear_cache_handler};
pub use hooks::{HookResponse, after_handler, before_handler, thought_handler};

use axum::http::Uri;

use crate::error::ServerError;

/// Fallback for paths with no route.
pub async fn not_found_handler(uri: Uri) -> ServerError {
    ServerError::NotFound(uri.path().to_string())
}
