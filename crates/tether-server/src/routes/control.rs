//! Control endpoints.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;

/// Response of `POST /control/clear-cache`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearCacheResponse {
    pub ok: bool,
    /// Entries dropped from the context cache.
    pub cleared: usize,
}

/// Empty the local context cache.
pub async fn clear_cache_handler(State(state): State<AppState>) -> Json<ClearCacheResponse> {
    let cleared = state.sequencer.cache().clear().await;
    info!(cleared, "Context cache cleared on request");
    Json(ClearCacheResponse { ok: true, cleared })
}
