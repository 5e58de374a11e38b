//! Hook event handlers.
//!
//! Handlers never fail for reasons the event source could fix by retrying:
//! a response with nothing to pair with, or an empty response, is logged
//! and acknowledged with `200 {ok:true}`. Only unusable bodies get 400.

use axum::{Json, body::Bytes, extract::State};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tether_sync::SyncOutcome;
use tether_types::{AfterEvent, BeforeEvent, ThoughtEvent};
use tracing::{debug, error};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookResponse {
    pub ok: bool,
}

impl HookResponse {
    fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

/// Decode a JSON body. Content type is not checked; hosts vary.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ServerError::BadRequest("empty body".to_string()));
    }
    serde_json::from_slice(body)
        .map_err(|e| ServerError::BadRequest(format!("invalid JSON body: {}", e)))
}

/// `POST /hook/before`: a prompt was submitted.
pub async fn before_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<HookResponse>> {
    let event: BeforeEvent = parse_body(&body)?;
    state.stats.before();

    let stored = state.correlator.record_before(
        &event.prompt,
        event.conversation_id.as_deref(),
        event.generation_id.as_deref(),
        event.model.as_deref(),
    );
    if !stored {
        debug!("Before event not stored");
    }
    Ok(HookResponse::ok())
}

/// `POST /hook/after`: a response was produced.
///
/// A matched response is synchronized in the background; the request
/// returns as soon as the pair is formed.
pub async fn after_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<HookResponse>> {
    let event: AfterEvent = parse_body(&body)?;
    state.stats.after();

    let text = event.text.trim();
    if text.is_empty() {
        state.stats.dropped_empty();
        debug!("Dropping after event with empty response");
        return Ok(HookResponse::ok());
    }

    let Some(pending) = state.correlator.resolve_after(
        event.conversation_id.as_deref(),
        event.generation_id.as_deref(),
    ) else {
        state.stats.correlation_miss();
        debug!(
            conversation_id = event.conversation_id.as_deref().unwrap_or("-"),
            generation_id = event.generation_id.as_deref().unwrap_or("-"),
            "No pending prompt for after event"
        );
        return Ok(HookResponse::ok());
    };

    let interaction = pending.complete(text).with_artifacts(event.artifacts);
    state.stats.sync_started();

    let task_state = state.clone();
    state.tasks.spawn(async move {
        let state = task_state;
        match state.sequencer.sync(&state.host, interaction).await {
            Ok(SyncOutcome::Skipped) => {
                state.stats.sync_skipped();
                debug!("Synchronization skipped, another one is in flight");
            }
            Ok(outcome) => debug!(?outcome, "Synchronization done"),
            Err(e) => error!(error = %e, "Synchronization failed"),
        }
    });

    Ok(HookResponse::ok())
}

/// `POST /hook/thought`: intermediate reasoning. Logged, otherwise ignored.
pub async fn thought_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<HookResponse>> {
    let event: ThoughtEvent = parse_body(&body)?;
    state.stats.thought();
    debug!(
        duration_ms = event.duration_ms,
        chars = event.text.len(),
        "Thought event"
    );
    Ok(HookResponse::ok())
}
