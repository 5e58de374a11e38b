//! The memory store seam.

use std::sync::Arc;

use async_trait::async_trait;
use tether_types::{ContextRequest, MemoryContextResponse, MemoryRecordRequest, RecordResponse};
use tracing::debug;

use crate::client::MemoryClient;
use crate::error::{Error, Result};

/// Operations the remote long-term memory store offers.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Persist an interaction. A response with `success == false` is an error.
    async fn record(&self, request: &MemoryRecordRequest) -> Result<RecordResponse>;

    /// Read back context for a query.
    async fn context(&self, request: &ContextRequest) -> Result<MemoryContextResponse>;
}

/// Shared handle to a memory store.
pub type SharedMemoryStore = Arc<dyn MemoryStore>;

#[async_trait]
impl MemoryStore for MemoryClient {
    async fn record(&self, request: &MemoryRecordRequest) -> Result<RecordResponse> {
        let response: RecordResponse = self.post("record", request).await?;
        if !response.success {
            return Err(Error::Rejected(format!(
                "store reported failure for session {}",
                request.session_id
            )));
        }
        debug!(
            session_id = %request.session_id,
            memories_created = response.memories_created,
            stored_artifacts = response.stored_artifacts,
            "Interaction recorded"
        );
        Ok(response)
    }

    async fn context(&self, request: &ContextRequest) -> Result<MemoryContextResponse> {
        let response: MemoryContextResponse = self.post("context", request).await?;
        debug!(
            memories = response.stats.memories,
            sections = response.sections.len(),
            entities = response.entities.len(),
            "Context fetched"
        );
        Ok(response)
    }
}
