//! Scriptable in-memory [`MemoryStore`] for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tether_types::{ContextRequest, MemoryContextResponse, MemoryRecordRequest, RecordResponse};

use crate::error::{Error, Result};
use crate::store::MemoryStore;

/// A memory store that records every call and replays scripted responses.
///
/// Context responses are served from a queue; once it is drained the
/// fallback response (empty by default) is returned.
#[derive(Default)]
pub struct MockMemoryStore {
    records: Mutex<Vec<MemoryRecordRequest>>,
    context_requests: Mutex<Vec<ContextRequest>>,
    context_queue: Mutex<VecDeque<MemoryContextResponse>>,
    fallback_context: Mutex<MemoryContextResponse>,
    fail_record: AtomicBool,
    fail_context: AtomicBool,
    record_delay: Mutex<Option<Duration>>,
}

impl MockMemoryStore {
    /// Create a store that accepts every write and returns empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return this response for every context read.
    pub fn with_context(self, response: MemoryContextResponse) -> Self {
        *self.fallback_context.lock().unwrap() = response;
        self
    }

    /// Serve these responses in order before falling back.
    pub fn with_context_sequence(self, responses: Vec<MemoryContextResponse>) -> Self {
        self.context_queue.lock().unwrap().extend(responses);
        self
    }

    /// Make every write fail with a 503.
    pub fn with_failing_record(self) -> Self {
        self.fail_record.store(true, Ordering::SeqCst);
        self
    }

    /// Make every read fail with a 503.
    pub fn with_failing_context(self) -> Self {
        self.fail_context.store(true, Ordering::SeqCst);
        self
    }

    /// Delay each write, to hold a synchronization in flight.
    pub fn with_record_delay(self, delay: Duration) -> Self {
        *self.record_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Toggle write failures after construction.
    pub fn set_fail_record(&self, fail: bool) {
        self.fail_record.store(fail, Ordering::SeqCst);
    }

    /// Toggle read failures after construction.
    pub fn set_fail_context(&self, fail: bool) {
        self.fail_context.store(fail, Ordering::SeqCst);
    }

    /// Every write request received, in order.
    pub fn recorded(&self) -> Vec<MemoryRecordRequest> {
        self.records.lock().unwrap().clone()
    }

    /// Every read request received, in order.
    pub fn context_requests(&self) -> Vec<ContextRequest> {
        self.context_requests.lock().unwrap().clone()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn context_count(&self) -> usize {
        self.context_requests.lock().unwrap().len()
    }
}

fn unavailable(operation: &str) -> Error {
    Error::Api {
        status: 503,
        message: format!("mock {} failure", operation),
    }
}

#[async_trait]
impl MemoryStore for MockMemoryStore {
    async fn record(&self, request: &MemoryRecordRequest) -> Result<RecordResponse> {
        self.records.lock().unwrap().push(request.clone());

        let delay = *self.record_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_record.load(Ordering::SeqCst) {
            return Err(unavailable("record"));
        }

        Ok(RecordResponse {
            success: true,
            stored_artifacts: request.artifacts.len() as u64,
            memories_created: 1,
            memory_stats: serde_json::Value::Null,
        })
    }

    async fn context(&self, request: &ContextRequest) -> Result<MemoryContextResponse> {
        self.context_requests.lock().unwrap().push(request.clone());

        if self.fail_context.load(Ordering::SeqCst) {
            return Err(unavailable("context"));
        }

        if let Some(next) = self.context_queue.lock().unwrap().pop_front() {
            return Ok(next);
        }
        Ok(self.fallback_context.lock().unwrap().clone())
    }
}
