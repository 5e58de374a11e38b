//! Bounded re-reads while the store is still indexing.

use std::time::Duration;

use tether_client::MemoryStore;
use tether_types::{ContextRequest, MemoryContextResponse};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fixed-attempt, fixed-backoff read policy.
///
/// A freshly written interaction may not be searchable yet, so a read that
/// reports zero memories, or fails, is repeated until attempts run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total reads, including the first. Never below one.
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1500))
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// A single read, no retries.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Read context under this policy.
    ///
    /// Returns the last successful response even if it is still empty. An
    /// error is returned only when no attempt succeeded. Cancellation stops
    /// waiting and returns what has been read so far.
    pub async fn read(
        &self,
        store: &dyn MemoryStore,
        request: &ContextRequest,
        cancel: &CancellationToken,
    ) -> tether_client::Result<MemoryContextResponse> {
        let mut last_ok: Option<MemoryContextResponse> = None;
        let mut last_err: Option<tether_client::Error> = None;

        for attempt in 1..=self.attempts {
            match store.context(request).await {
                Ok(response) if response.stats.memories > 0 => return Ok(response),
                Ok(response) => {
                    debug!(attempt, "Context read reported no memories yet");
                    last_ok = Some(response);
                    last_err = None;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Context read failed");
                    last_err = Some(e);
                }
            }

            if attempt == self.attempts {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }

        match (last_ok, last_err) {
            (Some(response), _) => Ok(response),
            (None, Some(e)) => Err(e),
            // Unreachable with attempts >= 1
            (None, None) => Ok(MemoryContextResponse::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_client::MockMemoryStore;
    use tether_types::ContextStats;

    fn with_memories(memories: u64) -> MemoryContextResponse {
        MemoryContextResponse {
            stats: ContextStats {
                memories,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retries_until_memories_appear() {
        let store = MockMemoryStore::new()
            .with_context_sequence(vec![with_memories(0), with_memories(0)])
            .with_context(with_memories(2));
        let request = ContextRequest::new("u", "q", 5);

        let response = fast(3)
            .read(&store, &request, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.stats.memories, 2);
        assert_eq!(store.context_count(), 3);
    }

    #[tokio::test]
    async fn test_uses_last_response_when_still_empty() {
        let store = MockMemoryStore::new();
        let request = ContextRequest::new("u", "q", 5);

        let response = fast(2)
            .read(&store, &request, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.stats.memories, 0);
        assert_eq!(store.context_count(), 2);
    }

    #[tokio::test]
    async fn test_errors_exhaust_attempts() {
        let store = MockMemoryStore::new().with_failing_context();
        let request = ContextRequest::new("u", "q", 5);

        let err = fast(3)
            .read(&store, &request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.context_count(), 3);
    }

    #[tokio::test]
    async fn test_first_hit_returns_immediately() {
        let store = MockMemoryStore::new().with_context(with_memories(1));
        let request = ContextRequest::new("u", "q", 5);

        fast(5)
            .read(&store, &request, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(store.context_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_backoff() {
        let store = MockMemoryStore::new();
        let request = ContextRequest::new("u", "q", 5);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let policy = RetryPolicy::new(5, Duration::from_secs(60));
        let response = policy.read(&store, &request, &cancel).await.unwrap();
        assert_eq!(response.stats.memories, 0);
        assert_eq!(store.context_count(), 1);
    }

    #[test]
    fn test_attempts_floor_is_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }
}
