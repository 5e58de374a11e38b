//! Synchronization of completed interactions with the memory store.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tether_cache::ContextCache;
use tether_client::SharedMemoryStore;
use tether_types::{ContextRequest, CorrelatedInteraction, MemoryRecordRequest, now};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::artifact::{ContextArtifact, write_atomic};
use crate::error::{Result, SyncError};
use crate::retry::RetryPolicy;
use crate::session::session_id_for;

/// Value of the `source` metadata field on every record.
const RECORD_SOURCE: &str = "tether";

/// Sequencer settings.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    pub user_id: String,
    /// Maximum items requested per context read.
    pub context_limit: usize,
    /// Pause between a write and the read-back.
    pub settle_delay: Duration,
    pub retry: RetryPolicy,
    /// Artifact location, relative to the host context root.
    pub artifact_path: PathBuf,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            user_id: "default".to_string(),
            context_limit: 20,
            settle_delay: Duration::from_secs(2),
            retry: RetryPolicy::default(),
            artifact_path: PathBuf::from(".tether/memory-context.md"),
        }
    }
}

impl SequencerConfig {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.context_limit = limit;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }
}

/// The workspace an assistant session runs in.
///
/// Interactions from the same host context share a remote session and a
/// single artifact file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    root: PathBuf,
    session_id: String,
}

impl HostContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let session_id = session_id_for(&root);
        Self { root, session_id }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl fmt::Display for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.display())
    }
}

/// How a synchronization or refresh attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Fresh context was read and written to the artifact.
    Completed { memories: u64 },
    /// A refresh found cached context younger than the TTL.
    Cached,
    /// A remote call failed; a placeholder may have been written.
    Degraded { reason: String },
    /// Another attempt was in flight for the host context, or there was
    /// nothing to refresh.
    Skipped,
    /// The sequencer was disposed; results were thrown away.
    Discarded,
}

/// Removes the host context from the in-flight set when dropped.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}

/// Pushes correlated interactions to the memory store and republishes the
/// context artifact.
///
/// At most one attempt runs per host context; a second one arriving while
/// the first is in flight is skipped, never queued.
pub struct Sequencer {
    store: SharedMemoryStore,
    cache: ContextCache,
    config: SequencerConfig,
    in_flight: Mutex<HashSet<String>>,
    last_query: Mutex<HashMap<String, String>>,
    alive: AtomicBool,
    cancel: CancellationToken,
}

impl Sequencer {
    pub fn new(store: SharedMemoryStore, cache: ContextCache, config: SequencerConfig) -> Self {
        Self {
            store,
            cache,
            config,
            in_flight: Mutex::new(HashSet::new()),
            last_query: Mutex::new(HashMap::new()),
            alive: AtomicBool::new(true),
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn cache(&self) -> &ContextCache {
        &self.cache
    }

    /// Where the artifact for a host context lives.
    pub fn artifact_path(&self, host: &HostContext) -> PathBuf {
        host.root.join(&self.config.artifact_path)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Whether an attempt is running for the host context.
    pub fn is_in_flight(&self, host: &HostContext) -> bool {
        self.in_flight.lock().contains(&host.session_id)
    }

    /// The most recent synchronized query for the host context.
    pub fn last_query(&self, host: &HostContext) -> Option<String> {
        self.last_query.lock().get(&host.session_id).cloned()
    }

    /// A token cancelled when the sequencer is disposed.
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Stop all pending waits. In-flight remote calls finish on their own
    /// and their results are discarded.
    pub fn dispose(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            self.cancel.cancel();
            debug!("Sequencer disposed");
        }
    }

    fn try_begin(&self, host: &HostContext) -> Option<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(host.session_id.clone()) {
            return None;
        }
        Some(InFlightGuard {
            in_flight: &self.in_flight,
            key: host.session_id.clone(),
        })
    }

    /// Run one full cycle: write, settle, read back, render, publish.
    ///
    /// Remote failures degrade to a placeholder artifact. Only a failure to
    /// write the artifact itself is returned as an error.
    pub async fn sync(
        &self,
        host: &HostContext,
        interaction: CorrelatedInteraction,
    ) -> Result<SyncOutcome> {
        if !self.is_alive() {
            return Ok(SyncOutcome::Discarded);
        }
        let Some(_guard) = self.try_begin(host) else {
            debug!(host = %host, "Synchronization already in flight, skipping");
            return Ok(SyncOutcome::Skipped);
        };

        let started = Instant::now();
        let request = self.record_request(host, &interaction);
        self.last_query
            .lock()
            .insert(host.session_id.clone(), interaction.query.clone());

        if let Err(e) = self.store.record(&request).await {
            let reason = e.to_string();
            warn!(session_id = %host.session_id, error = %SyncError::RemoteWrite(e), "Record failed");
            if !self.is_alive() {
                return Ok(SyncOutcome::Discarded);
            }
            ContextArtifact::sync_failed(&reason).write_to(&self.artifact_path(host))?;
            return Ok(SyncOutcome::Degraded { reason });
        }

        tokio::select! {
            _ = self.cancel.cancelled() => return Ok(SyncOutcome::Discarded),
            _ = tokio::time::sleep(self.config.settle_delay) => {}
        }

        let context_request = self.context_request(host, &interaction.query);
        let response = self
            .config
            .retry
            .read(self.store.as_ref(), &context_request, &self.cancel)
            .await;
        if !self.is_alive() {
            return Ok(SyncOutcome::Discarded);
        }

        let outcome = match response {
            Ok(response) => {
                let memories = response.stats.memories;
                self.publish(host, &interaction.query, &ContextArtifact::from_response(&response))
                    .await?;
                SyncOutcome::Completed { memories }
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(session_id = %host.session_id, error = %SyncError::RemoteRead(e), "Context read failed");
                ContextArtifact::unavailable(&reason).write_to(&self.artifact_path(host))?;
                SyncOutcome::Degraded { reason }
            }
        };

        info!(
            session_id = %host.session_id,
            outcome = ?outcome,
            duration_ms = started.elapsed().as_millis() as u64,
            "Synchronization finished"
        );
        Ok(outcome)
    }

    /// Re-read context for the last synchronized query, through the cache.
    ///
    /// A failed read leaves the existing artifact untouched.
    pub async fn refresh(&self, host: &HostContext) -> Result<SyncOutcome> {
        if !self.is_alive() {
            return Ok(SyncOutcome::Discarded);
        }
        let Some(query) = self.last_query(host) else {
            return Ok(SyncOutcome::Skipped);
        };
        let Some(_guard) = self.try_begin(host) else {
            return Ok(SyncOutcome::Skipped);
        };

        if self
            .cache
            .get(&self.config.user_id, Some(&host.session_id), &query)
            .await
            .is_some()
        {
            return Ok(SyncOutcome::Cached);
        }

        let request = self.context_request(host, &query);
        let response = match self.store.context(&request).await {
            Ok(response) => response,
            Err(e) => {
                let reason = e.to_string();
                warn!(session_id = %host.session_id, error = %reason, "Refresh read failed");
                return Ok(SyncOutcome::Degraded { reason });
            }
        };
        if !self.is_alive() {
            return Ok(SyncOutcome::Discarded);
        }

        let memories = response.stats.memories;
        self.publish(host, &query, &ContextArtifact::from_response(&response))
            .await?;
        debug!(session_id = %host.session_id, memories, "Context refreshed");
        Ok(SyncOutcome::Completed { memories })
    }

    /// Rendered context for an arbitrary query, cache first.
    ///
    /// Does not touch the artifact or the single-flight guard.
    pub async fn lookup(&self, host: &HostContext, query: &str) -> Result<String> {
        let user_id = &self.config.user_id;
        if let Some(rendered) = self.cache.get(user_id, Some(&host.session_id), query).await {
            return Ok(rendered);
        }

        let response = self
            .store
            .context(&self.context_request(host, query))
            .await
            .map_err(SyncError::RemoteRead)?;
        let rendered = ContextArtifact::from_response(&response).render();
        self.cache
            .put(user_id, Some(&host.session_id), query, rendered.clone())
            .await;
        Ok(rendered)
    }

    async fn publish(&self, host: &HostContext, query: &str, artifact: &ContextArtifact) -> Result<()> {
        let rendered = artifact.render();
        write_atomic(&self.artifact_path(host), &rendered)?;
        self.cache
            .put(&self.config.user_id, Some(&host.session_id), query, rendered)
            .await;
        Ok(())
    }

    fn context_request(&self, host: &HostContext, query: &str) -> ContextRequest {
        ContextRequest::new(&self.config.user_id, query, self.config.context_limit)
            .with_session(&host.session_id)
    }

    fn record_request(
        &self,
        host: &HostContext,
        interaction: &CorrelatedInteraction,
    ) -> MemoryRecordRequest {
        let captured_at = now();
        let mut request = MemoryRecordRequest::new(
            &self.config.user_id,
            &host.session_id,
            &interaction.query,
            &interaction.response,
            interaction.artifacts.clone(),
        )
        .with_metadata("source", RECORD_SOURCE)
        .with_metadata("interaction_id", uuid::Uuid::new_v4().to_string())
        .with_metadata("host_context", host.to_string())
        .with_metadata("captured_at", captured_at.to_rfc3339());

        if let Some(model) = &interaction.model {
            request = request.with_metadata("model", model.as_str());
        }
        if let Some(started_at) = interaction.started_at {
            let pending_ms = (captured_at - started_at).num_milliseconds().max(0);
            request = request.with_metadata("pending_ms", pending_ms);
        }
        request
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("config", &self.config)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tether_cache::CacheConfig;
    use tether_client::MockMemoryStore;
    use tether_types::{Artifact, ContextStats, Entity, MemoryContextResponse, PendingInteraction};

    fn context_with(memories: u64) -> MemoryContextResponse {
        MemoryContextResponse {
            stats: ContextStats {
                memories,
                ..Default::default()
            },
            entities: vec![
                Entity::new("fix_ci")
                    .with_property("status", "success")
                    .with_property("outcome", "bug_fixed"),
            ],
            context_text: "CI needs the nightly toolchain.".to_string(),
            ..Default::default()
        }
    }

    fn config() -> SequencerConfig {
        SequencerConfig::new("alice")
            .with_settle_delay(Duration::from_millis(1))
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)))
    }

    fn setup(store: MockMemoryStore) -> (Arc<MockMemoryStore>, Arc<Sequencer>, HostContext, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store);
        let sequencer = Arc::new(Sequencer::new(
            store.clone(),
            ContextCache::new(CacheConfig::default()),
            config(),
        ));
        let host = HostContext::new(dir.path());
        (store, sequencer, host, dir)
    }

    fn read_artifact(sequencer: &Sequencer, host: &HostContext) -> String {
        std::fs::read_to_string(sequencer.artifact_path(host)).unwrap()
    }

    #[tokio::test]
    async fn test_sync_writes_reads_and_publishes() {
        let (store, sequencer, host, _dir) =
            setup(MockMemoryStore::new().with_context(context_with(3)));

        let interaction = PendingInteraction::new("why is CI red?")
            .with_model("fast")
            .complete("the toolchain was bumped")
            .with_artifact(Artifact::new("ci.yml").with_path(".github/workflows/ci.yml"));
        let outcome = sequencer.sync(&host, interaction).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Completed { memories: 3 });

        let recorded = store.recorded();
        assert_eq!(recorded.len(), 1);
        let record = &recorded[0];
        assert_eq!(record.user_id, "alice");
        assert_eq!(record.session_id, host.session_id());
        assert_eq!(record.metadata["source"], "tether");
        assert_eq!(record.metadata["model"], "fast");
        assert!(record.metadata.contains_key("interaction_id"));
        assert!(record.metadata.contains_key("pending_ms"));
        assert!(record.artifacts[0].chunk_id.is_some());

        let reads = store.context_requests();
        assert_eq!(reads[0].query, "why is CI red?");
        assert_eq!(reads[0].session_id.as_deref(), Some(host.session_id()));

        let doc = read_artifact(&sequencer, &host);
        assert!(doc.contains("Memories found: 3"));
        assert!(doc.contains("## Proven Solutions"));
        assert!(doc.contains("CI needs the nightly toolchain."));
        assert_eq!(sequencer.last_query(&host).as_deref(), Some("why is CI red?"));
        assert!(!sequencer.is_in_flight(&host));
    }

    #[tokio::test]
    async fn test_write_failure_writes_fallback_artifact() {
        let (store, sequencer, host, _dir) = setup(MockMemoryStore::new().with_failing_record());

        let outcome = sequencer
            .sync(&host, CorrelatedInteraction::new("q", "r"))
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Degraded { .. }));
        assert_eq!(store.context_count(), 0);
        assert!(read_artifact(&sequencer, &host).contains("Memory sync failed:"));
    }

    #[tokio::test]
    async fn test_read_failure_writes_unavailable_artifact() {
        let (store, sequencer, host, _dir) = setup(MockMemoryStore::new().with_failing_context());

        let outcome = sequencer
            .sync(&host, CorrelatedInteraction::new("q", "r"))
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Degraded { .. }));
        // Both retry attempts were used
        assert_eq!(store.context_count(), 2);
        assert!(read_artifact(&sequencer, &host).contains("Memory not yet available:"));
    }

    #[tokio::test]
    async fn test_overlapping_sync_is_skipped() {
        let (store, sequencer, host, _dir) = setup(
            MockMemoryStore::new()
                .with_context(context_with(1))
                .with_record_delay(Duration::from_millis(200)),
        );

        let first = {
            let sequencer = Arc::clone(&sequencer);
            let host = host.clone();
            tokio::spawn(async move {
                sequencer
                    .sync(&host, CorrelatedInteraction::new("first", "r"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sequencer.is_in_flight(&host));

        let second = sequencer
            .sync(&host, CorrelatedInteraction::new("second", "r"))
            .await
            .unwrap();
        assert_eq!(second, SyncOutcome::Skipped);

        let first = first.await.unwrap().unwrap();
        assert_eq!(first, SyncOutcome::Completed { memories: 1 });

        // Guard released: a new attempt proceeds
        let third = sequencer
            .sync(&host, CorrelatedInteraction::new("third", "r"))
            .await
            .unwrap();
        assert_eq!(third, SyncOutcome::Completed { memories: 1 });
        assert_eq!(store.record_count(), 2);
    }

    #[tokio::test]
    async fn test_different_hosts_do_not_block_each_other() {
        let (store, sequencer, host_a, _dir_a) = setup(
            MockMemoryStore::new()
                .with_context(context_with(1))
                .with_record_delay(Duration::from_millis(100)),
        );
        let dir_b = TempDir::new().unwrap();
        let host_b = HostContext::new(dir_b.path());

        let (a, b) = tokio::join!(
            sequencer.sync(&host_a, CorrelatedInteraction::new("a", "r")),
            sequencer.sync(&host_b, CorrelatedInteraction::new("b", "r")),
        );
        assert!(matches!(a.unwrap(), SyncOutcome::Completed { .. }));
        assert!(matches!(b.unwrap(), SyncOutcome::Completed { .. }));
        assert_eq!(store.record_count(), 2);
    }

    #[tokio::test]
    async fn test_dispose_during_settle_discards() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MockMemoryStore::new().with_context(context_with(1)));
        let sequencer = Arc::new(Sequencer::new(
            store.clone(),
            ContextCache::new(CacheConfig::default()),
            config().with_settle_delay(Duration::from_secs(60)),
        ));
        let host = HostContext::new(dir.path());

        let task = {
            let sequencer = Arc::clone(&sequencer);
            let host = host.clone();
            tokio::spawn(async move { sequencer.sync(&host, CorrelatedInteraction::new("q", "r")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        sequencer.dispose();

        assert_eq!(task.await.unwrap().unwrap(), SyncOutcome::Discarded);
        assert_eq!(store.context_count(), 0);
        assert!(!sequencer.artifact_path(&host).exists());

        let after = sequencer
            .sync(&host, CorrelatedInteraction::new("q", "r"))
            .await
            .unwrap();
        assert_eq!(after, SyncOutcome::Discarded);
    }

    #[tokio::test]
    async fn test_refresh_uses_cache_then_remote() {
        let (store, sequencer, host, _dir) =
            setup(MockMemoryStore::new().with_context(context_with(2)));

        // Nothing synchronized yet
        assert_eq!(sequencer.refresh(&host).await.unwrap(), SyncOutcome::Skipped);

        sequencer
            .sync(&host, CorrelatedInteraction::new("q", "r"))
            .await
            .unwrap();
        let reads = store.context_count();

        // The sync just populated the cache
        assert_eq!(sequencer.refresh(&host).await.unwrap(), SyncOutcome::Cached);
        assert_eq!(store.context_count(), reads);

        sequencer.cache().clear().await;
        assert_eq!(
            sequencer.refresh(&host).await.unwrap(),
            SyncOutcome::Completed { memories: 2 }
        );
        assert_eq!(store.context_count(), reads + 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_artifact() {
        let (store, sequencer, host, _dir) =
            setup(MockMemoryStore::new().with_context(context_with(2)));
        sequencer
            .sync(&host, CorrelatedInteraction::new("q", "r"))
            .await
            .unwrap();
        let before = read_artifact(&sequencer, &host);

        sequencer.cache().clear().await;
        store.set_fail_context(true);
        let outcome = sequencer.refresh(&host).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Degraded { .. }));
        assert_eq!(read_artifact(&sequencer, &host), before);
    }

    #[tokio::test]
    async fn test_lookup_is_cached() {
        let (store, sequencer, host, _dir) =
            setup(MockMemoryStore::new().with_context(context_with(5)));

        let first = sequencer.lookup(&host, "flaky tests").await.unwrap();
        let second = sequencer.lookup(&host, "flaky tests").await.unwrap();
        assert_eq!(first, second);
        assert!(first.contains("Memories found: 5"));
        assert_eq!(store.context_count(), 1);
        assert!(!sequencer.artifact_path(&host).exists());
    }

    #[tokio::test]
    async fn test_lookup_error_surfaces() {
        let (_store, sequencer, host, _dir) = setup(MockMemoryStore::new().with_failing_context());
        let err = sequencer.lookup(&host, "q").await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteRead(_)));
    }
}
