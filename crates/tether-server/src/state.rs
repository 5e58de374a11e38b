//! Application state shared across handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tether_sync::{Correlator, HostContext, Sequencer};
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::config::ServerConfig;

/// Counters kept by the intake surface.
#[derive(Debug, Default)]
pub struct IntakeStats {
    before: AtomicU64,
    after: AtomicU64,
    thought: AtomicU64,
    correlation_misses: AtomicU64,
    dropped_empty: AtomicU64,
    syncs_started: AtomicU64,
    syncs_skipped: AtomicU64,
}

/// Point-in-time copy of [`IntakeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntakeSnapshot {
    pub before: u64,
    pub after: u64,
    pub thought: u64,
    pub correlation_misses: u64,
    pub dropped_empty: u64,
    pub syncs_started: u64,
    pub syncs_skipped: u64,
}

impl IntakeStats {
    pub(crate) fn before(&self) {
        self.before.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn after(&self) {
        self.after.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn thought(&self) {
        self.thought.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn correlation_miss(&self) {
        self.correlation_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped_empty(&self) {
        self.dropped_empty.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sync_started(&self) {
        self.syncs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sync_skipped(&self) {
        self.syncs_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IntakeSnapshot {
        IntakeSnapshot {
            before: self.before.load(Ordering::Relaxed),
            after: self.after.load(Ordering::Relaxed),
            thought: self.thought.load(Ordering::Relaxed),
            correlation_misses: self.correlation_misses.load(Ordering::Relaxed),
            dropped_empty: self.dropped_empty.load(Ordering::Relaxed),
            syncs_started: self.syncs_started.load(Ordering::Relaxed),
            syncs_skipped: self.syncs_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Pending prompts awaiting their response.
    pub correlator: Arc<Correlator>,

    /// Pushes completed interactions to the memory store.
    pub sequencer: Arc<Sequencer>,

    /// The workspace this server publishes context for.
    pub host: Arc<HostContext>,

    /// Intake counters.
    pub stats: Arc<IntakeStats>,

    /// Background synchronizations spawned by handlers.
    pub tasks: TaskTracker,
}

impl AppState {
    pub fn new(config: ServerConfig, sequencer: Arc<Sequencer>, host: HostContext) -> Self {
        Self {
            config: Arc::new(config),
            correlator: Arc::new(Correlator::new()),
            sequencer,
            host: Arc::new(host),
            stats: Arc::new(IntakeStats::default()),
            tasks: TaskTracker::new(),
        }
    }

    /// Wait until every spawned synchronization has finished.
    pub async fn wait_for_syncs(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Tear down: forget pending prompts, stop sequencer waits, and let
    /// in-flight synchronizations wind down.
    pub async fn shutdown(&self) {
        let dropped = self.correlator.clear();
        self.sequencer.dispose();
        self.tasks.close();
        self.tasks.wait().await;

        let stats = self.stats.snapshot();
        info!(
            pending_dropped = dropped,
            before = stats.before,
            after = stats.after,
            thought = stats.thought,
            correlation_misses = stats.correlation_misses,
            dropped_empty = stats.dropped_empty,
            syncs_started = stats.syncs_started,
            syncs_skipped = stats.syncs_skipped,
            "Intake stopped"
        );
    }
}
