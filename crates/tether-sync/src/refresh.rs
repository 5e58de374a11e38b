//! Periodic context refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sequencer::{HostContext, Sequencer, SyncOutcome};

/// Background task re-reading context for the last synchronized query.
///
/// Stops when cancelled directly or when the sequencer is disposed.
pub struct RefreshTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Spawn the refresh loop. The first refresh happens one `interval`
    /// after spawning.
    pub fn spawn(sequencer: Arc<Sequencer>, host: HostContext, interval: Duration) -> Self {
        let cancel = sequencer.child_token();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match sequencer.refresh(&host).await {
                    Ok(SyncOutcome::Discarded) => break,
                    Ok(outcome) => debug!(host = %host, ?outcome, "Refresh tick"),
                    Err(e) => warn!(host = %host, error = %e, "Refresh failed"),
                }
            }
            debug!(host = %host, "Refresh task stopped");
        });

        Self { cancel, handle }
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
