//! Error types for the synchronization pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a synchronization cycle.
///
/// Remote failures are normally absorbed by the sequencer into a degraded
/// outcome; they only surface from the read-only lookup paths.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("memory store write failed: {0}")]
    RemoteWrite(#[source] tether_client::Error),

    #[error("memory store read failed: {0}")]
    RemoteRead(#[source] tether_client::Error),

    #[error("failed to write artifact {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SyncError>;
