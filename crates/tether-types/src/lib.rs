//! Shared types for the tether memory sync daemon.
//!
//! These types are shared between `tether-server` (which receives hook
//! events), `tether-sync` (which correlates and synchronizes them) and
//! `tether-client` (which talks to the remote memory store).

pub mod artifact;
pub mod event;
pub mod interaction;
pub mod memory;

pub use artifact::{Artifact, ArtifactStatus, chunk_id};
pub use event::{
    AfterEvent, BeforeEvent, DiscoveryInfo, HookKind, ThoughtEvent, correlation_key,
};
pub use interaction::{CorrelatedInteraction, PendingInteraction};
pub use memory::{
    ContextRequest, ContextStats, Entity, MemoryContextResponse, MemoryRecordRequest,
    RecordResponse, Section, SectionItem,
};

/// Timestamp type used throughout tether.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current UTC time.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
