//! Correlation and synchronization pipeline for tether.
//!
//! Hook events arrive out of band: a prompt ("before") and its response
//! ("after") are separate requests with an unbounded gap between them. This
//! crate pairs them up and pushes each completed interaction to the remote
//! memory store, then renders what the store knows back into a markdown
//! artifact the host re-injects into the next prompt.
//!
//! - [`Correlator`]: pending prompts indexed by generation and conversation key
//! - [`Sequencer`]: write, settle, read back, enhance, write the artifact
//! - [`enhance`]: classify historical entities into proven solutions and known issues
//! - [`ContextArtifact`]: the rendered output file
//! - [`RefreshTask`]: periodic re-read of the most recent query

pub mod artifact;
mod correlator;
pub mod enhance;
mod error;
mod refresh;
mod retry;
mod sequencer;
mod session;

pub use artifact::{ContextArtifact, write_atomic};
pub use correlator::Correlator;
pub use enhance::{Classification, EnhancedContext};
pub use error::{Result, SyncError};
pub use refresh::RefreshTask;
pub use retry::RetryPolicy;
pub use sequencer::{HostContext, Sequencer, SequencerConfig, SyncOutcome};
pub use session::{SESSION_ID_PREFIX, session_id_for};
