//! Client for the remote long-term memory store.
//!
//! The store is reachable through two REST operations:
//!
//! - `record`: persist a (query, response, artifacts) interaction
//! - `context`: read back sections, entities and free text for a query
//!
//! [`MemoryStore`] is the seam the sequencer depends on; [`MemoryClient`]
//! implements it over HTTP. With the `testing` feature, [`MockMemoryStore`]
//! provides a scriptable in-memory implementation.
//!
//! # Example
//!
//! ```no_run
//! use tether_client::{MemoryClient, MemoryStore};
//! use tether_types::ContextRequest;
//!
//! # async fn example() -> tether_client::Result<()> {
//! let client = MemoryClient::builder()
//!     .base_url("http://127.0.0.1:8000")
//!     .api_key("secret")
//!     .build()?;
//!
//! let context = client.context(&ContextRequest::new("alice", "flaky test", 20)).await?;
//! println!("{} memories", context.stats.memories);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
#[cfg(any(test, feature = "testing"))]
mod mock;
mod store;

pub use client::{ClientBuilder, MemoryClient};
pub use error::{Error, Result};
#[cfg(any(test, feature = "testing"))]
pub use mock::MockMemoryStore;
pub use store::{MemoryStore, SharedMemoryStore};
