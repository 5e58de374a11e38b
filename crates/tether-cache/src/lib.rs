//! Local context cache.
//!
//! Memoizes "query → context" for a short TTL so repeated reads within a
//! burst of activity skip the remote round-trip. Entries are keyed by
//! (user, session or `global`, query prefix) and expire lazily: an old
//! entry is treated as a miss on read but stays in the map until it is
//! overwritten or the cache is cleared.
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_cache::{CacheConfig, ContextCache};
//!
//! let cache = ContextCache::new(CacheConfig::default());
//! if cache.get("alice", Some("ws_1"), query).await.is_none() {
//!     let context = fetch(query).await?;
//!     cache.put("alice", Some("ws_1"), query, context).await;
//! }
//! ```

mod cache;
mod config;

pub use cache::{CacheEntry, CacheKey, CacheStats, ContextCache, GLOBAL_SESSION};
pub use config::{CacheConfig, DEFAULT_PREFIX_LEN, DEFAULT_TTL};
