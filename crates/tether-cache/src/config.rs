//! Configuration for the context cache.

use std::time::Duration;

/// Default time-to-live for cached context.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Default number of query characters used in the cache key.
pub const DEFAULT_PREFIX_LEN: usize = 50;

/// Configuration for the context cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries older than this are treated as misses.
    pub ttl: Duration,

    /// Number of leading query characters that form the key.
    pub prefix_len: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            prefix_len: DEFAULT_PREFIX_LEN,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the query prefix length (minimum 1).
    pub fn with_prefix_len(mut self, len: usize) -> Self {
        self.prefix_len = len.max(1);
        self
    }
}
