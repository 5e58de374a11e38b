//! Context cache with lazy TTL expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::config::CacheConfig;

/// Session component used when a lookup is not tied to a session.
pub const GLOBAL_SESSION: &str = "global";

/// Cache key: (user, session or `global`, query prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: String,
    pub session: String,
    pub query_prefix: String,
}

impl CacheKey {
    /// Build a key, truncating the query to `prefix_len` characters.
    pub fn new(user_id: &str, session: Option<&str>, query: &str, prefix_len: usize) -> Self {
        Self {
            user_id: user_id.to_string(),
            session: session
                .filter(|s| !s.is_empty())
                .unwrap_or(GLOBAL_SESSION)
                .to_string(),
            query_prefix: query.chars().take(prefix_len).collect(),
        }
    }
}

/// Entry stored in the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cached context text.
    pub context: String,

    /// When this entry was stored.
    pub cached_at: Instant,
}

impl CacheEntry {
    fn new(context: String) -> Self {
        Self {
            context,
            cached_at: Instant::now(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries in the map, including expired ones not yet overwritten.
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Short-TTL cache of query → context.
///
/// Cheap to clone; clones share the same map. Clearing it never affects
/// correctness, only the number of remote reads.
#[derive(Clone)]
pub struct ContextCache {
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    config: CacheConfig,
}

impl ContextCache {
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn key(&self, user_id: &str, session: Option<&str>, query: &str) -> CacheKey {
        CacheKey::new(user_id, session, query, self.config.prefix_len)
    }

    /// Look up context for a query.
    ///
    /// Entries older than the TTL are reported as misses but left in place.
    pub async fn get(&self, user_id: &str, session: Option<&str>, query: &str) -> Option<String> {
        let key = self.key(user_id, session, query);
        let entries = self.entries.read().await;

        match entries.get(&key) {
            Some(entry) if entry.cached_at.elapsed() <= self.config.ttl => {
                trace!(user_id = %key.user_id, session = %key.session, "Context cache hit");
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.context.clone())
            }
            Some(_) => {
                debug!(user_id = %key.user_id, session = %key.session, "Context cache entry expired");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store context for a query, replacing any previous entry for its key.
    pub async fn put(&self, user_id: &str, session: Option<&str>, query: &str, context: String) {
        let key = self.key(user_id, session, query);
        let mut entries = self.entries.write().await;
        entries.insert(key, CacheEntry::new(context));
        trace!(cache_size = entries.len(), "Context cached");
    }

    /// Remove every entry. Returns how many were dropped.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        debug!(count, "Context cache cleared");
        count
    }

    /// Number of entries in the map, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the map is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len().await,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cache_with_ttl(ttl: Duration) -> ContextCache {
        ContextCache::new(CacheConfig::new().with_ttl(ttl))
    }

    #[tokio::test]
    async fn test_get_after_put_returns_value() {
        let cache = ContextCache::new(CacheConfig::default());
        cache
            .put("alice", Some("ws_1"), "why does CI fail", "ctx".to_string())
            .await;

        let hit = cache.get("alice", Some("ws_1"), "why does CI fail").await;
        assert_eq!(hit.as_deref(), Some("ctx"));
    }

    #[tokio::test]
    async fn test_miss_for_unknown_key() {
        let cache = ContextCache::new(CacheConfig::default());
        assert!(cache.get("alice", None, "anything").await.is_none());
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss_but_not_evicted() {
        let cache = cache_with_ttl(Duration::from_millis(10));
        cache.put("alice", None, "query", "ctx".to_string()).await;

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.get("alice", None, "query").await.is_none());
        // Lazy expiry: the entry stays until overwritten
        assert_eq!(cache.len().await, 1);

        cache.put("alice", None, "query", "fresh".to_string()).await;
        assert_eq!(cache.get("alice", None, "query").await.as_deref(), Some("fresh"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_key_uses_query_prefix() {
        let cache = ContextCache::new(CacheConfig::new().with_prefix_len(10));
        cache
            .put("alice", None, "0123456789-first tail", "ctx".to_string())
            .await;

        // Same first 10 characters share an entry
        let hit = cache.get("alice", None, "0123456789-other tail").await;
        assert_eq!(hit.as_deref(), Some("ctx"));
        assert!(cache.get("alice", None, "012345678X").await.is_none());
    }

    #[tokio::test]
    async fn test_session_and_user_separate_entries() {
        let cache = ContextCache::new(CacheConfig::default());
        cache.put("alice", Some("ws_1"), "q", "one".to_string()).await;
        cache.put("alice", None, "q", "global".to_string()).await;
        cache.put("bob", Some("ws_1"), "q", "bob".to_string()).await;

        assert_eq!(cache.get("alice", Some("ws_1"), "q").await.as_deref(), Some("one"));
        assert_eq!(cache.get("alice", None, "q").await.as_deref(), Some("global"));
        // An empty session id falls back to the global bucket
        assert_eq!(cache.get("alice", Some(""), "q").await.as_deref(), Some("global"));
        assert_eq!(cache.get("bob", Some("ws_1"), "q").await.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_clear_empties_map() {
        let cache = ContextCache::new(CacheConfig::default());
        cache.put("alice", None, "a", "1".to_string()).await;
        cache.put("alice", None, "b", "2".to_string()).await;

        assert_eq!(cache.clear().await, 2);
        assert!(cache.is_empty().await);
        assert!(cache.get("alice", None, "a").await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = ContextCache::new(CacheConfig::default());
        let clone = cache.clone();
        cache.put("alice", None, "q", "shared".to_string()).await;

        assert_eq!(clone.get("alice", None, "q").await.as_deref(), Some("shared"));
        assert_eq!(cache.stats().await.hits, 1);
    }

    #[test]
    fn test_prefix_truncation_is_char_safe() {
        let key = CacheKey::new("u", None, "héllo wörld", 4);
        assert_eq!(key.query_prefix, "héll");
        assert_eq!(key.session, GLOBAL_SESSION);
    }
}
