//! Pairs prompts with their responses.

use std::collections::HashMap;

use parking_lot::Mutex;
use tether_types::{PendingInteraction, correlation_key};
use tracing::{debug, trace};

/// Holds pending prompts until their response arrives.
///
/// Every pending entry is reachable through its generation key, its
/// conversation key, or both. A newer prompt for either key replaces the
/// older entry outright, under both of its keys, so a conversation never has
/// two outstanding prompts. Resolving an entry removes it from both indexes,
/// so each prompt is consumed at most once.
///
/// All three maps sit behind one lock: a resolve must never observe an
/// entry that is half removed.
#[derive(Debug, Default)]
pub struct Correlator {
    inner: Mutex<Pending>,
}

#[derive(Debug, Default)]
struct Pending {
    next_id: u64,
    entries: HashMap<u64, PendingInteraction>,
    by_generation: HashMap<String, u64>,
    by_conversation: HashMap<String, u64>,
}

impl Pending {
    fn take(&mut self, id: u64) -> Option<PendingInteraction> {
        let pending = self.entries.remove(&id)?;
        if let Some(key) = &pending.generation_key
            && self.by_generation.get(key) == Some(&id)
        {
            self.by_generation.remove(key);
        }
        if let Some(key) = &pending.conversation_key
            && self.by_conversation.get(key) == Some(&id)
        {
            self.by_conversation.remove(key);
        }
        Some(pending)
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a submitted prompt.
    ///
    /// Returns `false` when nothing was stored: a blank prompt, or no usable
    /// correlation key to find it by later.
    pub fn record_before(
        &self,
        query: &str,
        conversation_key: Option<&str>,
        generation_key: Option<&str>,
        model: Option<&str>,
    ) -> bool {
        let query = query.trim();
        if query.is_empty() {
            trace!("Ignoring before event with empty prompt");
            return false;
        }

        let conversation_key = correlation_key(conversation_key);
        let generation_key = correlation_key(generation_key);
        if conversation_key.is_none() && generation_key.is_none() {
            debug!("Ignoring before event without correlation keys");
            return false;
        }

        let mut pending = PendingInteraction::new(query);
        if let Some(key) = conversation_key {
            pending = pending.with_conversation_key(key);
        }
        if let Some(key) = generation_key {
            pending = pending.with_generation_key(key);
        }
        if let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) {
            pending = pending.with_model(model);
        }

        let mut inner = self.inner.lock();

        // Evict whatever either key currently names, from both indexes
        let replaced = [
            generation_key.and_then(|k| inner.by_generation.get(k).copied()),
            conversation_key.and_then(|k| inner.by_conversation.get(k).copied()),
        ];
        for old in replaced.into_iter().flatten() {
            if inner.take(old).is_some() {
                trace!("Pending prompt replaced by a newer one");
            }
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.insert(id, pending);
        if let Some(key) = generation_key {
            inner.by_generation.insert(key.to_string(), id);
        }
        if let Some(key) = conversation_key {
            inner.by_conversation.insert(key.to_string(), id);
        }

        debug!(
            conversation_id = conversation_key.unwrap_or("-"),
            generation_id = generation_key.unwrap_or("-"),
            pending = inner.entries.len(),
            "Prompt pending"
        );
        true
    }

    /// Consume the pending prompt matching a response.
    ///
    /// The generation key is tried first since it names a single turn; the
    /// conversation key is the fallback.
    pub fn resolve_after(
        &self,
        conversation_key: Option<&str>,
        generation_key: Option<&str>,
    ) -> Option<PendingInteraction> {
        let conversation_key = correlation_key(conversation_key);
        let generation_key = correlation_key(generation_key);

        let mut inner = self.inner.lock();
        let by_generation = generation_key.and_then(|k| inner.by_generation.get(k).copied());
        let id = by_generation
            .or_else(|| conversation_key.and_then(|k| inner.by_conversation.get(k).copied()))?;

        let pending = inner.take(id);
        trace!(
            via_generation = by_generation.is_some(),
            remaining = inner.entries.len(),
            "Prompt resolved"
        );
        pending
    }

    /// Number of prompts still waiting for a response.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every pending prompt. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        inner.by_generation.clear();
        inner.by_conversation.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_resolve_by_generation_consumes_once() {
        let correlator = Correlator::new();
        assert!(correlator.record_before("why is CI red?", Some("conv"), Some("gen-1"), None));

        let pending = correlator.resolve_after(None, Some("gen-1")).unwrap();
        assert_eq!(pending.query, "why is CI red?");
        assert!(correlator.resolve_after(None, Some("gen-1")).is_none());
        // Consumed from the conversation index too
        assert!(correlator.resolve_after(Some("conv"), None).is_none());
        assert!(correlator.is_empty());
    }

    #[test]
    fn test_conversation_fallback_when_generation_misses() {
        let correlator = Correlator::new();
        correlator.record_before("query", Some("conv-1"), None, None);

        let pending = correlator
            .resolve_after(Some("conv-1"), Some("unknown-gen"))
            .unwrap();
        assert_eq!(pending.query, "query");
        assert_eq!(pending.conversation_key.as_deref(), Some("conv-1"));
    }

    #[test]
    fn test_generation_preferred_over_conversation() {
        let correlator = Correlator::new();
        correlator.record_before("first", Some("conv-a"), Some("gen-1"), None);
        correlator.record_before("second", Some("conv-b"), Some("gen-2"), None);

        let pending = correlator.resolve_after(Some("conv-b"), Some("gen-1")).unwrap();
        assert_eq!(pending.query, "first");

        let pending = correlator.resolve_after(Some("conv-b"), None).unwrap();
        assert_eq!(pending.query, "second");
        assert!(correlator.is_empty());
    }

    #[test]
    fn test_newer_before_replaces_same_key() {
        let correlator = Correlator::new();
        correlator.record_before("old", Some("conv"), None, None);
        correlator.record_before("new", Some("conv"), None, None);

        // The replaced entry is unreachable and dropped
        assert_eq!(correlator.len(), 1);
        let pending = correlator.resolve_after(Some("conv"), None).unwrap();
        assert_eq!(pending.query, "new");
        assert!(correlator.resolve_after(Some("conv"), None).is_none());
    }

    #[test]
    fn test_newer_before_on_conversation_evicts_older_generation() {
        let correlator = Correlator::new();
        correlator.record_before("first", Some("conv"), Some("gen-1"), None);
        correlator.record_before("second", Some("conv"), Some("gen-2"), None);

        // One outstanding prompt per conversation
        assert_eq!(correlator.len(), 1);
        assert!(correlator.resolve_after(None, Some("gen-1")).is_none());
        assert_eq!(
            correlator.resolve_after(None, Some("gen-2")).unwrap().query,
            "second"
        );
        assert!(correlator.is_empty());
    }

    #[test]
    fn test_newer_before_on_generation_evicts_older_conversation() {
        let correlator = Correlator::new();
        correlator.record_before("first", Some("conv-1"), Some("gen"), None);
        correlator.record_before("retry", Some("conv-2"), Some("gen"), None);

        assert_eq!(correlator.len(), 1);
        assert!(correlator.resolve_after(Some("conv-1"), None).is_none());
        assert_eq!(
            correlator.resolve_after(Some("conv-2"), None).unwrap().query,
            "retry"
        );
    }

    #[test]
    fn test_empty_prompt_is_ignored() {
        let correlator = Correlator::new();
        assert!(!correlator.record_before("   ", Some("conv"), Some("gen"), None));
        assert!(correlator.is_empty());
    }

    #[test]
    fn test_before_without_keys_is_ignored() {
        let correlator = Correlator::new();
        assert!(!correlator.record_before("query", None, Some("  "), None));
        assert!(correlator.is_empty());
    }

    #[test]
    fn test_no_match_returns_none() {
        let correlator = Correlator::new();
        correlator.record_before("query", Some("conv"), None, None);
        assert!(correlator.resolve_after(Some("other"), Some("gen")).is_none());
        assert!(correlator.resolve_after(None, None).is_none());
        assert_eq!(correlator.len(), 1);
    }

    #[test]
    fn test_prompt_and_model_are_trimmed() {
        let correlator = Correlator::new();
        correlator.record_before("  query  ", None, Some(" gen "), Some(" fast "));
        let pending = correlator.resolve_after(None, Some("gen")).unwrap();
        assert_eq!(pending.query, "query");
        assert_eq!(pending.model.as_deref(), Some("fast"));
    }

    #[test]
    fn test_clear_drops_everything() {
        let correlator = Correlator::new();
        correlator.record_before("a", Some("c1"), None, None);
        correlator.record_before("b", None, Some("g1"), None);

        assert_eq!(correlator.clear(), 2);
        assert!(correlator.resolve_after(Some("c1"), Some("g1")).is_none());
    }

    #[test]
    fn test_concurrent_resolve_consumes_exactly_once() {
        let correlator = Arc::new(Correlator::new());
        correlator.record_before("query", Some("conv"), Some("gen"), None);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let correlator = Arc::clone(&correlator);
                std::thread::spawn(move || correlator.resolve_after(Some("conv"), Some("gen")))
            })
            .collect();

        let resolved = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .count();
        assert_eq!(resolved, 1);
    }
}
