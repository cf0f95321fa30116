use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

use crate::cache::key::CacheKey;
use crate::cache::namespace::CacheNamespace;

/// Per-namespace bounded recency tracking.
///
/// Each namespace owns an LRU list capped at its configured capacity.
/// Touching a key at capacity evicts the least-recently-touched one; the
/// engine deletes the evicted entry from the backend. Only cache entries
/// and their tracking records are evicted; dependency registry
/// memberships age out through the registry's own TTL.
#[derive(Debug, Default)]
pub(crate) struct LruTracker {
    namespaces: Mutex<HashMap<CacheNamespace, LruCache<String, ()>>>,
}

impl LruTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or refresh a key's recency. Returns the full key evicted to
    /// stay within capacity, if any.
    pub async fn touch(&self, key: &CacheKey) -> Option<String> {
        let mut namespaces = self.namespaces.lock().await;
        let tracked = namespaces.entry(key.namespace()).or_insert_with(|| {
            let capacity = NonZeroUsize::new(key.namespace().lru_capacity().max(1))
                .expect("namespace capacity is never zero");
            LruCache::new(capacity)
        });

        match tracked.push(key.as_str().to_string(), ()) {
            // push returns the displaced entry: either this same key being
            // refreshed, or the LRU entry squeezed out by the insert
            Some((displaced, ())) if displaced != key.as_str() => Some(displaced),
            _ => None,
        }
    }

    /// Forget a key without touching the backend; used when the entry was
    /// deleted by invalidation.
    pub async fn remove(&self, key: &CacheKey) {
        let mut namespaces = self.namespaces.lock().await;
        if let Some(tracked) = namespaces.get_mut(&key.namespace()) {
            tracked.pop(key.as_str());
        }
    }

    /// Number of keys currently tracked for a namespace
    pub async fn tracked(&self, namespace: CacheNamespace) -> usize {
        let namespaces = self.namespaces.lock().await;
        namespaces.get(&namespace).map_or(0, |t| t.len())
    }
}
