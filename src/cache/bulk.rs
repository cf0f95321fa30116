use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use tracing::warn;

use crate::cache::core::{CacheEngine, CacheSpec, MissReason};
use crate::cache::key::{CacheKey, DependencyKey};

impl CacheEngine {
    /// Bulk read-through lookup: N items grouped under N keys.
    ///
    /// One multi-get covers every input key; entries that are absent, fail
    /// to parse, or fail validation all count as misses. `bulk_fetch` runs
    /// at most once, with the deduplicated miss set, and unlike cache
    /// infrastructure failures its errors are hard failures: they come
    /// from the source of truth. Fetched items are grouped by
    /// `group_key` and written back per key (own dependency set, own LRU
    /// entry), so each key stays independently invalidatable even though
    /// the group was fetched together.
    ///
    /// Every requested key is present in the returned map; keys with no
    /// items map to an empty vec.
    pub async fn cached_bulk_lookup<T, E, F, Fut, G, D>(
        &self,
        spec: &CacheSpec<Vec<T>>,
        keys: &[String],
        dependencies: D,
        group_key: G,
        bulk_fetch: F,
    ) -> Result<HashMap<String, Vec<T>>, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce(Vec<String>) -> Fut + Send,
        Fut: Future<Output = Result<Vec<T>, E>> + Send,
        G: Fn(&T) -> String + Send,
        D: Fn(&str, &[T]) -> Vec<DependencyKey> + Send,
    {
        let mut results: HashMap<String, Vec<T>> = HashMap::new();
        if keys.is_empty() {
            return Ok(results);
        }

        let mut seen = HashSet::new();
        let unique: Vec<String> = keys
            .iter()
            .filter(|key| seen.insert(key.as_str()))
            .cloned()
            .collect();
        let full_keys: Vec<String> = unique
            .iter()
            .map(|suffix| CacheKey::new(spec.namespace(), suffix).as_str().to_string())
            .collect();

        let mut backend_failed = false;
        let raw = match self.inner.store.mget(&full_keys).await {
            Ok(raw) if raw.len() == unique.len() => raw,
            Ok(raw) => {
                warn!(
                    expected = unique.len(),
                    got = raw.len(),
                    "multi-get returned wrong arity, treating all keys as misses"
                );
                backend_failed = true;
                vec![None; unique.len()]
            }
            Err(err) => {
                warn!(error = %err, "multi-get failed, treating all keys as misses");
                backend_failed = true;
                vec![None; unique.len()]
            }
        };

        let mut missed: Vec<String> = Vec::new();
        for (suffix, raw) in unique.iter().zip(raw) {
            match raw {
                Some(bytes) => match spec.schema().parse(&bytes) {
                    Ok(group) => {
                        self.inner.stats.record_hit();
                        results.insert(suffix.clone(), group);
                    }
                    Err(violation) => {
                        self.inner.stats.record_miss(MissReason::Corrupt);
                        warn!(key = %suffix, %violation, "cached group failed validation, refetching");
                        missed.push(suffix.clone());
                    }
                },
                None => {
                    self.inner.stats.record_miss(if backend_failed {
                        MissReason::BackendError
                    } else {
                        MissReason::Cold
                    });
                    missed.push(suffix.clone());
                }
            }
        }

        if missed.is_empty() {
            return Ok(results);
        }

        // Source-of-truth fetch: errors propagate, the cache never masks them
        let fetched = bulk_fetch(missed.clone()).await?;

        let mut groups: HashMap<String, Vec<T>> = HashMap::new();
        for item in fetched {
            groups.entry(group_key(&item)).or_default().push(item);
        }

        for suffix in missed {
            let group = groups.remove(&suffix).unwrap_or_default();
            let deps = dependencies(&suffix, &group);
            self.write_back_group(spec, &suffix, &group, deps);
            results.insert(suffix, group);
        }

        if !groups.is_empty() {
            warn!(
                count = groups.len(),
                "bulk fetch returned items grouped under keys that were never requested"
            );
        }

        Ok(results)
    }

    /// Fire-and-forget write-back of one fetched group
    fn write_back_group<T: Serialize>(
        &self,
        spec: &CacheSpec<Vec<T>>,
        suffix: &str,
        group: &[T],
        dependencies: Vec<DependencyKey>,
    ) {
        let payload = match serde_json::to_vec(group) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key = %suffix, error = %err, "failed to serialize group for write-back");
                return;
            }
        };

        let engine = self.clone();
        let key = CacheKey::new(spec.namespace(), suffix);
        self.inner.tasks.spawn("bulk-writeback", async move {
            engine.populate_raw(key, payload, dependencies, None).await;
        });
    }
}
