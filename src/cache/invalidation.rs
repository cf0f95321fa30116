use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::core::CacheEngine;
use crate::cache::key::{CacheKey, DependencyKey, RECOMPUTE_METADATA_PREFIX};
use crate::cache::recompute::RecomputeMetadata;

impl CacheEngine {
    /// Delete every cache entry that declared a dependency on any of the
    /// given keys, then schedule best-effort recomputation for the entries
    /// that persisted recompute metadata.
    ///
    /// Each dependency key is processed independently and they may
    /// interleave; within one dependency the order is strict:
    /// recompute-eligibility is read before anything is deleted (the
    /// metadata check is the only record of what is worth rebuilding),
    /// entry deletion completes before the registry set is dropped, and
    /// the registry set is dropped before any recomputation runs. A
    /// recomputation that re-registers the dependency must not have its
    /// fresh registration destroyed afterwards.
    ///
    /// Always returns normally: backend failures are logged and the
    /// invalidation is best-effort from the caller's perspective.
    pub async fn invalidate_dependencies(&self, dependencies: &[DependencyKey]) {
        if dependencies.is_empty() {
            return;
        }

        let per_dependency =
            join_all(dependencies.iter().map(|dep| self.invalidate_one(dep))).await;

        // A key invalidated under two dependencies recomputes once
        let mut scheduled = HashSet::new();
        for key in per_dependency.into_iter().flatten() {
            if scheduled.insert(key.clone()) {
                self.schedule_recompute(key);
            }
        }
    }

    /// Invalidate one dependency; returns the full keys of deleted entries
    /// that are eligible for recomputation.
    async fn invalidate_one(&self, dependency: &DependencyKey) -> Vec<String> {
        let store = Arc::clone(&self.inner.store);
        let registry_key = dependency.registry_key();

        let members = match store.smembers(&registry_key).await {
            Ok(members) => members,
            Err(err) => {
                warn!(dependency = %dependency, error = %err, "failed to read dependency registry");
                return Vec::new();
            }
        };
        if members.is_empty() {
            debug!(dependency = %dependency, "no dependents registered");
            return Vec::new();
        }

        // Eligibility must be read before any delete
        let eligibility = join_all(members.iter().map(|member| {
            let store = Arc::clone(&store);
            let metadata_key = format!("{RECOMPUTE_METADATA_PREFIX}{member}");
            async move { matches!(store.exists(&[metadata_key]).await, Ok(n) if n > 0) }
        }))
        .await;

        if let Err(err) = store.del(&members).await {
            // Entries survive; keep the registry so a later invalidation
            // can retry them
            warn!(dependency = %dependency, error = %err, "failed to delete dependent entries");
            return Vec::new();
        }
        self.inner.stats.record_invalidated(members.len() as u64);
        debug!(dependency = %dependency, count = members.len(), "invalidated dependent entries");

        for member in &members {
            if let Some(key) = CacheKey::parse(member) {
                self.inner.lru.remove(&key).await;
            }
        }

        if let Err(err) = store.del(&[registry_key.clone()]).await {
            warn!(registry_key = %registry_key, error = %err, "failed to delete dependency registry set");
        }

        members
            .into_iter()
            .zip(eligibility)
            .filter_map(|(member, eligible)| eligible.then_some(member))
            .collect()
    }

    fn schedule_recompute(&self, full_key: String) {
        self.inner.stats.record_recompute_scheduled();
        let engine = self.clone();
        self.inner.tasks.spawn("recompute", async move {
            engine.recompute_cache_entry(&full_key).await;
        });
    }

    /// Replay the computation behind an invalidated entry.
    ///
    /// Every early exit here is a no-op: absent metadata means the entry
    /// was never recomputable, and a process that never registered the
    /// namespace's handler leaves the entry cold until the next organic
    /// miss.
    pub async fn recompute_cache_entry(&self, full_key: &str) {
        let metadata_key = format!("{RECOMPUTE_METADATA_PREFIX}{full_key}");

        let raw = match self.inner.store.get(&metadata_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %full_key, "no recompute metadata, skipping");
                return;
            }
            Err(err) => {
                warn!(key = %full_key, error = %err, "failed to read recompute metadata");
                return;
            }
        };

        let metadata: RecomputeMetadata = match serde_json::from_slice(&raw) {
            Ok(metadata) => metadata,
            Err(err) => {
                self.inner.stats.record_recompute_failed();
                warn!(key = %full_key, error = %err, "recompute metadata invalid, skipping");
                return;
            }
        };

        let Some(handler) = self.inner.registry.handler(metadata.namespace) else {
            self.inner.stats.record_recompute_failed();
            warn!(
                namespace = %metadata.namespace,
                key = %full_key,
                "no recompute handler registered in this process"
            );
            return;
        };
        let handler = Arc::clone(handler);

        if let Err(err) = handler.recompute(self, metadata).await {
            self.inner.stats.record_recompute_failed();
            warn!(key = %full_key, error = %err, "recomputation failed");
        }
    }
}
