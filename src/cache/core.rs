use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::cache::key::{CacheKey, DependencyKey};
use crate::cache::lru::LruTracker;
use crate::cache::namespace::CacheNamespace;
use crate::cache::recompute::{RecomputeMetadata, RecomputeRegistry};
use crate::cache::schema::{CacheSchema, JsonSchema};
use crate::cache::settings::CacheSettings;
use crate::cache::stats::{CacheStats, CacheStatsSnapshot};
use crate::cache::tasks::BackgroundTasks;
use crate::storage::KeyValueStore;

/// Per-call options for the cache combinators
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheOptions {
    /// Skip the cache entirely: read fresh and do not write back
    pub ignore_cache: bool,
}

impl CacheOptions {
    /// Forced-fresh read that leaves the cached value untouched
    pub fn bypass() -> Self {
        Self { ignore_cache: true }
    }
}

/// Why a read came back empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// Nothing stored at the key
    Cold,
    /// Stored payload failed deserialization or schema validation
    Corrupt,
    /// The backend errored; the cache fails open
    BackendError,
}

/// Outcome of a cache read
#[derive(Debug)]
pub enum CacheRead<T> {
    Hit(T),
    Miss(MissReason),
}

/// A cache definition: the namespace entries live under and the schema
/// their payloads must satisfy on the way out.
pub struct CacheSpec<T> {
    namespace: CacheNamespace,
    schema: Arc<dyn CacheSchema<T>>,
}

impl<T> CacheSpec<T> {
    pub fn new(namespace: CacheNamespace, schema: Arc<dyn CacheSchema<T>>) -> Self {
        Self { namespace, schema }
    }

    pub fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    pub fn schema(&self) -> &dyn CacheSchema<T> {
        self.schema.as_ref()
    }
}

impl<T: DeserializeOwned + 'static> CacheSpec<T> {
    /// Definition validated structurally through serde
    pub fn json(namespace: CacheNamespace) -> Self {
        Self::new(namespace, Arc::new(JsonSchema::new()))
    }
}

pub(crate) struct EngineInner {
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) settings: CacheSettings,
    pub(crate) lru: LruTracker,
    pub(crate) registry: RecomputeRegistry,
    pub(crate) tasks: BackgroundTasks,
    pub(crate) stats: CacheStats,
}

/// The caching engine: read-through and bulk combinators over a key-value
/// backend, with dependency-tracked invalidation and best-effort
/// recomputation.
///
/// Cheap to clone; all clones share one backend handle, LRU tracker, and
/// background queue. Construct inside a Tokio runtime (the background
/// worker is spawned at construction).
#[derive(Clone)]
pub struct CacheEngine {
    pub(crate) inner: Arc<EngineInner>,
}

impl CacheEngine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        settings: CacheSettings,
        registry: RecomputeRegistry,
    ) -> Self {
        let tasks = BackgroundTasks::new(settings.background_queue_capacity);
        Self {
            inner: Arc::new(EngineInner {
                store,
                settings,
                lru: LruTracker::new(),
                registry,
                tasks,
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.store
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Wait for queued background work (dependency registration, bulk
    /// write-backs, recomputation) to settle. Call on shutdown.
    pub async fn quiesce(&self) {
        self.inner.tasks.quiesce().await;
    }

    /// Read and validate a cache entry.
    ///
    /// Backend failures and schema violations are both misses: the cache
    /// fails open and corrupt payloads self-heal on the next write.
    pub async fn try_get_from_cache<T>(
        &self,
        key: &CacheKey,
        schema: &dyn CacheSchema<T>,
    ) -> CacheRead<T> {
        let started = Instant::now();

        let raw = match self.inner.store.get(key.as_str()).await {
            Ok(raw) => raw,
            Err(err) => {
                self.inner.stats.record_miss(MissReason::BackendError);
                warn!(key = %key, error = %err, "cache read failed, treating as miss");
                return CacheRead::Miss(MissReason::BackendError);
            }
        };

        let Some(raw) = raw else {
            self.inner.stats.record_miss(MissReason::Cold);
            debug!(key = %key, elapsed = ?started.elapsed(), "cache miss");
            return CacheRead::Miss(MissReason::Cold);
        };

        match schema.parse(&raw) {
            Ok(value) => {
                self.inner.stats.record_hit();
                debug!(key = %key, elapsed = ?started.elapsed(), "cache hit");
                CacheRead::Hit(value)
            }
            Err(violation) => {
                self.inner.stats.record_miss(MissReason::Corrupt);
                warn!(key = %key, %violation, "cached payload failed validation, treating as miss");
                CacheRead::Miss(MissReason::Corrupt)
            }
        }
    }

    /// Write a computed value and its bookkeeping.
    ///
    /// Every failure here is swallowed: the computed value has already
    /// been produced and must reach the original caller regardless of
    /// what the cache layer manages to persist.
    pub async fn populate_cache<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        dependencies: &[DependencyKey],
        metadata: Option<RecomputeMetadata>,
    ) {
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key = %key, error = %err, "failed to serialize cache payload");
                return;
            }
        };
        self.populate_raw(key.clone(), payload, dependencies.to_vec(), metadata)
            .await;
    }

    pub(crate) async fn populate_raw(
        &self,
        key: CacheKey,
        payload: Vec<u8>,
        dependencies: Vec<DependencyKey>,
        metadata: Option<RecomputeMetadata>,
    ) {
        let ttl = self.inner.settings.ttl_for(key.namespace());
        if let Err(err) = self.inner.store.set(key.as_str(), payload, ttl).await {
            warn!(key = %key, error = %err, "cache write failed");
            return;
        }
        self.inner.stats.record_write();

        if let Some(metadata) = metadata {
            self.persist_recompute_metadata(&key, &metadata).await;
        }

        if !dependencies.is_empty() {
            self.register_dependencies(&key, dependencies);
        }

        if let Some(evicted) = self.inner.lru.touch(&key).await {
            self.inner.stats.record_lru_eviction();
            debug!(namespace = %key.namespace(), key = %evicted, "evicting least-recently-used entry");
            if let Err(err) = self.inner.store.del(&[evicted]).await {
                warn!(error = %err, "failed to delete evicted entry");
            }
        }
    }

    async fn persist_recompute_metadata(&self, key: &CacheKey, metadata: &RecomputeMetadata) {
        let buf = match serde_json::to_vec(metadata) {
            Ok(buf) => buf,
            Err(err) => {
                warn!(key = %key, error = %err, "failed to serialize recompute metadata");
                return;
            }
        };
        let ttl = self.inner.settings.dependency_registry_ttl;
        if let Err(err) = self
            .inner
            .store
            .set(&key.recompute_metadata_key(), buf, ttl)
            .await
        {
            warn!(key = %key, error = %err, "failed to persist recompute metadata");
        }
    }

    /// Add this key to each dependency's registry set, refreshing the set
    /// TTLs. Best-effort background work.
    fn register_dependencies(&self, key: &CacheKey, dependencies: Vec<DependencyKey>) {
        let store = Arc::clone(&self.inner.store);
        let registry_ttl = self.inner.settings.dependency_registry_ttl;
        let member = key.as_str().to_string();

        self.inner.tasks.spawn("dependency-registration", async move {
            let registrations = dependencies.iter().map(|dependency| {
                let store = Arc::clone(&store);
                let member = member.clone();
                let registry_key = dependency.registry_key();
                async move {
                    if let Err(err) = store.sadd(&registry_key, &[member]).await {
                        warn!(registry_key = %registry_key, error = %err, "dependency registration failed");
                        return;
                    }
                    if let Err(err) = store.expire(&registry_key, registry_ttl).await {
                        warn!(registry_key = %registry_key, error = %err, "failed to refresh registry TTL");
                    }
                }
            });
            join_all(registrations).await;
        });
    }

    /// Read-through cache combinator.
    ///
    /// On a hit `fetch` is never invoked; on a miss the computed value is
    /// written back together with its dependency registrations. Errors
    /// from `fetch` propagate unchanged; errors from the cache layer
    /// never do. With `ignore_cache` set, `fetch` runs directly and no
    /// write-back happens.
    pub async fn cached<T, E, F, Fut, D>(
        &self,
        spec: &CacheSpec<T>,
        suffix: &str,
        options: CacheOptions,
        dependencies: D,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        D: FnOnce(&T) -> Vec<DependencyKey> + Send,
    {
        if options.ignore_cache {
            return fetch().await;
        }

        let key = CacheKey::new(spec.namespace(), suffix);
        if let CacheRead::Hit(value) = self.try_get_from_cache(&key, spec.schema()).await {
            return Ok(value);
        }

        let value = fetch().await?;
        let deps = dependencies(&value);
        self.populate_cache(&key, &value, &deps, None).await;
        Ok(value)
    }
}
