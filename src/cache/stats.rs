use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::core::MissReason;

/// Engine-wide operation counters.
///
/// Every combinator touches these on its hot path, so they are plain
/// atomics rather than a locked struct.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses_cold: AtomicU64,
    misses_corrupt: AtomicU64,
    misses_backend_error: AtomicU64,
    writes: AtomicU64,
    lru_evictions: AtomicU64,
    invalidated_keys: AtomicU64,
    recompute_scheduled: AtomicU64,
    recompute_failed: AtomicU64,
}

impl CacheStats {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self, reason: MissReason) {
        let counter = match reason {
            MissReason::Cold => &self.misses_cold,
            MissReason::Corrupt => &self.misses_corrupt,
            MissReason::BackendError => &self.misses_backend_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lru_eviction(&self) {
        self.lru_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidated(&self, count: u64) {
        self.invalidated_keys.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_recompute_scheduled(&self) {
        self.recompute_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recompute_failed(&self) {
        self.recompute_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses_cold: self.misses_cold.load(Ordering::Relaxed),
            misses_corrupt: self.misses_corrupt.load(Ordering::Relaxed),
            misses_backend_error: self.misses_backend_error.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            lru_evictions: self.lru_evictions.load(Ordering::Relaxed),
            invalidated_keys: self.invalidated_keys.load(Ordering::Relaxed),
            recompute_scheduled: self.recompute_scheduled.load(Ordering::Relaxed),
            recompute_failed: self.recompute_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the engine counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses_cold: u64,
    pub misses_corrupt: u64,
    pub misses_backend_error: u64,
    pub writes: u64,
    pub lru_evictions: u64,
    pub invalidated_keys: u64,
    pub recompute_scheduled: u64,
    pub recompute_failed: u64,
}

impl CacheStatsSnapshot {
    pub fn total_misses(&self) -> u64 {
        self.misses_cold + self.misses_corrupt + self.misses_backend_error
    }
}
