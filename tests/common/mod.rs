#![allow(dead_code)]

use std::sync::Arc;

use tallycache::cache::{CacheEngine, CacheSettings, RecomputeRegistry};
use tallycache::storage::{KeyValueStore, MemoryStore};

/// Engine over a fresh in-memory store, no recompute handlers
pub fn engine() -> (CacheEngine, Arc<MemoryStore>) {
    engine_with_registry(RecomputeRegistry::new())
}

pub fn engine_with_registry(registry: RecomputeRegistry) -> (CacheEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = CacheEngine::new(
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
        CacheSettings::default(),
        registry,
    );
    (engine, store)
}

pub fn init_logging() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_target(false).compact())
        .try_init();
}
