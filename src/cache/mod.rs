pub mod bulk;
pub mod core;
pub mod invalidation;
pub mod key;
mod lru;
pub mod namespace;
pub mod recomputable;
pub mod recompute;
pub mod schema;
pub mod settings;
pub mod stats;
pub mod tasks;

pub use self::core::{CacheEngine, CacheOptions, CacheRead, CacheSpec, MissReason};
pub use key::{
    CacheKey, DependencyKey, DEPENDENCY_REGISTRY_PREFIX, RECOMPUTE_METADATA_PREFIX,
};
pub use namespace::{CacheNamespace, DEFAULT_TTL};
pub use recomputable::{
    ContextScopeFactory, QueryRecomputeHandler, RecomputableQuery, ScopeError, ScopeFactory,
    TransactionScope,
};
pub use recompute::{
    ParamValue, RecomputeError, RecomputeHandler, RecomputeMetadata, RecomputeRegistry,
    SerializableParams, TransactionContext,
};
pub use schema::{CacheSchema, JsonSchema, SchemaViolation};
pub use settings::{CacheSettings, TTL_OVERRIDES_ENV};
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use tasks::BackgroundTasks;
