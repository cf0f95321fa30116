use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::core::{CacheEngine, CacheOptions, CacheRead};
use crate::cache::key::{CacheKey, DependencyKey};
use crate::cache::namespace::CacheNamespace;
use crate::cache::recompute::{
    RecomputeError, RecomputeHandler, RecomputeMetadata, SerializableParams, TransactionContext,
};
use crate::cache::schema::CacheSchema;

/// An execution scope for a cached computation.
///
/// The database handle itself lives outside this crate; the cache layer
/// only needs the authorization context a scope carries, to persist it in
/// recompute metadata. A scope without a context (a background job running
/// outside any authorization boundary) makes its entries non-recomputable.
#[derive(Debug, Clone)]
pub struct TransactionScope {
    context: Option<TransactionContext>,
}

impl TransactionScope {
    pub fn with_context(context: TransactionContext) -> Self {
        Self {
            context: Some(context),
        }
    }

    pub fn anonymous() -> Self {
        Self { context: None }
    }

    pub fn context(&self) -> Option<&TransactionContext> {
        self.context.as_ref()
    }
}

#[derive(Debug, Error)]
#[error("scope reconstruction failed: {0}")]
pub struct ScopeError(String);

impl ScopeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Reconstructs an execution scope from a persisted transaction context.
///
/// The authorization layer implements this: an admin context needs no
/// tenant binding, merchant and customer contexts need their organization
/// and user rebound before any query may run.
#[async_trait]
pub trait ScopeFactory: Send + Sync {
    async fn open(&self, context: &TransactionContext) -> Result<TransactionScope, ScopeError>;
}

/// Stock factory that rebinds the persisted context as-is
pub struct ContextScopeFactory;

#[async_trait]
impl ScopeFactory for ContextScopeFactory {
    async fn open(&self, context: &TransactionContext) -> Result<TransactionScope, ScopeError> {
        Ok(TransactionScope::with_context(context.clone()))
    }
}

/// A cached computation that can be replayed without its original caller.
///
/// Constrained to `SerializableParams` so the persisted metadata stays
/// scalar-only. The same definition drives both the caller-facing cached
/// path and the handler used by the invalidation engine.
#[async_trait]
pub trait RecomputableQuery: Send + Sync + 'static {
    type Value: Serialize + DeserializeOwned + Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    fn namespace(&self) -> CacheNamespace;

    /// Cache key suffix derived from the params
    fn cache_suffix(&self, params: &SerializableParams) -> String;

    /// Dependency keys this computation's result relies on
    fn dependencies(&self, params: &SerializableParams, value: &Self::Value)
        -> Vec<DependencyKey>;

    fn schema(&self) -> &dyn CacheSchema<Self::Value>;

    /// Reject persisted params that no longer match what `compute`
    /// expects; stale metadata from a previous deployment must not reach
    /// the computation.
    fn validate_params(&self, _params: &SerializableParams) -> Result<(), RecomputeError> {
        Ok(())
    }

    async fn compute(
        &self,
        params: &SerializableParams,
        scope: &TransactionScope,
    ) -> Result<Self::Value, Self::Error>;
}

impl CacheEngine {
    /// Read-through combinator for recomputable computations.
    ///
    /// Identical to `cached`, except population also persists recompute
    /// metadata carrying the scope's transaction context, which is what
    /// lets the invalidation engine regenerate the entry later without
    /// the caller's help.
    pub async fn recomputable<Q: RecomputableQuery>(
        &self,
        query: &Q,
        params: &SerializableParams,
        scope: &TransactionScope,
        options: CacheOptions,
    ) -> Result<Q::Value, Q::Error> {
        if options.ignore_cache {
            return query.compute(params, scope).await;
        }

        let key = CacheKey::new(query.namespace(), &query.cache_suffix(params));
        if let CacheRead::Hit(value) = self.try_get_from_cache(&key, query.schema()).await {
            return Ok(value);
        }

        let value = query.compute(params, scope).await?;
        let deps = query.dependencies(params, &value);
        let metadata = scope.context().map(|context| {
            RecomputeMetadata::new(query.namespace(), params.clone(), context.clone())
        });
        self.populate_cache(&key, &value, &deps, metadata).await;
        Ok(value)
    }
}

/// The handler synthesized for a recomputable query.
///
/// Collect one per query into the `RecomputeRegistry` at process startup;
/// on dispatch it validates the persisted params, reopens an execution
/// scope for the persisted context, and re-invokes the cached wrapper,
/// refreshing the entry's TTL, dependency registrations, and LRU slot as
/// side effects of the normal population path.
pub struct QueryRecomputeHandler<Q> {
    query: Arc<Q>,
    scopes: Arc<dyn ScopeFactory>,
}

impl<Q> QueryRecomputeHandler<Q> {
    pub fn new(query: Arc<Q>, scopes: Arc<dyn ScopeFactory>) -> Self {
        Self { query, scopes }
    }
}

#[async_trait]
impl<Q: RecomputableQuery> RecomputeHandler for QueryRecomputeHandler<Q> {
    fn namespace(&self) -> CacheNamespace {
        self.query.namespace()
    }

    async fn recompute(
        &self,
        cache: &CacheEngine,
        metadata: RecomputeMetadata,
    ) -> Result<(), RecomputeError> {
        self.query.validate_params(&metadata.params)?;

        let scope = self
            .scopes
            .open(&metadata.transaction_context)
            .await
            .map_err(|err| RecomputeError::Scope(err.to_string()))?;

        cache
            .recomputable(
                self.query.as_ref(),
                &metadata.params,
                &scope,
                CacheOptions::default(),
            )
            .await
            .map_err(|err| RecomputeError::Compute(err.to_string()))?;
        Ok(())
    }
}
