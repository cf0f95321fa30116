use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::cache::core::CacheEngine;
use crate::cache::namespace::CacheNamespace;

/// A single recompute parameter: scalars and scalar arrays only.
///
/// Recompute metadata must stay cheaply serializable and safe to persist
/// as JSON; arbitrary object graphs are rejected by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    BoolList(Vec<bool>),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    TextList(Vec<String>),
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::TextList(value)
    }
}

/// Named parameters of a recomputable computation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializableParams(BTreeMap<String, ParamValue>);

impl SerializableParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(ParamValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(ParamValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(ParamValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Authorization scope a cached computation ran under, captured at
/// population time and replayed at recompute time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TransactionContext {
    Admin {
        livemode: bool,
    },
    Merchant {
        livemode: bool,
        organization_id: String,
        user_id: String,
    },
    Customer {
        livemode: bool,
        organization_id: String,
        user_id: String,
        customer_id: String,
    },
}

impl TransactionContext {
    pub fn livemode(&self) -> bool {
        match self {
            TransactionContext::Admin { livemode }
            | TransactionContext::Merchant { livemode, .. }
            | TransactionContext::Customer { livemode, .. } => *livemode,
        }
    }
}

/// Everything needed to regenerate a cache entry without the original
/// caller: which namespace's handler to dispatch to, the serialized
/// parameters, and the authorization scope to reconstruct.
///
/// Persisted at `cacheRecompute:<fullCacheKey>`. Absence means the entry
/// is simply not recomputable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeMetadata {
    pub namespace: CacheNamespace,
    pub params: SerializableParams,
    pub transaction_context: TransactionContext,
    pub created_at: DateTime<Utc>,
}

impl RecomputeMetadata {
    pub fn new(
        namespace: CacheNamespace,
        params: SerializableParams,
        transaction_context: TransactionContext,
    ) -> Self {
        Self {
            namespace,
            params,
            transaction_context,
            created_at: Utc::now(),
        }
    }
}

/// Why a recomputation attempt was abandoned. Never propagated past the
/// dispatch layer; recomputation is an optimization, not a correctness
/// requirement.
#[derive(Debug, Error)]
pub enum RecomputeError {
    #[error("no recompute handler registered for namespace {0}")]
    HandlerMissing(CacheNamespace),

    #[error("persisted params rejected: {0}")]
    InvalidParams(String),

    #[error("failed to reconstruct execution scope: {0}")]
    Scope(String),

    #[error("recomputation failed: {0}")]
    Compute(String),
}

/// Regenerates cache entries for one namespace
#[async_trait]
pub trait RecomputeHandler: Send + Sync {
    fn namespace(&self) -> CacheNamespace;

    async fn recompute(
        &self,
        cache: &CacheEngine,
        metadata: RecomputeMetadata,
    ) -> Result<(), RecomputeError>;
}

/// Handler registry, built once at process startup and handed to the
/// engine. Every process in a fleet must register the same handlers for a
/// namespace; a process missing one simply skips recomputation for it.
#[derive(Default)]
pub struct RecomputeRegistry {
    handlers: HashMap<CacheNamespace, Arc<dyn RecomputeHandler>>,
}

impl RecomputeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; re-registering a namespace replaces the
    /// previous handler (last registration wins).
    pub fn register(mut self, handler: Arc<dyn RecomputeHandler>) -> Self {
        let namespace = handler.namespace();
        if self.handlers.insert(namespace, handler).is_some() {
            warn!(%namespace, "replacing previously registered recompute handler");
        }
        self
    }

    pub fn handler(&self, namespace: CacheNamespace) -> Option<&Arc<dyn RecomputeHandler>> {
        self.handlers.get(&namespace)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_context_wire_shape() {
        let ctx = TransactionContext::Customer {
            livemode: true,
            organization_id: "org_1".to_string(),
            user_id: "usr_1".to_string(),
            customer_id: "cust_1".to_string(),
        };

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "customer",
                "livemode": true,
                "organizationId": "org_1",
                "userId": "usr_1",
                "customerId": "cust_1",
            })
        );

        let back: TransactionContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, ctx);
    }

    #[test]
    fn test_params_stay_scalar_on_the_wire() {
        let params = SerializableParams::new()
            .with("customerId", "cust_1")
            .with("livemode", true)
            .with("limit", 25i64);

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "customerId": "cust_1",
                "livemode": true,
                "limit": 25,
            })
        );

        let back: SerializableParams = serde_json::from_value(json).unwrap();
        assert_eq!(back.text("customerId"), Some("cust_1"));
        assert_eq!(back.bool("livemode"), Some(true));
        assert_eq!(back.int("limit"), Some(25));
    }

    #[test]
    fn test_metadata_roundtrip() {
        let metadata = RecomputeMetadata::new(
            CacheNamespace::SubscriptionsByCustomer,
            SerializableParams::new().with("customerId", "cust_1"),
            TransactionContext::Admin { livemode: false },
        );

        let raw = serde_json::to_vec(&metadata).unwrap();
        let back: RecomputeMetadata = serde_json::from_slice(&raw).unwrap();
        assert_eq!(back, metadata);
    }
}
