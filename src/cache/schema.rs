use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use thiserror::Error;

/// A cached payload failed schema validation.
///
/// Always treated as a cache miss, never surfaced: a payload written by an
/// older deployment that no longer matches the expected shape self-heals on
/// the next write instead of forcing a manual flush.
#[derive(Debug, Error)]
#[error("cached payload rejected: {0}")]
pub struct SchemaViolation(String);

impl SchemaViolation {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Validates a serialized cache payload against an expected shape.
///
/// Every cache definition carries one of these; the same schema gates
/// regular reads and recompute replays.
pub trait CacheSchema<T>: Send + Sync {
    fn parse(&self, raw: &[u8]) -> Result<T, SchemaViolation>;
}

/// Structural validation through serde deserialization
pub struct JsonSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> CacheSchema<T> for JsonSchema<T> {
    fn parse(&self, raw: &[u8]) -> Result<T, SchemaViolation> {
        serde_json::from_slice(raw).map_err(|e| SchemaViolation::new(e.to_string()))
    }
}
