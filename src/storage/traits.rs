use async_trait::async_trait;
use std::time::Duration;

use crate::storage::StoreResult;

/// Core key-value store trait that all backends must implement.
///
/// This is the full capability surface the cache engine consumes: plain
/// get/set with TTL for cache entries, multi-key variants for bulk lookups
/// and batched invalidation, and set operations for the dependency registry.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Set a value with a TTL
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()>;

    /// Delete keys, returning how many existed
    async fn del(&self, keys: &[String]) -> StoreResult<u64>;

    /// Count how many of the given keys exist
    async fn exists(&self, keys: &[String]) -> StoreResult<u64>;

    /// Add members to a set, returning how many were newly added
    async fn sadd(&self, set_key: &str, members: &[String]) -> StoreResult<u64>;

    /// Read all members of a set; an absent set is an empty set
    async fn smembers(&self, set_key: &str) -> StoreResult<Vec<String>>;

    /// Refresh a key's TTL; false when the key does not exist
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Multi-get; the result has one slot per requested key, in order
    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<Vec<u8>>>>;

    /// Get the backend name/type
    fn backend_name(&self) -> &'static str;
}
