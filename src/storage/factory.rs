use std::sync::Arc;
use tracing::info;

use crate::storage::{
    KeyValueStore, MemoryStore, RedisStore, StoreConfig, StoreError, StoreMode, StoreResult,
};

/// Create a key-value store backend from configuration
pub async fn connect(config: &StoreConfig) -> StoreResult<Arc<dyn KeyValueStore>> {
    match config.mode {
        StoreMode::Redis => {
            let redis_config = config.redis.as_ref().ok_or_else(|| {
                StoreError::ConfigurationError("Redis configuration missing".to_string())
            })?;

            info!("Creating Redis store");
            let store = RedisStore::new(redis_config.clone()).await?;
            Ok(Arc::new(store))
        }
        StoreMode::Memory => {
            info!("Creating in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
