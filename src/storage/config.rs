use serde::{Deserialize, Serialize};

/// Main storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Selected backend
    pub mode: StoreMode,
    /// Redis configuration, required when mode is `redis`
    pub redis: Option<RedisConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: StoreMode::Redis,
            redis: Some(RedisConfig::default()),
        }
    }
}

impl StoreConfig {
    /// In-process configuration used by tests and local development
    pub fn in_memory() -> Self {
        Self {
            mode: StoreMode::Memory,
            redis: None,
        }
    }
}

/// Storage backend modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreMode {
    #[serde(rename = "redis")]
    Redis,
    #[serde(rename = "memory")]
    Memory,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
    /// Connection pool size
    pub pool_size: u32,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Connection timeout
    pub timeout_ms: u64,
    /// Per-command timeout
    pub command_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            max_retries: 3,
            timeout_ms: 1000,
            command_timeout_ms: 5000,
        }
    }
}
