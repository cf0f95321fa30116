use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::{AsyncCommands, RedisResult};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::storage::{KeyValueStore, RedisConfig, StoreError, StoreResult};

/// Redis-backed store with connection pooling and retry logic
pub struct RedisStore {
    pool: Pool,
    config: RedisConfig,
}

impl RedisStore {
    /// Create a new Redis store and verify connectivity
    pub async fn new(config: RedisConfig) -> StoreResult<Self> {
        let pool_config = Config::from_url(config.url.as_str());

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::ConnectionError(format!("Failed to create Redis pool: {}", e)))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| StoreError::ConnectionError(format!("Failed to get Redis connection: {}", e)))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::ConnectionError(format!("Redis ping failed: {}", e)))?;

        info!("Redis store initialized successfully");

        Ok(Self { pool, config })
    }

    /// Execute a Redis operation with retry logic
    async fn execute_with_retry<F, T>(&self, operation: F) -> StoreResult<T>
    where
        F: Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = RedisResult<T>> + Send>> + Send,
        T: Send,
    {
        let command_timeout = Duration::from_millis(self.config.command_timeout_ms);
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            let start_time = Instant::now();

            match timeout(command_timeout, operation()).await {
                Ok(Ok(result)) => {
                    debug!(elapsed = ?start_time.elapsed(), "redis command succeeded");
                    return Ok(result);
                }
                Ok(Err(e)) => {
                    last_error = Some(e);
                }
                Err(_) => {
                    return Err(StoreError::Timeout(command_timeout));
                }
            }

            if attempt < self.config.max_retries {
                let delay = self.calculate_retry_delay(attempt);
                debug!(
                    "Redis operation failed, retrying in {:?} (attempt {}/{})",
                    delay,
                    attempt + 1,
                    self.config.max_retries
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(StoreError::BackendUnavailable(format!(
            "Redis operation failed after {} retries: {}",
            self.config.max_retries,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string())
        )))
    }

    /// Calculate retry delay with exponential backoff and jitter
    fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        let base_delay = Duration::from_millis(100);
        let delay = base_delay * 2_u32.pow(attempt);
        let max_delay = Duration::from_millis(5000);

        // Add jitter to prevent thundering herd
        let jitter = fastrand::f64() * 0.1;
        let jittered_delay = delay.mul_f64(1.0 + jitter);

        jittered_delay.min(max_delay)
    }
}

fn pool_error(e: impl std::fmt::Display) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::IoError, "Pool error", e.to_string()))
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.execute_with_retry(|| {
            let pool = self.pool.clone();
            let key = key.to_string();
            Box::pin(async move {
                let mut conn = pool.get().await.map_err(pool_error)?;
                conn.get::<_, Option<Vec<u8>>>(key).await
            })
        })
        .await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        self.execute_with_retry(|| {
            let pool = self.pool.clone();
            let key = key.to_string();
            let value = value.clone();
            let seconds = ttl.as_secs().max(1);
            Box::pin(async move {
                let mut conn = pool.get().await.map_err(pool_error)?;
                conn.set_ex::<_, _, ()>(key, value, seconds).await
            })
        })
        .await
    }

    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        self.execute_with_retry(|| {
            let pool = self.pool.clone();
            let keys = keys.to_vec();
            Box::pin(async move {
                let mut conn = pool.get().await.map_err(pool_error)?;
                conn.del::<_, u64>(keys).await
            })
        })
        .await
    }

    async fn exists(&self, keys: &[String]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        self.execute_with_retry(|| {
            let pool = self.pool.clone();
            let keys = keys.to_vec();
            Box::pin(async move {
                let mut conn = pool.get().await.map_err(pool_error)?;
                conn.exists::<_, u64>(keys).await
            })
        })
        .await
    }

    async fn sadd(&self, set_key: &str, members: &[String]) -> StoreResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }

        self.execute_with_retry(|| {
            let pool = self.pool.clone();
            let set_key = set_key.to_string();
            let members = members.to_vec();
            Box::pin(async move {
                let mut conn = pool.get().await.map_err(pool_error)?;
                conn.sadd::<_, _, u64>(set_key, members).await
            })
        })
        .await
    }

    async fn smembers(&self, set_key: &str) -> StoreResult<Vec<String>> {
        self.execute_with_retry(|| {
            let pool = self.pool.clone();
            let set_key = set_key.to_string();
            Box::pin(async move {
                let mut conn = pool.get().await.map_err(pool_error)?;
                conn.smembers::<_, Vec<String>>(set_key).await
            })
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.execute_with_retry(|| {
            let pool = self.pool.clone();
            let key = key.to_string();
            let seconds = ttl.as_secs().max(1) as i64;
            Box::pin(async move {
                let mut conn = pool.get().await.map_err(pool_error)?;
                conn.expire::<_, bool>(key, seconds).await
            })
        })
        .await
    }

    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        self.execute_with_retry(|| {
            let pool = self.pool.clone();
            let keys = keys.to_vec();
            Box::pin(async move {
                let mut conn = pool.get().await.map_err(pool_error)?;
                let mut cmd = redis::cmd("MGET");
                for key in &keys {
                    cmd.arg(key);
                }
                cmd.query_async::<_, Vec<Option<Vec<u8>>>>(&mut conn).await
            })
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
