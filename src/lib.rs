//! Dependency-tracked, recomputable caching for the Tally billing platform.
//!
//! This crate is the read-through caching layer that fronts Tally's
//! expensive reads (subscription lookups, payment methods, usage-meter
//! balances). Cached computations declare the entities they depend on;
//! when a mutation invalidates one of those dependencies, the engine
//! deletes exactly the dependent entries and, where the original call left
//! recompute metadata behind, regenerates them in the background.
//!
//! The cache always fails open: a backend outage or a payload that no
//! longer matches its schema is a miss, never an error. Only failures from
//! the wrapped computation itself reach the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tallycache::cache::{
//!     CacheEngine, CacheNamespace, CacheOptions, CacheSettings, CacheSpec, DependencyKey,
//!     RecomputeRegistry,
//! };
//! use tallycache::storage::MemoryStore;
//!
//! #[derive(serde::Serialize, serde::Deserialize)]
//! struct Subscription {
//!     id: String,
//!     status: String,
//! }
//!
//! # async fn load_subscriptions(customer_id: &str) -> Result<Vec<Subscription>, std::io::Error> { Ok(vec![]) }
//! #[tokio::main]
//! async fn main() -> Result<(), std::io::Error> {
//!     let engine = CacheEngine::new(
//!         Arc::new(MemoryStore::new()),
//!         CacheSettings::from_env(),
//!         RecomputeRegistry::new(),
//!     );
//!
//!     let spec = CacheSpec::<Vec<Subscription>>::json(CacheNamespace::SubscriptionsByCustomer);
//!     let customer_id = "cust_123";
//!
//!     let subscriptions = engine
//!         .cached(
//!             &spec,
//!             customer_id,
//!             CacheOptions::default(),
//!             |_subs| vec![DependencyKey::customer(customer_id)],
//!             || load_subscriptions(customer_id),
//!         )
//!         .await?;
//!
//!     // Later, when the customer changes:
//!     engine
//!         .invalidate_dependencies(&[DependencyKey::customer(customer_id)])
//!         .await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod storage;

pub use cache::{
    CacheEngine, CacheNamespace, CacheOptions, CacheRead, CacheSettings, CacheSpec, DependencyKey,
    MissReason, RecomputeRegistry,
};
pub use storage::{KeyValueStore, MemoryStore, RedisStore, StoreConfig, StoreError, StoreResult};
