use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::storage::{KeyValueStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum Stored {
    Bytes {
        data: Vec<u8>,
        expires_at: Option<Instant>,
    },
    Set {
        members: HashSet<String>,
        expires_at: Option<Instant>,
    },
}

impl Stored {
    fn expires_at(&self) -> Option<Instant> {
        match self {
            Stored::Bytes { expires_at, .. } | Stored::Set { expires_at, .. } => *expires_at,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at().is_some_and(|at| at <= now)
    }

    fn set_expiry(&mut self, at: Instant) {
        match self {
            Stored::Bytes { expires_at, .. } | Stored::Set { expires_at, .. } => {
                *expires_at = Some(at);
            }
        }
    }
}

fn purge_expired(entries: &mut HashMap<String, Stored>, key: &str, now: Instant) {
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
    }
}

/// In-process key-value store with lazy TTL expiry.
///
/// Used by the test suite and for local development. The `offline` switch
/// makes every operation fail with `BackendUnavailable`, which is how the
/// fail-open behavior of the cache layer gets exercised without a real
/// backend outage.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Stored>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a backend outage; all operations fail until re-enabled
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::Acquire) {
            Err(StoreError::BackendUnavailable(
                "memory store is offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Number of live (unexpired) keys, for test assertions
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.check_online()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        purge_expired(&mut entries, key, now);

        match entries.get(key) {
            None => Ok(None),
            Some(Stored::Bytes { data, .. }) => Ok(Some(data.clone())),
            Some(Stored::Set { .. }) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        self.check_online()?;
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Stored::Bytes {
                data: value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        self.check_online()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let mut removed = 0;
        for key in keys {
            if let Some(entry) = entries.remove(key) {
                if !entry.is_expired(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn exists(&self, keys: &[String]) -> StoreResult<u64> {
        self.check_online()?;
        let now = Instant::now();
        let entries = self.entries.read().await;

        let count = keys
            .iter()
            .filter(|key| entries.get(*key).is_some_and(|e| !e.is_expired(now)))
            .count();
        Ok(count as u64)
    }

    async fn sadd(&self, set_key: &str, members: &[String]) -> StoreResult<u64> {
        self.check_online()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        purge_expired(&mut entries, set_key, now);

        match entries
            .entry(set_key.to_string())
            .or_insert_with(|| Stored::Set {
                members: HashSet::new(),
                expires_at: None,
            }) {
            Stored::Set { members: set, .. } => {
                let mut added = 0;
                for member in members {
                    if set.insert(member.clone()) {
                        added += 1;
                    }
                }
                Ok(added)
            }
            Stored::Bytes { .. } => Err(StoreError::WrongType(set_key.to_string())),
        }
    }

    async fn smembers(&self, set_key: &str) -> StoreResult<Vec<String>> {
        self.check_online()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        purge_expired(&mut entries, set_key, now);

        match entries.get(set_key) {
            None => Ok(Vec::new()),
            Some(Stored::Set { members, .. }) => Ok(members.iter().cloned().collect()),
            Some(Stored::Bytes { .. }) => Err(StoreError::WrongType(set_key.to_string())),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.check_online()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        purge_expired(&mut entries, key, now);

        match entries.get_mut(key) {
            None => Ok(false),
            Some(entry) => {
                entry.set_expiry(now + ttl);
                Ok(true)
            }
        }
    }

    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<Vec<u8>>>> {
        self.check_online()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            purge_expired(&mut entries, key, now);
            let value = match entries.get(key) {
                None => None,
                Some(Stored::Bytes { data, .. }) => Some(data.clone()),
                Some(Stored::Set { .. }) => None,
            };
            values.push(value);
        }
        Ok(values)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
