use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

use crate::cache::key::DEPENDENCY_REGISTRY_TTL_SECS;
use crate::cache::namespace::CacheNamespace;

/// Environment variable holding the TTL override map: a JSON object from
/// namespace name to TTL seconds, e.g. `{"subscriptionsByCustomer": 600}`.
pub const TTL_OVERRIDES_ENV: &str = "TALLYCACHE_TTL_OVERRIDES";

const DEFAULT_BACKGROUND_QUEUE_CAPACITY: usize = 256;

/// Runtime cache configuration.
///
/// Only TTLs are runtime-tunable; LRU capacities are fixed in the
/// namespace table.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    ttl_overrides: HashMap<CacheNamespace, Duration>,
    /// TTL applied to dependency registry sets and recompute metadata
    pub dependency_registry_ttl: Duration,
    /// Capacity of the background task queue; work past it is dropped
    pub background_queue_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_overrides: HashMap::new(),
            dependency_registry_ttl: Duration::from_secs(DEPENDENCY_REGISTRY_TTL_SECS),
            background_queue_capacity: DEFAULT_BACKGROUND_QUEUE_CAPACITY,
        }
    }
}

impl CacheSettings {
    /// Load settings, applying TTL overrides from the environment
    pub fn from_env() -> Self {
        let raw = std::env::var(TTL_OVERRIDES_ENV).ok();
        Self::with_overrides_json(raw.as_deref())
    }

    /// Build settings from a raw override blob. Absent, unparsable, or
    /// unknown-namespace entries fall back to the namespace table.
    pub fn with_overrides_json(raw: Option<&str>) -> Self {
        let mut settings = Self::default();
        let Some(raw) = raw else {
            return settings;
        };

        let parsed: HashMap<String, u64> = match serde_json::from_str(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "ignoring unparsable TTL override map");
                return settings;
            }
        };

        for (name, seconds) in parsed {
            match CacheNamespace::parse(&name) {
                Some(namespace) => {
                    settings
                        .ttl_overrides
                        .insert(namespace, Duration::from_secs(seconds));
                }
                None => warn!(namespace = %name, "TTL override for unknown namespace"),
            }
        }
        settings
    }

    /// Effective TTL for a namespace: override, then namespace table
    pub fn ttl_for(&self, namespace: CacheNamespace) -> Duration {
        self.ttl_overrides
            .get(&namespace)
            .copied()
            .unwrap_or_else(|| namespace.base_ttl())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::namespace::DEFAULT_TTL;

    #[test]
    fn test_defaults_follow_namespace_table() {
        let settings = CacheSettings::default();
        assert_eq!(
            settings.ttl_for(CacheNamespace::SubscriptionsByCustomer),
            DEFAULT_TTL
        );
        assert_eq!(
            settings.ttl_for(CacheNamespace::UsageMeterBalance),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_override_applies_to_named_namespace_only() {
        let settings =
            CacheSettings::with_overrides_json(Some(r#"{"subscriptionsByCustomer": 600}"#));
        assert_eq!(
            settings.ttl_for(CacheNamespace::SubscriptionsByCustomer),
            Duration::from_secs(600)
        );
        assert_eq!(settings.ttl_for(CacheNamespace::CustomerProfile), DEFAULT_TTL);
    }

    #[test]
    fn test_unparsable_blob_falls_back() {
        let settings = CacheSettings::with_overrides_json(Some("{not json"));
        assert_eq!(settings.ttl_for(CacheNamespace::CustomerProfile), DEFAULT_TTL);
    }

    #[test]
    fn test_unknown_namespace_ignored() {
        let settings = CacheSettings::with_overrides_json(Some(r#"{"droppedNamespace": 10}"#));
        assert_eq!(settings.ttl_for(CacheNamespace::CustomerProfile), DEFAULT_TTL);
    }
}
