use std::fmt;

use crate::cache::namespace::CacheNamespace;

/// Prefix for dependency registry sets
pub const DEPENDENCY_REGISTRY_PREFIX: &str = "cacheDeps:";

/// Prefix for recompute metadata entries
pub const RECOMPUTE_METADATA_PREFIX: &str = "cacheRecompute:";

/// TTL refresh applied to registry sets on every registration; must stay
/// strictly longer than any cache entry TTL so memberships outlive entries.
pub const DEPENDENCY_REGISTRY_TTL_SECS: u64 = 24 * 60 * 60;

/// Fully-qualified cache key: `namespace:suffix`.
///
/// The suffix is caller-supplied and must identify the cached computation's
/// inputs within its namespace; the namespace is always the partition
/// prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: CacheNamespace,
    full: String,
}

impl CacheKey {
    pub fn new(namespace: CacheNamespace, suffix: &str) -> Self {
        Self {
            namespace,
            full: format!("{}:{}", namespace.as_str(), suffix),
        }
    }

    /// Recover namespace and key from a full key string (as stored in the
    /// dependency registry). None when the prefix is not a known namespace,
    /// e.g. a stale registration from an older deployment.
    pub fn parse(full: &str) -> Option<CacheKey> {
        let (prefix, _) = full.split_once(':')?;
        let namespace = CacheNamespace::parse(prefix)?;
        Some(Self {
            namespace,
            full: full.to_string(),
        })
    }

    pub fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }

    /// Key of the recompute metadata stored alongside this entry
    pub fn recompute_metadata_key(&self) -> String {
        format!("{RECOMPUTE_METADATA_PREFIX}{}", self.full)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

/// A string naming an invalidatable fact; many cache keys may depend on
/// one dependency key.
///
/// Two families exist by convention, set-membership dependencies
/// (creation/deletion of related rows) and content dependencies (a
/// specific row's fields changed), but the engine treats every
/// dependency key identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyKey(String);

impl DependencyKey {
    pub fn raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn customer(id: &str) -> Self {
        Self(format!("customer:{id}"))
    }

    pub fn subscription_ledger(id: &str) -> Self {
        Self(format!("subscriptionLedger:{id}"))
    }

    pub fn usage_meter(id: &str) -> Self {
        Self(format!("usageMeter:{id}"))
    }

    pub fn payment_method(id: &str) -> Self {
        Self(format!("paymentMethod:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the registry set holding this dependency's dependents
    pub fn registry_key(&self) -> String {
        format!("{DEPENDENCY_REGISTRY_PREFIX}{}", self.0)
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
