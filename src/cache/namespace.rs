use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// TTL applied when neither the namespace table nor the runtime override
/// map says otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Logical cache categories.
///
/// A closed enumeration: every cached computation lives under exactly one
/// namespace, which prefixes its keys and carries the TTL and LRU capacity
/// for all entries in the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheNamespace {
    SubscriptionsByCustomer,
    PaymentMethodsByCustomer,
    UsageMeterBalance,
    CustomerProfile,
    SubscriptionLedger,
    ProductCatalog,
}

impl CacheNamespace {
    pub const ALL: [CacheNamespace; 6] = [
        CacheNamespace::SubscriptionsByCustomer,
        CacheNamespace::PaymentMethodsByCustomer,
        CacheNamespace::UsageMeterBalance,
        CacheNamespace::CustomerProfile,
        CacheNamespace::SubscriptionLedger,
        CacheNamespace::ProductCatalog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::SubscriptionsByCustomer => "subscriptionsByCustomer",
            CacheNamespace::PaymentMethodsByCustomer => "paymentMethodsByCustomer",
            CacheNamespace::UsageMeterBalance => "usageMeterBalance",
            CacheNamespace::CustomerProfile => "customerProfile",
            CacheNamespace::SubscriptionLedger => "subscriptionLedger",
            CacheNamespace::ProductCatalog => "productCatalog",
        }
    }

    pub fn parse(name: &str) -> Option<CacheNamespace> {
        Self::ALL.iter().copied().find(|ns| ns.as_str() == name)
    }

    /// TTL before any runtime override is applied.
    ///
    /// Usage balances churn with every metered event; the catalog barely
    /// moves between deploys.
    pub fn base_ttl(&self) -> Duration {
        match self {
            CacheNamespace::UsageMeterBalance => Duration::from_secs(60),
            CacheNamespace::ProductCatalog => Duration::from_secs(3600),
            _ => DEFAULT_TTL,
        }
    }

    /// Maximum number of live entries tracked for this namespace.
    pub fn lru_capacity(&self) -> usize {
        match self {
            CacheNamespace::SubscriptionsByCustomer => 10_000,
            CacheNamespace::PaymentMethodsByCustomer => 10_000,
            CacheNamespace::UsageMeterBalance => 50_000,
            CacheNamespace::CustomerProfile => 10_000,
            CacheNamespace::SubscriptionLedger => 10_000,
            CacheNamespace::ProductCatalog => 128,
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
