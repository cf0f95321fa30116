mod common;

use std::future::ready;
use std::io;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tallycache::cache::{CacheNamespace, CacheSpec, DependencyKey};
use tallycache::storage::KeyValueStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Subscription {
    id: String,
    customer_id: String,
}

fn sub(id: &str, customer_id: &str) -> Subscription {
    Subscription {
        id: id.to_string(),
        customer_id: customer_id.to_string(),
    }
}

/// Source of truth: subscriptions per customer, with a call log
struct SubscriptionSource {
    rows: Vec<Subscription>,
    fetches: Mutex<Vec<Vec<String>>>,
}

impl SubscriptionSource {
    fn new(rows: Vec<Subscription>) -> Self {
        Self {
            rows,
            fetches: Mutex::new(Vec::new()),
        }
    }

    fn fetch(&self, customer_ids: Vec<String>) -> Result<Vec<Subscription>, io::Error> {
        self.fetches.lock().unwrap().push(customer_ids.clone());
        Ok(self
            .rows
            .iter()
            .filter(|row| customer_ids.contains(&row.customer_id))
            .cloned()
            .collect())
    }

    fn fetch_log(&self) -> Vec<Vec<String>> {
        self.fetches.lock().unwrap().clone()
    }
}

fn keys(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
async fn bulk_lookup_collapses_misses_into_one_fetch() {
    common::init_logging();
    let (engine, _store) = common::engine();
    let spec = CacheSpec::<Vec<Subscription>>::json(CacheNamespace::SubscriptionsByCustomer);
    let source = SubscriptionSource::new(vec![
        sub("sub_1", "cust_1"),
        sub("sub_2", "cust_1"),
        sub("sub_3", "cust_2"),
    ]);

    let results = engine
        .cached_bulk_lookup(
            &spec,
            &keys(&["cust_1", "cust_2", "cust_3"]),
            |customer_id, _subs| vec![DependencyKey::customer(customer_id)],
            |row| row.customer_id.clone(),
            |missed| ready(source.fetch(missed)),
        )
        .await
        .unwrap();

    // One fetch, carrying exactly the missed keys
    assert_eq!(
        source.fetch_log(),
        vec![keys(&["cust_1", "cust_2", "cust_3"])]
    );

    // Every requested key is present; no items means an empty group
    assert_eq!(results.len(), 3);
    assert_eq!(results["cust_1"], vec![sub("sub_1", "cust_1"), sub("sub_2", "cust_1")]);
    assert_eq!(results["cust_2"], vec![sub("sub_3", "cust_2")]);
    assert_eq!(results["cust_3"], Vec::<Subscription>::new());
}

#[tokio::test]
async fn bulk_lookup_reuses_cached_groups() {
    let (engine, _store) = common::engine();
    let spec = CacheSpec::<Vec<Subscription>>::json(CacheNamespace::SubscriptionsByCustomer);
    let source = SubscriptionSource::new(vec![
        sub("sub_1", "cust_1"),
        sub("sub_4", "cust_4"),
    ]);

    let first = engine
        .cached_bulk_lookup(
            &spec,
            &keys(&["cust_1", "cust_2"]),
            |customer_id, _subs| vec![DependencyKey::customer(customer_id)],
            |row| row.customer_id.clone(),
            |missed| ready(source.fetch(missed)),
        )
        .await
        .unwrap();
    engine.quiesce().await;

    // Second call: cust_1 and the empty cust_2 group are hits, cust_4 misses
    let second = engine
        .cached_bulk_lookup(
            &spec,
            &keys(&["cust_1", "cust_2", "cust_4"]),
            |customer_id, _subs| vec![DependencyKey::customer(customer_id)],
            |row| row.customer_id.clone(),
            |missed| ready(source.fetch(missed)),
        )
        .await
        .unwrap();

    assert_eq!(
        source.fetch_log(),
        vec![keys(&["cust_1", "cust_2"]), keys(&["cust_4"])]
    );
    assert_eq!(second["cust_1"], first["cust_1"]);
    assert_eq!(second["cust_2"], first["cust_2"]);
    assert_eq!(second["cust_4"], vec![sub("sub_4", "cust_4")]);
}

#[tokio::test]
async fn bulk_lookup_deduplicates_input_keys() {
    let (engine, _store) = common::engine();
    let spec = CacheSpec::<Vec<Subscription>>::json(CacheNamespace::SubscriptionsByCustomer);
    let source = SubscriptionSource::new(vec![sub("sub_1", "cust_1")]);

    let results = engine
        .cached_bulk_lookup(
            &spec,
            &keys(&["cust_1", "cust_1", "cust_1"]),
            |_, _| vec![],
            |row| row.customer_id.clone(),
            |missed| ready(source.fetch(missed)),
        )
        .await
        .unwrap();

    assert_eq!(source.fetch_log(), vec![keys(&["cust_1"])]);
    assert_eq!(results.len(), 1);
    assert_eq!(results["cust_1"], vec![sub("sub_1", "cust_1")]);
}

#[tokio::test]
async fn bulk_fetch_failure_is_a_hard_failure() {
    let (engine, _store) = common::engine();
    let spec = CacheSpec::<Vec<Subscription>>::json(CacheNamespace::SubscriptionsByCustomer);

    let result = engine
        .cached_bulk_lookup(
            &spec,
            &keys(&["cust_1"]),
            |_, _| vec![],
            |row: &Subscription| row.customer_id.clone(),
            |_missed| async {
                Err::<Vec<Subscription>, _>(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "replica down",
                ))
            },
        )
        .await;

    assert_eq!(result.unwrap_err().kind(), io::ErrorKind::ConnectionRefused);
}

#[tokio::test]
async fn bulk_groups_stay_independently_invalidatable() {
    let (engine, store) = common::engine();
    let spec = CacheSpec::<Vec<Subscription>>::json(CacheNamespace::SubscriptionsByCustomer);
    let source = SubscriptionSource::new(vec![
        sub("sub_1", "cust_1"),
        sub("sub_2", "cust_2"),
    ]);

    engine
        .cached_bulk_lookup(
            &spec,
            &keys(&["cust_1", "cust_2"]),
            |customer_id, _subs| vec![DependencyKey::customer(customer_id)],
            |row| row.customer_id.clone(),
            |missed| ready(source.fetch(missed)),
        )
        .await
        .unwrap();
    engine.quiesce().await;

    engine
        .invalidate_dependencies(&[DependencyKey::customer("cust_1")])
        .await;
    engine.quiesce().await;

    // cust_1's group is gone, cust_2's survives
    assert_eq!(
        store
            .exists(&["subscriptionsByCustomer:cust_1".to_string()])
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        store
            .exists(&["subscriptionsByCustomer:cust_2".to_string()])
            .await
            .unwrap(),
        1
    );

    // Only cust_1 needs refetching afterwards
    engine
        .cached_bulk_lookup(
            &spec,
            &keys(&["cust_1", "cust_2"]),
            |customer_id, _subs| vec![DependencyKey::customer(customer_id)],
            |row| row.customer_id.clone(),
            |missed| ready(source.fetch(missed)),
        )
        .await
        .unwrap();
    assert_eq!(
        source.fetch_log(),
        vec![keys(&["cust_1", "cust_2"]), keys(&["cust_1"])]
    );
}
