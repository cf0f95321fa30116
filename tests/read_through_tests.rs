mod common;

use std::future::ready;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tallycache::cache::{CacheNamespace, CacheOptions, CacheSpec, DependencyKey};
use tallycache::storage::KeyValueStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    id: String,
    version: u32,
}

fn profile(version: u32) -> Profile {
    Profile {
        id: "cust_1".to_string(),
        version,
    }
}

#[tokio::test]
async fn first_call_computes_second_call_hits() {
    common::init_logging();
    let (engine, _store) = common::engine();
    let spec = CacheSpec::<Profile>::json(CacheNamespace::CustomerProfile);
    let calls = AtomicU32::new(0);

    for _ in 0..2 {
        let value = engine
            .cached(
                &spec,
                "cust_1",
                CacheOptions::default(),
                |p: &Profile| vec![DependencyKey::customer(&p.id)],
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ready(Ok::<_, io::Error>(profile(1)))
                },
            )
            .await
            .unwrap();
        assert_eq!(value, profile(1));
    }

    // The second call must have been served from cache
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.stats().hits, 1);
}

#[tokio::test]
async fn ignore_cache_bypasses_without_writing_back() {
    let (engine, _store) = common::engine();
    let spec = CacheSpec::<Profile>::json(CacheNamespace::CustomerProfile);

    // Populate with version 1
    let first = engine
        .cached(
            &spec,
            "cust_1",
            CacheOptions::default(),
            |_: &Profile| vec![],
            || ready(Ok::<_, io::Error>(profile(1))),
        )
        .await
        .unwrap();
    assert_eq!(first.version, 1);

    // Forced-fresh read sees version 2 but must not pollute the cache
    let bypassed = engine
        .cached(
            &spec,
            "cust_1",
            CacheOptions::bypass(),
            |_: &Profile| vec![],
            || ready(Ok::<_, io::Error>(profile(2))),
        )
        .await
        .unwrap();
    assert_eq!(bypassed.version, 2);

    // A normal read still returns the original cached value
    let cached = engine
        .cached(
            &spec,
            "cust_1",
            CacheOptions::default(),
            |_: &Profile| vec![],
            || ready(Ok::<_, io::Error>(profile(3))),
        )
        .await
        .unwrap();
    assert_eq!(cached.version, 1);
}

#[tokio::test]
async fn invalid_payload_is_a_miss_and_self_heals() {
    let (engine, store) = common::engine();
    let spec = CacheSpec::<Profile>::json(CacheNamespace::CustomerProfile);
    let calls = AtomicU32::new(0);

    // Seed the key with a payload that fails the schema
    store
        .set(
            "customerProfile:cust_1",
            br#"{"unexpected": true}"#.to_vec(),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    let value = engine
        .cached(
            &spec,
            "cust_1",
            CacheOptions::default(),
            |_: &Profile| vec![],
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready(Ok::<_, io::Error>(profile(7)))
            },
        )
        .await
        .unwrap();
    assert_eq!(value.version, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.stats().misses_corrupt, 1);

    // The corrupt payload was overwritten with a valid one
    let again = engine
        .cached(
            &spec,
            "cust_1",
            CacheOptions::default(),
            |_: &Profile| vec![],
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready(Ok::<_, io::Error>(profile(8)))
            },
        )
        .await
        .unwrap();
    assert_eq!(again.version, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn offline_backend_fails_open() {
    let (engine, store) = common::engine();
    let spec = CacheSpec::<Profile>::json(CacheNamespace::CustomerProfile);
    let calls = AtomicU32::new(0);

    store.set_offline(true);

    for _ in 0..2 {
        let value = engine
            .cached(
                &spec,
                "cust_1",
                CacheOptions::default(),
                |_: &Profile| vec![DependencyKey::customer("cust_1")],
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ready(Ok::<_, io::Error>(profile(1)))
                },
            )
            .await
            .unwrap();
        assert_eq!(value.version, 1);
    }

    // Nothing cacheable while the backend is down: every call computes
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(engine.stats().misses_backend_error, 2);
    engine.quiesce().await;
}

#[tokio::test]
async fn fetch_errors_propagate_unchanged() {
    let (engine, store) = common::engine();
    let spec = CacheSpec::<Profile>::json(CacheNamespace::CustomerProfile);

    let result = engine
        .cached(
            &spec,
            "cust_1",
            CacheOptions::default(),
            |_: &Profile| vec![],
            || {
                ready(Err::<Profile, _>(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "db down",
                )))
            },
        )
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);

    // A failed computation caches nothing
    assert_eq!(
        store
            .exists(&["customerProfile:cust_1".to_string()])
            .await
            .unwrap(),
        0
    );
}
