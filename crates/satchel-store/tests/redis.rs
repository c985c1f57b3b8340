//! Integration tests for `RedisStore`.
//!
//! Built only with `--features redis` and skipped unless `REDIS_URL`
//! points at a server, e.g. `REDIS_URL=redis://127.0.0.1/`. Each test
//! uses its own key prefix so runs don't see each other's records.

#![cfg(feature = "redis")]

mod common;

use std::time::Duration;

use common::{
    check_concurrent_ids_do_not_interfere, check_missing_then_saved_then_deleted, generated_id,
};
use satchel_data::SessionData;
use satchel_store::{RedisStore, SessionStore, StoreError};

async fn store(test: &str) -> Option<RedisStore> {
    let Ok(url) = std::env::var("REDIS_URL") else {
        eprintln!("REDIS_URL not set, skipping {test}");
        return None;
    };
    let store = RedisStore::connect(&url)
        .await
        .expect("REDIS_URL should point at a reachable server")
        .with_prefix(format!("satchel-test:{}:{test}:", std::process::id()));
    Some(store)
}

/// Polls a condition until it holds or `timeout` passes.
async fn poll_until<F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut condition: F,
) -> Result<(), String>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }
    Err(format!("timed out after {timeout:?}"))
}

#[tokio::test]
async fn test_redis_store_contract() {
    let Some(store) = store("contract").await else {
        return;
    };
    check_missing_then_saved_then_deleted(store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_redis_store_concurrent_ids() {
    let Some(store) = store("concurrent").await else {
        return;
    };
    check_concurrent_ids_do_not_interfere(store).await;
}

#[tokio::test]
async fn test_redis_store_key_expires_after_ttl() {
    let Some(store) = store("ttl").await else {
        return;
    };
    let store = store.with_ttl(Duration::from_secs(1));
    let id = generated_id(7);
    let mut data = SessionData::new();
    data.insert("k", 1);

    store.save(&id, &data).await.unwrap();
    assert!(store.exists(&id).await.unwrap());

    poll_until(Duration::from_millis(2500), Duration::from_millis(100), || async {
        !store.exists(&id).await.unwrap()
    })
    .await
    .expect("key should expire within 2500ms");
    assert!(store.load(&id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_redis_store_prefixes_isolate_records() {
    let (Some(a), Some(b)) = (store("prefix-a").await, store("prefix-b").await) else {
        return;
    };
    let id = generated_id(9);
    let mut data = SessionData::new();
    data.insert("owner", "a");

    a.save(&id, &data).await.unwrap();

    assert!(!b.exists(&id).await.unwrap());
    assert!(b.load(&id).await.unwrap().is_empty());
    a.delete(&id).await.unwrap();
}

#[tokio::test]
async fn test_redis_store_undecodable_value_is_corrupt() {
    let Ok(url) = std::env::var("REDIS_URL") else {
        return;
    };
    let prefix = format!("satchel-test:{}:corrupt:", std::process::id());
    let store = RedisStore::connect(&url).await.unwrap().with_prefix(prefix.clone());
    let id = generated_id(3);

    let client = redis::Client::open(url.as_str()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let _: () = redis::AsyncCommands::set_ex(&mut conn, format!("{prefix}{id}"), "not json", 60)
        .await
        .unwrap();

    let err = store.load(&id).await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }), "got {err:?}");
    store.delete(&id).await.unwrap();
}
