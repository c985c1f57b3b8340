//! Contract checks shared by every backend's integration tests.
//!
//! Each check is a generic async fn over `S: SessionStore`, so a new
//! backend only needs one more `#[tokio::test]` line per check.

use std::sync::Arc;

use satchel_data::{SessionData, SessionId, Value};
use satchel_store::SessionStore;

pub fn generated_id(n: u8) -> SessionId {
    SessionId::from_random_bytes([n; SessionId::RAW_BYTES])
}

pub async fn check_missing_then_saved_then_deleted<S: SessionStore>(store: S) {
    let id = generated_id(1);
    assert!(store.load(&id).await.unwrap().is_empty());
    assert!(!store.exists(&id).await.unwrap());

    let mut data = SessionData::new();
    data.insert("user_id", 42);
    data.insert("roles", serde_json::json!(["admin", "ops"]));
    store.save(&id, &data).await.unwrap();
    assert_eq!(store.load(&id).await.unwrap(), data);
    assert!(store.exists(&id).await.unwrap());

    store.delete(&id).await.unwrap();
    assert!(store.load(&id).await.unwrap().is_empty());
    assert!(!store.exists(&id).await.unwrap());
}

/// Many tasks hammer distinct identifiers at once; nobody may see
/// anybody else's payload.
pub async fn check_concurrent_ids_do_not_interfere<S: SessionStore>(store: S) {
    let store = Arc::new(store);
    let mut tasks = Vec::new();

    for n in 0..32u8 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            let id = generated_id(n);
            for round in 0..5i64 {
                let data: SessionData = [("owner", Value::from(n)), ("round", Value::from(round))]
                    .into_iter()
                    .collect();
                store.save(&id, &data).await.unwrap();
                let back = store.load(&id).await.unwrap();
                assert_eq!(back.get("owner"), Some(&Value::from(n)));
            }
        }));
    }

    for task in tasks {
        task.await.expect("task should not panic");
    }
}
