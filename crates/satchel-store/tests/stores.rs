//! Integration tests that run the shared contract checks against every
//! backend that needs no external service.

mod common;

use common::{check_concurrent_ids_do_not_interfere, check_missing_then_saved_then_deleted};
use satchel_store::{FileStore, MemoryStore};

#[tokio::test]
async fn test_memory_store_contract() {
    check_missing_then_saved_then_deleted(MemoryStore::new()).await;
}

#[tokio::test]
async fn test_file_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    check_missing_then_saved_then_deleted(FileStore::open(dir.path()).await.unwrap()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_store_concurrent_ids() {
    check_concurrent_ids_do_not_interfere(MemoryStore::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_store_concurrent_ids() {
    let dir = tempfile::tempdir().unwrap();
    check_concurrent_ids_do_not_interfere(FileStore::open(dir.path()).await.unwrap()).await;
}
