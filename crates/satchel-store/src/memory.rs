//! In-process session store.
//!
//! Everything lives in a `HashMap` behind a Tokio `RwLock`. Fast, zero
//! setup, and gone when the process exits. The default for tests and
//! single-instance deployments.

use std::collections::HashMap;
use std::time::Duration;

use satchel_data::{SessionData, SessionId};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::{ExpiringStore, SessionStore, StoreError};

/// One stored payload plus its deadline.
///
/// `expires_at` uses Tokio's clock rather than `std::time::Instant` so
/// tests can pause and advance time instead of sleeping.
#[derive(Debug, Clone)]
struct Entry {
    data: SessionData,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// A [`SessionStore`] backed by a process-local map.
///
/// Every `save` pushes the record's deadline to `now + ttl`, so a session
/// that keeps being used never expires. Expired records read as absent
/// immediately; [`purge_expired`] reclaims their memory, typically driven
/// by `satchel-sweep`.
///
/// [`purge_expired`]: ExpiringStore::purge_expired
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<SessionId, Entry>>,
    ttl: Option<Duration>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_ttl(Self::DEFAULT_TTL)
    }
}

impl MemoryStore {
    /// TTL used by [`new`](Self::new): 15 minutes, matching the default
    /// cookie lifetime.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(900);

    /// Creates an empty store whose records expire [`DEFAULT_TTL`](Self::DEFAULT_TTL)
    /// after their last save.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store whose records expire `ttl` after their last
    /// save.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    /// Creates an empty store whose records never expire.
    ///
    /// Every client without a cookie leaves a record behind, so this only
    /// suits tests and bounded sets of clients.
    pub fn without_expiry() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: None,
        }
    }

    /// The configured time-to-live, if any.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Number of records held, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if the store holds no records at all.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl SessionStore for MemoryStore {
    async fn load(&self, id: &SessionId) -> Result<SessionData, StoreError> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        Ok(entries
            .get(id)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.data.clone())
            .unwrap_or_default())
    }

    async fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), StoreError> {
        let entry = Entry {
            data: data.clone(),
            expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().await.insert(id.clone(), entry);
        tracing::trace!(session = %id.short(), keys = data.len(), "memory store saved record");
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.entries.write().await.remove(id);
        Ok(())
    }

    async fn exists(&self, id: &SessionId) -> Result<bool, StoreError> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        Ok(entries.get(id).is_some_and(|entry| !entry.is_expired(now)))
    }
}

impl ExpiringStore for MemoryStore {
    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!(
                purged,
                remaining = entries.len(),
                "memory store purged expired records"
            );
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    //! Time-dependent tests run with a paused Tokio clock: the store reads
    //! `tokio::time::Instant`, so `advance` moves records past their
    //! deadline without any real waiting.

    use super::*;

    fn payload(pairs: &[(&str, i64)]) -> SessionData {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn sid(id: &str) -> SessionId {
        SessionId::from(id)
    }

    #[tokio::test]
    async fn test_load_unknown_id_returns_empty_payload() {
        let store = MemoryStore::new();

        let data = store.load(&sid("nobody")).await.expect("never fails");

        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_returns_same_payload() {
        let store = MemoryStore::new();
        let data = payload(&[("user_id", 42), ("visits", 3)]);

        store.save(&sid("a"), &data).await.unwrap();

        assert_eq!(store.load(&sid("a")).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_save_replaces_instead_of_merging() {
        let store = MemoryStore::new();
        store.save(&sid("a"), &payload(&[("old", 1), ("kept", 2)])).await.unwrap();

        store.save(&sid("a"), &payload(&[("kept", 3)])).await.unwrap();

        assert_eq!(store.load(&sid("a")).await.unwrap(), payload(&[("kept", 3)]));
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_tolerates_unknown_ids() {
        let store = MemoryStore::new();
        store.save(&sid("a"), &payload(&[("k", 1)])).await.unwrap();

        store.delete(&sid("a")).await.unwrap();
        store.delete(&sid("never-existed")).await.unwrap();

        assert!(store.is_empty().await);
        assert!(!store.exists(&sid("a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_is_true_for_saved_empty_payload() {
        // The overridden `exists` can tell "saved but empty" from "missing".
        let store = MemoryStore::new();

        store.save(&sid("a"), &SessionData::new()).await.unwrap();

        assert!(store.exists(&sid("a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_records_are_isolated_per_id() {
        let store = MemoryStore::new();
        store.save(&sid("a"), &payload(&[("who", 1)])).await.unwrap();
        store.save(&sid("b"), &payload(&[("who", 2)])).await.unwrap();

        store.delete(&sid("a")).await.unwrap();

        assert_eq!(store.load(&sid("b")).await.unwrap(), payload(&[("who", 2)]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expired_record_reads_as_absent() {
        let store = MemoryStore::with_ttl(Duration::from_secs(900));
        store.save(&sid("a"), &payload(&[("k", 1)])).await.unwrap();

        tokio::time::advance(Duration::from_secs(901)).await;

        assert!(store.load(&sid("a")).await.unwrap().is_empty());
        assert!(!store.exists(&sid("a")).await.unwrap());
        // Still physically present until purged.
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_save_extends_deadline() {
        let store = MemoryStore::with_ttl(Duration::from_secs(900));
        store.save(&sid("a"), &payload(&[("k", 1)])).await.unwrap();

        tokio::time::advance(Duration::from_secs(600)).await;
        store.save(&sid("a"), &payload(&[("k", 2)])).await.unwrap();
        tokio::time::advance(Duration::from_secs(600)).await;

        // 1200s after the first save, but only 600s after the second.
        assert_eq!(store.load(&sid("a")).await.unwrap(), payload(&[("k", 2)]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_removes_only_expired_records() {
        let store = MemoryStore::with_ttl(Duration::from_secs(60));
        store.save(&sid("old"), &payload(&[("k", 1)])).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        store.save(&sid("fresh"), &payload(&[("k", 2)])).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        let purged = store.purge_expired().await.unwrap();

        assert_eq!(purged, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.exists(&sid("fresh")).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_without_expiry_removes_nothing() {
        let store = MemoryStore::without_expiry();
        store.save(&sid("a"), &payload(&[("k", 1)])).await.unwrap();

        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;

        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.ttl(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_expires_records_after_default_ttl() {
        let store = MemoryStore::new();
        store.save(&sid("a"), &SessionData::new()).await.unwrap();

        assert_eq!(store.ttl(), Some(MemoryStore::DEFAULT_TTL));
        tokio::time::advance(MemoryStore::DEFAULT_TTL).await;

        assert!(!store.exists(&sid("a")).await.unwrap());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.is_empty().await);
    }
}
