//! Session store abstraction for Satchel.
//!
//! Provides the [`SessionStore`] trait that the session layer persists
//! through, and a few backends:
//!
//! - [`MemoryStore`] keeps records in a process-local map
//! - [`FileStore`] writes one file per session into a directory
//! - `RedisStore` (feature `redis`) keeps records in a shared Redis
//!
//! A store only ever sees whole payloads keyed by identifier. It has no
//! idea whether a session was regenerated or destroyed; the session layer
//! translates those into plain `save`/`delete` calls.
//!
//! # Feature Flags
//!
//! - `redis` enables `RedisStore` via the `redis` crate's connection manager

mod error;
mod file;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

use std::future::Future;

use satchel_data::{SessionData, SessionId};

/// Persists session payloads by identifier.
///
/// Every method returns a `Send` future so a store can be driven from a
/// multi-threaded Tokio runtime, which is where HTTP middleware runs.
/// Implementors can still write plain `async fn` in their `impl` block.
///
/// # Contract
///
/// - `load` of an unknown identifier is not an error: it returns an empty
///   payload.
/// - `save` replaces the full payload. Stores never merge.
/// - `delete` of an unknown identifier is not an error.
/// - Operations on different identifiers must not interfere with each
///   other, even when they run concurrently. Two concurrent `save`s for
///   the same identifier may race; the last one wins.
///
/// # Example
///
/// ```rust
/// use satchel_data::{SessionData, SessionId};
/// use satchel_store::{SessionStore, StoreError};
///
/// /// Remembers nothing. Every session starts empty, every save vanishes.
/// struct AmnesiacStore;
///
/// impl SessionStore for AmnesiacStore {
///     async fn load(&self, _id: &SessionId) -> Result<SessionData, StoreError> {
///         Ok(SessionData::new())
///     }
///
///     async fn save(&self, _id: &SessionId, _data: &SessionData) -> Result<(), StoreError> {
///         Ok(())
///     }
///
///     async fn delete(&self, _id: &SessionId) -> Result<(), StoreError> {
///         Ok(())
///     }
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Returns the payload stored under `id`, or an empty payload.
    fn load(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<SessionData, StoreError>> + Send;

    /// Replaces whatever is stored under `id` with `data`.
    fn save(
        &self,
        id: &SessionId,
        data: &SessionData,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes any payload stored under `id`.
    fn delete(&self, id: &SessionId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns `true` if a live record exists under `id`.
    ///
    /// The default derives this from [`load`](Self::load), which can't tell
    /// an empty record from a missing one. Backends that can should
    /// override it.
    fn exists(&self, id: &SessionId) -> impl Future<Output = Result<bool, StoreError>> + Send {
        async move { Ok(!self.load(id).await?.is_empty()) }
    }
}

/// A store whose records expire and need explicit cleanup.
///
/// Backends with native expiry (Redis) don't implement this. For the rest,
/// expired records already read as absent; purging only reclaims space.
pub trait ExpiringStore: SessionStore {
    /// Removes every expired record and returns how many were removed.
    fn purge_expired(&self) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stores exactly one record and ignores the identifier entirely.
    /// Only good for exercising the default `exists`.
    struct SingleSlot(tokio::sync::Mutex<SessionData>);

    impl SessionStore for SingleSlot {
        async fn load(&self, _id: &SessionId) -> Result<SessionData, StoreError> {
            Ok(self.0.lock().await.clone())
        }

        async fn save(&self, _id: &SessionId, data: &SessionData) -> Result<(), StoreError> {
            *self.0.lock().await = data.clone();
            Ok(())
        }

        async fn delete(&self, _id: &SessionId) -> Result<(), StoreError> {
            self.0.lock().await.clear();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_exists_follows_load() {
        let store = SingleSlot(tokio::sync::Mutex::new(SessionData::new()));
        let id = SessionId::from("abc");

        assert!(!store.exists(&id).await.unwrap());

        let data: SessionData = [("k", "v")].into_iter().collect();
        store.save(&id, &data).await.unwrap();
        assert!(store.exists(&id).await.unwrap());

        store.delete(&id).await.unwrap();
        assert!(!store.exists(&id).await.unwrap());
    }

    #[test]
    fn test_store_error_display_redacts_identifier() {
        let err = StoreError::InvalidId(SessionId::from("0123456789abcdef0123456789abcdef"));

        let msg = err.to_string();

        assert!(msg.contains("01234567"));
        assert!(!msg.contains("0123456789abcdef0123456789abcdef"));
    }
}
