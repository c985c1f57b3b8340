//! Redis-backed session store (feature `redis`).
//!
//! Each session is a single string key holding the encoded payload. Redis
//! expires keys on its own, so this store doesn't implement
//! [`ExpiringStore`](crate::ExpiringStore) and never needs a sweeper.

use std::time::Duration;

use ::redis::AsyncCommands;
use ::redis::aio::ConnectionManager;
use satchel_data::{Codec, JsonCodec, SessionData, SessionId};

use crate::{SessionStore, StoreError};

/// Prepended to every identifier to form the Redis key.
pub const DEFAULT_KEY_PREFIX: &str = "satchel:";

/// Default key lifetime, matching the default cookie lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(900);

/// A [`SessionStore`] that keeps sessions in Redis.
///
/// `ConnectionManager` reconnects on its own and is cheap to clone, so
/// every operation clones it rather than holding a lock across `.await`.
///
/// ## Example
///
/// ```rust,no_run
/// use satchel_store::RedisStore;
///
/// # async fn demo() -> Result<(), satchel_store::StoreError> {
/// let store = RedisStore::connect("redis://127.0.0.1/")
///     .await?
///     .with_prefix("myapp:session:");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisStore<C: Codec = JsonCodec> {
    conn: ConnectionManager,
    prefix: String,
    ttl: Duration,
    codec: C,
}

impl RedisStore<JsonCodec> {
    /// Connects to the Redis server at `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(url).map_err(backend)?;
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::Unavailable(format!("could not connect to {url}: {e}"))
        })?;
        tracing::debug!(url, "redis store connected");
        Ok(Self::from_manager(conn, JsonCodec))
    }
}

impl<C: Codec> RedisStore<C> {
    /// Wraps an existing connection manager.
    pub fn from_manager(conn: ConnectionManager, codec: C) -> Self {
        Self {
            conn,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
            ttl: DEFAULT_TTL,
            codec,
        }
    }

    /// Sets the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets how long a key lives after its last save.
    ///
    /// Redis won't accept a zero expiry, so anything under a second is
    /// rounded up to one.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn key(&self, id: &SessionId) -> String {
        format!("{}{}", self.prefix, id)
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

impl<C: Codec> SessionStore for RedisStore<C> {
    async fn load(&self, id: &SessionId) -> Result<SessionData, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<Vec<u8>> = conn.get(self.key(id)).await.map_err(backend)?;
        match raw {
            None => Ok(SessionData::new()),
            Some(bytes) => self.codec.decode(&bytes).map_err(|source| StoreError::Corrupt {
                id: id.clone(),
                source,
            }),
        }
    }

    async fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), StoreError> {
        let bytes = self.codec.encode(data).map_err(StoreError::Encoding)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(id), bytes, self.ttl_secs())
            .await
            .map_err(backend)?;
        tracing::trace!(session = %id.short(), "redis store saved record");
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.key(id)).await.map_err(backend)?;
        Ok(())
    }

    async fn exists(&self, id: &SessionId) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        conn.exists(self.key(id)).await.map_err(backend)
    }
}

fn backend(e: ::redis::RedisError) -> StoreError {
    if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Backend(Box::new(e))
    }
}
