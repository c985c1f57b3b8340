//! The session state machine.
//!
//! A [`Session`] lives for exactly one request. It is started with the
//! identifier from the client (or none), hands out reads and writes while
//! the request runs, and is closed at the end, which is the only moment
//! anything is written back to the store.

use std::fmt;
use std::sync::Arc;

use satchel_data::{SessionData, SessionId, Value};
use satchel_store::SessionStore;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{IdGenerator, RandomIdGenerator, SessionError};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a [`Session`] is in its lifecycle.
///
/// ```text
///            start()                 close()
///   Idle ─────────────→ Active ─────────────→ Idle
///    ↑                    │
///    │ close()            │ destroy()
///    │                    ▼
///    └─────────────── Destroyed
/// ```
///
/// `Destroyed` counts as idle for `start`: a handler may destroy a session
/// and immediately start a fresh one in the same request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not started, or already closed.
    Idle,
    /// Started; data can be read and written.
    Active,
    /// Destroyed during this request; waiting for `close`.
    Destroyed,
}

// ---------------------------------------------------------------------------
// Closed
// ---------------------------------------------------------------------------

/// What a successful [`Session::close`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Closed {
    /// The payload was saved under the unchanged identifier.
    Saved,
    /// The payload moved to a new identifier and the old record is gone.
    Regenerated { previous: SessionId },
    /// The session had been destroyed; nothing was written.
    Destroyed,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One request's view of a stored session.
///
/// All reads and writes happen in memory. The store is touched only by
/// [`start`](Self::start) (load), [`destroy`](Self::destroy) (delete) and
/// [`close`](Self::close) (save, or delete + save on regeneration).
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use satchel_session::{Closed, Session};
/// use satchel_store::MemoryStore;
///
/// # async fn demo() -> Result<(), satchel_session::SessionError> {
/// let store = Arc::new(MemoryStore::new());
///
/// let mut session = Session::new(Arc::clone(&store));
/// let id = session.start(None).await?;
/// session.set("user_id", 42)?;
/// assert_eq!(session.close().await?, Closed::Saved);
///
/// // Next request, same client.
/// let mut session = Session::new(store);
/// session.start(Some(id)).await?;
/// assert_eq!(session.get_or("user_id", 0)?, 42);
/// # Ok(())
/// # }
/// ```
pub struct Session<S, G = RandomIdGenerator> {
    store: Arc<S>,
    generator: Arc<G>,
    state: SessionState,
    id: Option<SessionId>,
    data: SessionData,
    /// Set by `regenerate_id`, consumed by the next `close`.
    pending_id: Option<SessionId>,
}

impl<S: SessionStore> Session<S, RandomIdGenerator> {
    /// Creates an idle session backed by `store`, with random identifiers.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_generator(store, Arc::new(RandomIdGenerator))
    }
}

impl<S: SessionStore, G: IdGenerator> Session<S, G> {
    /// Creates an idle session with a custom identifier generator.
    pub fn with_generator(store: Arc<S>, generator: Arc<G>) -> Self {
        Self {
            store,
            generator,
            state: SessionState::Idle,
            id: None,
            data: SessionData::new(),
            pending_id: None,
        }
    }

    // -- Inspection -------------------------------------------------------

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` between a successful `start` and the next
    /// `close` or `destroy`.
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// The identifier the session is currently stored under.
    ///
    /// After `close` this is still readable: it's the identifier the
    /// client should be told about. `None` after a destroy, which is the
    /// only signal a caller needs to clear the client's cookie.
    ///
    /// During a pending regeneration this is still the old identifier.
    pub fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    /// The identifier that the next `close` will move the session to.
    pub fn pending_id(&self) -> Option<&SessionId> {
        self.pending_id.as_ref()
    }

    /// The store this session reads from and writes to.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // -- Lifecycle --------------------------------------------------------

    /// Starts the session.
    ///
    /// With `Some(id)` the stored payload for `id` is loaded (an unknown
    /// id just means an empty payload). With `None` a fresh identifier is
    /// generated. Returns the identifier in use.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyStarted`] if the session is active.
    /// - [`SessionError::Store`] if the load fails. Nothing changes in
    ///   that case: no identifier, no partial data.
    pub async fn start(&mut self, id: Option<SessionId>) -> Result<SessionId, SessionError> {
        if self.state == SessionState::Active {
            return Err(SessionError::AlreadyStarted);
        }

        let (id, generated) = match id {
            Some(id) => (id, false),
            None => (self.generator.generate(), true),
        };

        let data = self.store.load(&id).await?;

        if generated {
            tracing::info!(session = %id.short(), "session created");
        } else {
            tracing::debug!(session = %id.short(), keys = data.len(), "session resumed");
        }

        self.id = Some(id.clone());
        self.data = data;
        self.pending_id = None;
        self.state = SessionState::Active;
        Ok(id)
    }

    /// Destroys the session: clears its data and identifier and deletes
    /// the stored record.
    ///
    /// The in-memory part always happens. If the delete fails the session
    /// is still `Destroyed` and the error is returned so the caller knows
    /// a record may linger until it expires. Any pending regeneration is
    /// dropped.
    ///
    /// # Errors
    /// - [`SessionError::NotActive`] unless the session is active.
    /// - [`SessionError::Store`] if the delete fails.
    pub async fn destroy(&mut self) -> Result<(), SessionError> {
        self.require_active("destroy")?;

        let id = self.id.take();
        self.data.clear();
        self.pending_id = None;
        self.state = SessionState::Destroyed;

        let Some(id) = id else {
            return Ok(());
        };
        tracing::info!(session = %id.short(), "session destroyed");
        self.store.delete(&id).await?;
        Ok(())
    }

    /// Schedules a move to a fresh identifier and returns it.
    ///
    /// Nothing touches the store until `close`. Calling this twice before
    /// `close` replaces the pending identifier; the record removed at
    /// `close` is still the one the session was started with.
    ///
    /// # Errors
    /// [`SessionError::NotActive`] unless the session is active.
    pub fn regenerate_id(&mut self) -> Result<SessionId, SessionError> {
        self.require_active("regenerate id")?;
        let new_id = self.generator.generate();
        tracing::debug!(
            session = ?self.id.as_ref().map(SessionId::short),
            pending = %new_id.short(),
            "identifier regeneration scheduled"
        );
        self.pending_id = Some(new_id.clone());
        Ok(new_id)
    }

    /// Ends the session, persisting its payload.
    ///
    /// - Active, no regeneration: saves under the current identifier.
    /// - Active, regeneration pending: deletes the old record, then saves
    ///   under the new identifier. Both are attempted even if the delete
    ///   fails. The session adopts the new identifier whenever the save
    ///   succeeds.
    /// - Destroyed: nothing to write.
    ///
    /// Whatever the outcome, the session is `Idle` afterwards. There is no
    /// retry.
    ///
    /// # Errors
    /// - [`SessionError::NotActive`] if the session is idle.
    /// - [`SessionError::Store`] if the save fails. The identifier stays
    ///   the old one.
    /// - [`SessionError::StaleRecord`] if the save under the new identifier
    ///   worked but the old record couldn't be deleted.
    pub async fn close(&mut self) -> Result<Closed, SessionError> {
        match self.state {
            SessionState::Idle => {
                return Err(SessionError::NotActive { operation: "close" });
            }
            SessionState::Destroyed => {
                self.state = SessionState::Idle;
                tracing::debug!("destroyed session closed");
                return Ok(Closed::Destroyed);
            }
            SessionState::Active => {}
        }

        self.state = SessionState::Idle;
        let data = std::mem::take(&mut self.data);
        let pending = self.pending_id.take();

        let Some(current) = self.id.clone() else {
            return Err(SessionError::NotActive { operation: "close" });
        };

        let Some(new_id) = pending else {
            self.store.save(&current, &data).await?;
            tracing::debug!(session = %current.short(), keys = data.len(), "session saved");
            return Ok(Closed::Saved);
        };

        let deleted = self.store.delete(&current).await;
        self.store.save(&new_id, &data).await?;
        self.id = Some(new_id.clone());

        match deleted {
            Ok(()) => {
                tracing::info!(
                    previous = %current.short(),
                    session = %new_id.short(),
                    "session identifier regenerated"
                );
                Ok(Closed::Regenerated { previous: current })
            }
            Err(source) => {
                tracing::warn!(
                    previous = %current.short(),
                    session = %new_id.short(),
                    error = %source,
                    "regenerated session left an orphaned record"
                );
                Err(SessionError::StaleRecord {
                    previous: current,
                    source,
                })
            }
        }
    }

    // -- Data access ------------------------------------------------------

    /// Returns the value under `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<&Value>, SessionError> {
        self.require_active("get")?;
        Ok(self.data.get(key))
    }

    /// Returns the value under `key`, or `default` if the key is absent.
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Result<Value, SessionError> {
        self.require_active("get")?;
        Ok(self.data.get(key).cloned().unwrap_or_else(|| default.into()))
    }

    /// Reads the value under `key` as a concrete type.
    ///
    /// # Errors
    /// [`SessionError::Data`] if the stored value has a different shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        self.require_active("get")?;
        Ok(self.data.get_deserialized(key)?)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), SessionError> {
        self.require_active("set")?;
        self.data.insert(key, value);
        Ok(())
    }

    /// Serializes `value` and stores it under `key`.
    pub fn insert<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), SessionError> {
        self.require_active("set")?;
        self.data.insert_serialized(key, value)?;
        Ok(())
    }

    /// Removes `key`, returning its value if it was present.
    pub fn unset(&mut self, key: &str) -> Result<Option<Value>, SessionError> {
        self.require_active("unset")?;
        Ok(self.data.remove(key))
    }

    /// Returns `true` if `key` is present.
    pub fn has(&self, key: &str) -> Result<bool, SessionError> {
        self.require_active("has")?;
        Ok(self.data.contains_key(key))
    }

    /// Removes every key. The session itself stays active.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.require_active("clear")?;
        self.data.clear();
        Ok(())
    }

    /// Number of keys.
    pub fn len(&self) -> Result<usize, SessionError> {
        self.require_active("len")?;
        Ok(self.data.len())
    }

    /// Returns `true` if there are no keys.
    pub fn is_empty(&self) -> Result<bool, SessionError> {
        self.require_active("is_empty")?;
        Ok(self.data.is_empty())
    }

    /// The keys currently set, in no particular order.
    pub fn keys(&self) -> Result<Vec<String>, SessionError> {
        self.require_active("keys")?;
        Ok(self.data.keys().map(str::to_owned).collect())
    }

    fn require_active(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.state == SessionState::Active {
            Ok(())
        } else {
            Err(SessionError::NotActive { operation })
        }
    }
}

impl<S, G> fmt::Debug for Session<S, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("id", &self.id)
            .field("pending_id", &self.pending_id)
            .field("keys", &self.data.len())
            .finish_non_exhaustive()
    }
}

// =========================================================================
// Tests
// =========================================================================
