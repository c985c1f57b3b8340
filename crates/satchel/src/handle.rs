//! Getting at the request's session from inside a handler.

use std::sync::Arc;

use satchel_session::{IdGenerator, RandomIdGenerator, Session};
use satchel_store::SessionStore;
use tokio::sync::{Mutex, MutexGuard};

/// Shared access to the request's [`Session`].
///
/// The middleware puts one of these into the request's extensions before
/// calling the handler and keeps a clone so it can close the session
/// afterwards. The `Mutex` is there to satisfy `Send + Sync` for the
/// extensions map; only one request ever touches a given session, so the
/// lock is never contended in practice.
///
/// Hold the guard only as long as needed and never across the handler
/// returning: the middleware locks the session to close it.
pub struct SessionHandle<S, G = RandomIdGenerator> {
    inner: Arc<Mutex<Session<S, G>>>,
}

impl<S: SessionStore, G: IdGenerator> SessionHandle<S, G> {
    /// Wraps a session for sharing.
    pub fn new(session: Session<S, G>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Locks the session for reading and writing.
    pub async fn lock(&self) -> MutexGuard<'_, Session<S, G>> {
        self.inner.lock().await
    }
}

// Manual impl: deriving would demand `S: Clone`, but only the `Arc` is cloned.
impl<S, G> Clone for SessionHandle<S, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, G> std::fmt::Debug for SessionHandle<S, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}

/// Fetches the [`SessionHandle`] the middleware attached to a request.
///
/// The store type must be named because the extensions map is keyed by
/// type:
///
/// ```rust
/// use satchel::prelude::*;
///
/// async fn handler(req: http::Request<String>) -> Result<(), SessionError> {
///     let Some(handle) = req.session::<MemoryStore>() else {
///         return Ok(()); // layer not installed
///     };
///     let mut session = handle.lock().await;
///     session.set("seen", true)?;
///     Ok(())
/// }
/// ```
pub trait RequestSessionExt {
    /// The session handle, or `None` if no [`SessionLayer`](crate::SessionLayer)
    /// over store `S` ran for this request.
    fn session<S: SessionStore>(&self) -> Option<SessionHandle<S>> {
        self.session_with::<S, RandomIdGenerator>()
    }

    /// Like [`session`](Self::session) for a layer with a custom
    /// identifier generator.
    fn session_with<S: SessionStore, G: IdGenerator>(&self) -> Option<SessionHandle<S, G>>;
}

impl<B> RequestSessionExt for http::Request<B> {
    fn session_with<S: SessionStore, G: IdGenerator>(&self) -> Option<SessionHandle<S, G>> {
        self.extensions().get::<SessionHandle<S, G>>().cloned()
    }
}

impl RequestSessionExt for http::request::Parts {
    fn session_with<S: SessionStore, G: IdGenerator>(&self) -> Option<SessionHandle<S, G>> {
        self.extensions.get::<SessionHandle<S, G>>().cloned()
    }
}
