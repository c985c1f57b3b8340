//! Tower middleware that runs a [`Session`] around every request.
//!
//! For each request the layer:
//!
//! 1. reads the identifier from the session cookie and screens it
//! 2. starts a [`Session`] (loading the stored payload)
//! 3. hands the handler a [`SessionHandle`] through the request extensions
//! 4. closes the session once the handler returns, even on error
//! 5. appends a `Set-Cookie` with the live identifier, or a removal
//!    cookie if the handler destroyed the session

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::header::SET_COOKIE;
use http::{Request, Response};
use satchel_data::SessionId;
use satchel_session::{Closed, IdGenerator, RandomIdGenerator, Session, SessionError, SessionState};
use satchel_store::SessionStore;
use tower::{BoxError, Layer, Service};
use tracing::{debug, error, warn};

use crate::config::SessionConfig;
use crate::cookies;
use crate::{SatchelError, SessionHandle};

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

/// Adds session handling to a tower service.
///
/// ```rust
/// use std::sync::Arc;
/// use satchel::prelude::*;
/// use tower::ServiceBuilder;
///
/// let store = Arc::new(MemoryStore::with_ttl(satchel::DEFAULT_MAX_AGE));
/// let layer = SessionLayer::new(store)
///     .with_config(SessionConfig::default().with_cookie_name("sid"));
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service_fn(|_req: http::Request<String>| async {
///         Ok::<_, std::convert::Infallible>(http::Response::new(String::new()))
///     });
/// # let _ = service;
/// ```
pub struct SessionLayer<S, G = RandomIdGenerator> {
    store: Arc<S>,
    generator: Arc<G>,
    config: Arc<SessionConfig>,
}

impl<S: SessionStore> SessionLayer<S, RandomIdGenerator> {
    /// A layer over `store` with the default config and random ids.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            generator: Arc::new(RandomIdGenerator),
            config: Arc::new(SessionConfig::default()),
        }
    }
}

impl<S: SessionStore, G: IdGenerator> SessionLayer<S, G> {
    /// Replaces the config. The config is [validated](SessionConfig::validated) first.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = Arc::new(config.validated());
        self
    }

    /// Replaces the identifier generator.
    pub fn with_generator<G2: IdGenerator>(self, generator: G2) -> SessionLayer<S, G2> {
        SessionLayer {
            store: self.store,
            generator: Arc::new(generator),
            config: self.config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S, G> Clone for SessionLayer<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            generator: Arc::clone(&self.generator),
            config: Arc::clone(&self.config),
        }
    }
}

impl<Inner, S, G> Layer<Inner> for SessionLayer<S, G> {
    type Service = SessionService<Inner, S, G>;

    fn layer(&self, inner: Inner) -> Self::Service {
        SessionService {
            inner,
            store: Arc::clone(&self.store),
            generator: Arc::clone(&self.generator),
            config: Arc::clone(&self.config),
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// The service produced by [`SessionLayer`].
///
/// Errors from the inner service pass through boxed. Session failures
/// surface as a boxed [`SatchelError`].
pub struct SessionService<Inner, S, G = RandomIdGenerator> {
    inner: Inner,
    store: Arc<S>,
    generator: Arc<G>,
    config: Arc<SessionConfig>,
}

impl<Inner: Clone, S, G> Clone for SessionService<Inner, S, G> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            store: Arc::clone(&self.store),
            generator: Arc::clone(&self.generator),
            config: Arc::clone(&self.config),
        }
    }
}

impl<Inner, S, G, ReqBody, ResBody> Service<Request<ReqBody>> for SessionService<Inner, S, G>
where
    Inner: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    Inner::Error: Into<BoxError>,
    S: SessionStore,
    G: IdGenerator,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // The clone hasn't been polled ready; swap so the ready one is used.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let store = Arc::clone(&self.store);
        let generator = Arc::clone(&self.generator);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let secure = cookies::is_secure(&req, &config);
            let incoming = cookies::read_session_id(req.headers(), &config.cookie_name);
            let candidate = screen(&*store, incoming, &config).await?;

            let mut session = Session::with_generator(store, generator);
            session.start(candidate).await.map_err(SatchelError::from)?;
            let handle = SessionHandle::new(session);
            req.extensions_mut().insert(handle.clone());

            let result: Result<Response<ResBody>, BoxError> =
                inner.call(req).await.map_err(Into::into);

            let finished = finish(&handle).await;
            let (mut response, client_id) = match (result, finished) {
                (Ok(response), Ok(client_id)) => (response, client_id),
                (Ok(_), Err(e)) => return Err(e.into()),
                (Err(e), finished) => {
                    if let Err(close_err) = finished {
                        error!(error = %close_err, "session close failed after handler error");
                    }
                    return Err(e);
                }
            };

            let set_cookie = match &client_id {
                Some(id) => cookies::live_cookie(&config, id, secure),
                None => cookies::removal_cookie(&config, secure),
            };
            let value = cookies::to_header_value(&set_cookie).map_err(SatchelError::from)?;
            response.headers_mut().append(SET_COOKIE, value);
            Ok(response)
        })
    }
}

/// Decides which identifier, if any, to start the session with.
///
/// `None` means "generate a fresh one".
async fn screen<S: SessionStore>(
    store: &S,
    incoming: Option<SessionId>,
    config: &SessionConfig,
) -> Result<Option<SessionId>, SatchelError> {
    let Some(id) = incoming else {
        return Ok(None);
    };
    if !id.is_well_formed() {
        debug!("ignoring malformed session cookie");
        return Ok(None);
    }
    if config.strict_ids && !store.exists(&id).await? {
        debug!(session = %id.short(), "ignoring unknown session id");
        return Ok(None);
    }
    Ok(Some(id))
}

/// Closes the session unless the handler already did, and reports the
/// identifier the client should hold (`None` = forget the cookie).
async fn finish<S: SessionStore, G: IdGenerator>(
    handle: &SessionHandle<S, G>,
) -> Result<Option<SessionId>, SatchelError> {
    let mut session = handle.lock().await;

    if session.state() != SessionState::Idle {
        match session.close().await {
            Ok(Closed::Saved | Closed::Regenerated { .. } | Closed::Destroyed) => {}
            Err(SessionError::StaleRecord { previous, source }) => {
                warn!(
                    previous = %previous.short(),
                    error = %source,
                    "keeping regenerated session despite orphaned record"
                );
            }
            Err(e) => {
                error!(
                    session = ?session.id().map(SessionId::short),
                    error = %e,
                    "session close failed"
                );
                return Err(e.into());
            }
        }
    }

    Ok(session.id().cloned())
}
