//! # Satchel
//!
//! Storage-agnostic HTTP sessions for tower services.
//!
//! Satchel gives each request a [`Session`]: a key/value bag tied to the
//! client by an identifier cookie, loaded from a pluggable store when the
//! request starts and written back when it ends. Handlers can destroy a
//! session or move it to a fresh identifier (after a login, say) without
//! caring how or where it is stored.
//!
//! ## Crates
//!
//! - `satchel-data`: [`SessionId`], [`SessionData`], [`Value`], codecs
//! - `satchel-store`: the [`SessionStore`] trait and its backends
//! - `satchel-session`: the per-request [`Session`] state machine
//! - `satchel-sweep`: periodic purge of expired records
//! - `satchel` (this crate): the [`SessionLayer`] middleware, and
//!   re-exports of everything above
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use satchel::prelude::*;
//! use tower::{ServiceBuilder, ServiceExt};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tower::BoxError> {
//! // Records expire with the cookie; `spawn_sweeper` reclaims them.
//! let store = Arc::new(MemoryStore::with_ttl(satchel::DEFAULT_MAX_AGE));
//! let sweeper = spawn_sweeper(Arc::clone(&store), SweepConfig::default());
//!
//! let app = ServiceBuilder::new()
//!     .layer(SessionLayer::new(store))
//!     .service_fn(|req: http::Request<String>| async move {
//!         let handle = req.session::<MemoryStore>().expect("layer installed");
//!         let mut session = handle.lock().await;
//!         let visits = session.get_as::<u64>("visits")?.unwrap_or(0) + 1;
//!         session.set("visits", visits)?;
//!         Ok::<_, SessionError>(http::Response::new(format!("visit #{visits}")))
//!     });
//!
//! let response = app.oneshot(http::Request::new(String::new())).await?;
//! assert!(response.headers().contains_key(http::header::SET_COOKIE));
//! sweeper.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `redis` enables [`RedisStore`](satchel_store::RedisStore)

mod config;
mod cookies;
mod error;
mod handle;
mod middleware;

pub use config::{
    DEFAULT_COOKIE_NAME, DEFAULT_MAX_AGE, SameSitePolicy, SecureConnection, SecurePolicy,
    SessionConfig,
};
pub use error::SatchelError;
pub use handle::{RequestSessionExt, SessionHandle};
pub use middleware::{SessionLayer, SessionService};

pub use satchel_data::{Codec, DataError, JsonCodec, SessionData, SessionId, Value};
pub use satchel_session::{
    Closed, IdGenerator, RandomIdGenerator, Session, SessionError, SessionState,
};
#[cfg(feature = "redis")]
pub use satchel_store::RedisStore;
pub use satchel_store::{ExpiringStore, FileStore, MemoryStore, SessionStore, StoreError};
pub use satchel_sweep::{SweepConfig, SweepHandle, SweepMetrics, SweepScheduler, spawn_sweeper};

/// Everything a typical application needs, in one import.
pub mod prelude {
    pub use crate::{
        Closed, ExpiringStore, FileStore, MemoryStore, RequestSessionExt, SameSitePolicy,
        SatchelError, SecureConnection, SecurePolicy, Session, SessionConfig, SessionData,
        SessionError, SessionHandle, SessionId, SessionLayer, SessionStore, StoreError,
        SweepConfig, Value, spawn_sweeper,
    };
}
