//! Unified error type for Satchel.

use http::header::InvalidHeaderValue;
use satchel_data::DataError;
use satchel_session::SessionError;
use satchel_store::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `satchel` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The middleware
/// boxes it into a `tower::BoxError`, so a caller can get it back with
/// `err.downcast_ref::<SatchelError>()`.
#[derive(Debug, thiserror::Error)]
pub enum SatchelError {
    /// Starting or closing the request's session failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A store call made by the middleware itself failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A value couldn't be converted to or from its stored form.
    #[error(transparent)]
    Data(#[from] DataError),

    /// The session cookie couldn't be written as a header value
    /// (usually a cookie name, path, or domain with illegal characters).
    #[error("invalid Set-Cookie header: {0}")]
    Header(#[from] InvalidHeaderValue),
}

impl SatchelError {
    /// Returns `true` if the failure came from the store, directly or
    /// through the session layer.
    pub fn is_store_failure(&self) -> bool {
        match self {
            Self::Store(_) => true,
            Self::Session(e) => e.is_store_failure(),
            _ => false,
        }
    }
}
