//! Error types for the session layer.

use satchel_data::{DataError, SessionId};
use satchel_store::StoreError;

/// Errors that can occur while driving a [`Session`](crate::Session).
///
/// Two families, and callers usually care which one they got:
///
/// - **Precondition violations** ([`AlreadyStarted`](Self::AlreadyStarted),
///   [`NotActive`](Self::NotActive)) are programming errors. The session
///   state didn't change.
/// - **Store failures** ([`Store`](Self::Store),
///   [`StaleRecord`](Self::StaleRecord)) come from the backend and are
///   worth retrying on a later request.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `start` was called on a session that is already active.
    #[error("session already started")]
    AlreadyStarted,

    /// An operation that needs an active session ran without one.
    #[error("cannot {operation}: session is not active")]
    NotActive { operation: &'static str },

    /// The store failed to load, save, or delete.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A regeneration saved the payload under the new identifier but
    /// couldn't delete the old record.
    ///
    /// The session did move to the new identifier. The old record is
    /// orphaned until the store expires it.
    #[error(
        "session moved to a new identifier but the record under {} could not be removed: {source}",
        .previous.short()
    )]
    StaleRecord {
        previous: SessionId,
        #[source]
        source: StoreError,
    },

    /// A typed read or write couldn't convert the value.
    #[error(transparent)]
    Data(#[from] DataError),
}

impl SessionError {
    /// Returns `true` for misuse of the session API rather than a runtime
    /// failure.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::AlreadyStarted | Self::NotActive { .. })
    }

    /// Returns `true` if the error originated in the store.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_) | Self::StaleRecord { .. })
    }
}
