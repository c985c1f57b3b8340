use satchel_data::{DataError, SessionId};

/// Errors that can occur in the store layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend can't be reached right now (connection refused, pool
    /// exhausted, timeout enforced by the adapter).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend reported an error of its own.
    #[error("store backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Reading or writing local storage failed.
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record exists but can't be decoded.
    #[error("corrupt record for session {}: {source}", .id.short())]
    Corrupt {
        id: SessionId,
        #[source]
        source: DataError,
    },

    /// The payload couldn't be encoded for storage.
    #[error("encoding failed: {0}")]
    Encoding(#[source] DataError),

    /// The identifier can't be used as a key by this store.
    #[error("identifier {0:?} is not usable by this store")]
    InvalidId(SessionId),
}
