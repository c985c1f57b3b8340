//! Error types for the data layer.

/// Errors that can occur while converting session payloads.
///
/// Both variants wrap the original `serde_json::Error` so callers see
/// the exact field or byte offset that failed.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Serialization failed (turning a Rust value into a payload or bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning bytes or a stored value back into
    /// a Rust type). Usually a corrupt record or a type mismatch between
    /// what was stored and what the caller asked for.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
