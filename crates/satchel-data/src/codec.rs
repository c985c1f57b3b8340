//! Codec trait and implementations for persisting session payloads.
//!
//! Stores that keep sessions outside the process (files, Redis) need the
//! payload as bytes. They don't care HOW it is serialized, only that
//! something implements [`Codec`]. The in-memory store never touches a
//! codec at all.
//!
//! [`JsonCodec`] is the default: readable on disk and in `redis-cli`,
//! which makes stale or corrupt records easy to inspect.

use serde::{Serialize, de::DeserializeOwned};

use crate::DataError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a codec lives inside a store, and a
/// store is shared by every request the server handles concurrently.
///
/// `decode` returns a `DeserializeOwned` value so the result never
/// borrows from the read buffer, which is dropped right after decoding.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`DataError::Encode`] if the value can't be represented in
    /// this format (for example a map with non-string keys).
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, DataError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`DataError::Decode`] if the bytes are malformed, truncated,
    /// or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, DataError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use satchel_data::{Codec, JsonCodec, SessionData};
///
/// let codec = JsonCodec;
///
/// let mut data = SessionData::new();
/// data.insert("user_id", 42);
///
/// let bytes = codec.encode(&data).unwrap();
/// let decoded: SessionData = codec.decode(&bytes).unwrap();
/// assert_eq!(data, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, DataError> {
        serde_json::to_vec(value).map_err(DataError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, DataError> {
        serde_json::from_slice(data).map_err(DataError::Decode)
    }
}
