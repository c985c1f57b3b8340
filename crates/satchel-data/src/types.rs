//! Core session types: the identifier and the payload.
//!
//! These are the values that cross every layer. The middleware reads a
//! [`SessionId`] out of a cookie, the session layer owns a [`SessionData`]
//! while a request runs, and a store persists the pair.

use std::collections::HashMap;
use std::collections::hash_map;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{DataError, Value};

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// The opaque token correlating a client with its stored payload.
///
/// A newtype over `String` so an identifier can't be confused with a key,
/// a value, or any other string flying around a request handler.
///
/// Identifiers generated by Satchel are 16 random bytes written as 32
/// lowercase hex characters. Identifiers coming from elsewhere (a cookie,
/// a test) can be anything; use [`is_well_formed`](Self::is_well_formed)
/// before trusting one that arrived over the network.
///
/// `Debug` only prints a prefix: an identifier is a bearer credential and
/// ends up in logs far too easily.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Number of random bytes in a generated identifier (128 bits).
    pub const RAW_BYTES: usize = 16;

    /// Length of a generated identifier once hex-encoded.
    pub const ENCODED_LEN: usize = Self::RAW_BYTES * 2;

    /// Characters of the identifier kept by [`short`](Self::short).
    const SHORT_LEN: usize = 8;

    /// Wraps an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Encodes raw random bytes as a lowercase hex identifier.
    ///
    /// `{:02x}` means: lowercase hex, zero-padded to 2 digits, so byte
    /// 0x0A becomes "0a" and every byte contributes exactly two characters.
    pub fn from_random_bytes(bytes: [u8; Self::RAW_BYTES]) -> Self {
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier and returns the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns `true` if this looks like an identifier Satchel generated:
    /// exactly [`ENCODED_LEN`](Self::ENCODED_LEN) lowercase hex characters.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::ENCODED_LEN
            && self.0.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// A log-safe prefix of the identifier.
    ///
    /// Enough to correlate log lines for one session, far too little to
    /// hijack it.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(Self::SHORT_LEN) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.short().len() < self.0.len() {
            write!(f, "SessionId({}…)", self.short())
        } else {
            write!(f, "SessionId({})", self.0)
        }
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// SessionData
// ---------------------------------------------------------------------------

/// The key/value payload of one session.
///
/// Stores always receive the complete, final payload: a `save` replaces
/// whatever was stored before, it never merges. Removing a key from a
/// `SessionData` and saving it is therefore enough to delete that key.
///
/// `#[serde(transparent)]` serializes this as the bare map, so a record on
/// disk is just `{"user_id":42}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData(HashMap<String, Value>);

impl SessionData {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Stores `value` under `key`, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Serializes any `Serialize` type and stores it under `key`.
    ///
    /// # Errors
    /// Returns [`DataError::Encode`] if `value` can't be represented as a
    /// [`Value`].
    pub fn insert_serialized<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Option<Value>, DataError> {
        let value = serde_json::to_value(value).map_err(DataError::Encode)?;
        Ok(self.insert(key, value))
    }

    /// Reads the value under `key` back as a concrete type.
    ///
    /// Returns `Ok(None)` when the key is absent.
    ///
    /// # Errors
    /// Returns [`DataError::Decode`] when the stored value has a different
    /// shape than `T`.
    pub fn get_deserialized<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DataError> {
        self.0
            .get(key)
            .map(|v| T::deserialize(v).map_err(DataError::Decode))
            .transpose()
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Number of keys in the payload.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the payload has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over `(key, value)` pairs, in no particular order.
    pub fn iter(&self) -> hash_map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SessionData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for SessionData {
    type Item = (String, Value);
    type IntoIter = hash_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a SessionData {
    type Item = (&'a String, &'a Value);
    type IntoIter = hash_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
