//! Session data model for Satchel.
//!
//! This crate defines what a session *is*, independent of where it lives
//! or how it reaches the client:
//!
//! - **Types** ([`SessionId`], [`SessionData`], [`Value`]) are the
//!   identifier and the key/value payload a store persists.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) turns payloads into bytes
//!   for stores that keep them outside the process.
//! - **Errors** ([`DataError`]) cover encoding and decoding failures.
//!
//! # Architecture
//!
//! The data layer sits under both the store and the session layers. It
//! knows nothing about lifecycles or cookies.
//!
//! ```text
//! Middleware (cookies) → Session (lifecycle) → Store (persistence)
//!                                 ↘              ↙
//!                            Data (this crate)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::DataError;
pub use types::{SessionData, SessionId};

/// A single session value.
///
/// This is `serde_json::Value`: a closed set of shapes (null, bool, number,
/// string, array, object) rather than an open "any". Anything that
/// implements `Serialize` can be converted into one, see
/// [`SessionData::insert_serialized`].
pub use serde_json::Value;
