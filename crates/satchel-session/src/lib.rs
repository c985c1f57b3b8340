//! Per-request session lifecycle for Satchel.
//!
//! This crate owns the [`Session`] state machine: start it with the
//! client's identifier, read and write its data while the request runs,
//! and close it at the end to persist the result.
//!
//! # How it fits in the stack
//!
//! ```text
//! Middleware (satchel)       ← reads the cookie, starts/closes a Session
//!     ↕
//! Session Layer (this crate) ← state machine, regeneration, destroy
//!     ↕
//! Store Layer (satchel-store) ← load/save/delete by identifier
//! ```
//!
//! # Regeneration
//!
//! Privilege changes (logging in, elevating to admin) should move the
//! session to a fresh identifier so an attacker who planted or sniffed
//! the old one gets nothing. [`Session::regenerate_id`] schedules that
//! move; [`Session::close`] carries it out by deleting the old record and
//! saving under the new identifier.

mod error;
mod generator;
mod session;

pub use error::SessionError;
pub use generator::{IdGenerator, RandomIdGenerator};
pub use session::{Closed, Session, SessionState};
