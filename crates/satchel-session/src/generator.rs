//! Identifier generation.
//!
//! A session identifier is a bearer credential: whoever presents it owns
//! the session. It must be unguessable, which means a CSPRNG and enough
//! bits that enumerating live sessions is hopeless.

use rand::Rng;
use satchel_data::SessionId;

/// Produces fresh session identifiers.
///
/// `Send + Sync + 'static` because one generator is shared by every
/// session the middleware creates.
///
/// The default, [`RandomIdGenerator`], is what production code wants.
/// Tests swap in a deterministic generator to get predictable ids.
pub trait IdGenerator: Send + Sync + 'static {
    /// Returns a new identifier. Must never repeat in practice.
    fn generate(&self) -> SessionId;
}

/// 128 bits from the thread-local CSPRNG, hex-encoded.
///
/// `rand::rng()` is a ChaCha-based generator seeded from the OS, and is
/// cheap to call: it only touches thread-local state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> SessionId {
        let bytes: [u8; SessionId::RAW_BYTES] = rand::rng().random();
        SessionId::from_random_bytes(bytes)
    }
}
