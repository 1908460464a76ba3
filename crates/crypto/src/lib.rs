//! OastBeacon Cryptography
//!
//! The relay handshake primitives: the session's RSA keypair, unwrapping the
//! relay's per-poll AES key (RSA-OAEP/SHA-256), and decrypting AES-CFB
//! interaction payloads. `seal` holds the relay-side counterparts used by
//! local relay stubs.

mod codec;
mod keys;
mod seal;

pub use codec::*;
pub use keys::*;
pub use seal::*;
