//! Security layer.
//!
//! Implements the cryptographic primitives for the emulator:
//! - Key types with `Zeroize` and hex serialization
//! - XChaCha20-Poly1305 message cipher and nonce construction
//! - HKDF-SHA256 key schedules and truncated BLAKE2s MACs
//! - X25519 keypairs for pairing

mod aead;
mod kdf;
mod keys;

pub use aead::*;
pub use kdf::*;
pub use keys::*;
