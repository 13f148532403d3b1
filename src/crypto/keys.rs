//! Key material types.
//!
//! Every secret is zeroized on drop. Keys serialize as hex strings so the
//! session state file stays human-inspectable.

use std::fmt;

use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::core::{
    CryptoError, IV_SIZE, LTK_SIZE, NONCE_PREFIX_SIZE, PUBLIC_KEY_SIZE, SESSION_KEY_SIZE,
};

/// Long-term key established by pairing.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LongTermKey(#[serde(with = "hex::serde")] [u8; LTK_SIZE]);

impl LongTermKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; LTK_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw key bytes.
    ///
    /// # Security
    /// Handle with care - this exposes sensitive key material.
    pub fn as_bytes(&self) -> &[u8; LTK_SIZE] {
        &self.0
    }

    /// Short non-secret identifier for logs.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.0)
    }
}

impl Drop for LongTermKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for LongTermKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LongTermKey({})", self.fingerprint())
    }
}

/// Working session key derived by authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(#[serde(with = "hex::serde")] [u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Create a new session key from bytes.
    pub fn from_bytes(key: [u8; SESSION_KEY_SIZE]) -> Self {
        Self(key)
    }

    /// Get the raw key bytes.
    ///
    /// # Security
    /// Handle with care - this exposes sensitive key material.
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }

    /// Short non-secret identifier for logs.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.0)
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({})", self.fingerprint())
    }
}

/// Fixed nonce prefix for the life of a session: controller IV ‖ device IV.
///
/// Not secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoncePrefix(#[serde(with = "hex::serde")] [u8; NONCE_PREFIX_SIZE]);

impl NoncePrefix {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; NONCE_PREFIX_SIZE]) -> Self {
        Self(bytes)
    }

    /// Join the two handshake IVs.
    pub fn from_ivs(controller_iv: &[u8; IV_SIZE], device_iv: &[u8; IV_SIZE]) -> Self {
        let mut prefix = [0u8; NONCE_PREFIX_SIZE];
        prefix[..IV_SIZE].copy_from_slice(controller_iv);
        prefix[IV_SIZE..].copy_from_slice(device_iv);
        Self(prefix)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_PREFIX_SIZE] {
        &self.0
    }
}

/// Ephemeral X25519 keypair used for one pairing exchange.
pub struct DeviceKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl DeviceKeypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(OsRng))
    }

    /// Create a keypair from existing secret bytes.
    pub fn from_secret_bytes(secret: [u8; 32]) -> Self {
        Self::from_secret(StaticSecret::from(secret))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Get the public key.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.public.as_bytes()
    }

    /// Compute the DH shared secret with a remote public key.
    ///
    /// Rejects low-order remote keys that would yield an all-zero secret.
    pub fn diffie_hellman(&self, remote_public: &[u8; PUBLIC_KEY_SIZE]) -> Result<[u8; 32], CryptoError> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*remote_public));
        if !shared.was_contributory() {
            return Err(CryptoError::NonContributory);
        }
        Ok(*shared.as_bytes())
    }
}

/// Fill a fixed-size array from the OS RNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

fn fingerprint(key: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(&Sha256::digest(key)[..4])
}
