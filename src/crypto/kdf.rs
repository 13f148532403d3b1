//! Key derivation and message authentication.
//!
//! HKDF-SHA256 for key schedules, keyed BLAKE2s truncated to
//! [`MAC_SIZE`] for confirmation values. Verification is constant time.

use blake2::Blake2sMac256;
use blake2::digest::{KeyInit, Mac};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::core::{CryptoError, MAC_SIZE};

/// HKDF-SHA256 extract-and-expand into a fixed-size buffer.
pub fn hkdf_expand<const N: usize>(salt: &[u8], ikm: &[u8], info: &[u8]) -> Result<[u8; N], CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; N];
    hk.expand(info, &mut okm)
        .map_err(|_| CryptoError::KeyDerivationFailed)?;
    Ok(okm)
}

fn keyed_mac(key: &[u8], parts: &[&[u8]]) -> Result<Blake2sMac256, CryptoError> {
    let mut mac =
        <Blake2sMac256 as KeyInit>::new_from_slice(key).map_err(|_| CryptoError::KeyDerivationFailed)?;
    for part in parts {
        Mac::update(&mut mac, part);
    }
    Ok(mac)
}

/// Compute a truncated MAC over the concatenation of `parts`.
pub fn mac(key: &[u8], parts: &[&[u8]]) -> Result<[u8; MAC_SIZE], CryptoError> {
    let full = keyed_mac(key, parts)?.finalize().into_bytes();
    let mut tag = [0u8; MAC_SIZE];
    tag.copy_from_slice(&full[..MAC_SIZE]);
    Ok(tag)
}

/// Verify a truncated MAC in constant time.
pub fn verify_mac(key: &[u8], parts: &[&[u8]], tag: &[u8]) -> Result<bool, CryptoError> {
    if tag.len() != MAC_SIZE {
        return Ok(false);
    }
    Ok(keyed_mac(key, parts)?.verify_truncated_left(tag).is_ok())
}
