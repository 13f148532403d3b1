//! Authentication packets and the per-challenge key vector.
//!
//! ```text
//! Challenge (0x01): | code | id | RAND (16) | SQN ^ AK (6) | MAC (16) | IV_c (4) |
//! Response  (0x02): | code | id | RES (16)  | IV_d (4)     |
//! Success   (0x03): | code | id | CONF (16) |
//! Failure   (0x04): | code | id |
//! ```
//!
//! Every value is derived from one HKDF expansion keyed by the long-term key:
//! ```text
//! AK (6) ‖ MAC key (32) ‖ RES (16) ‖ CK (32) = HKDF-SHA256(RAND, LTK, "pod auth v1")
//! MAC  = BLAKE2s(MAC key, RAND ‖ SQN)[..16]
//! CONF = BLAKE2s(CK, "success" ‖ SQN)[..16]
//! ```

use zeroize::Zeroize;

use crate::core::{
    AUTH_KDF_INFO, AUTH_RAND_SIZE, AUTH_RES_SIZE, AUTH_SQN_SIZE, AUTH_SUCCESS_LABEL, AuthError,
    CryptoError, IV_SIZE, MAC_SIZE, SESSION_KEY_SIZE,
};
use crate::crypto::{LongTermKey, SessionKey, hkdf_expand, mac, verify_mac};

/// Packet codes.
pub const CODE_CHALLENGE: u8 = 0x01;
/// Challenge response.
pub const CODE_RESPONSE: u8 = 0x02;
/// Authentication succeeded.
pub const CODE_SUCCESS: u8 = 0x03;
/// Authentication failed.
pub const CODE_FAILURE: u8 = 0x04;

const AK_SIZE: usize = AUTH_SQN_SIZE;
const MAC_KEY_SIZE: usize = 32;
const VECTOR_SIZE: usize = AK_SIZE + MAC_KEY_SIZE + AUTH_RES_SIZE + SESSION_KEY_SIZE;

/// Challenge packet length.
pub const CHALLENGE_LEN: usize = 2 + AUTH_RAND_SIZE + AUTH_SQN_SIZE + MAC_SIZE + IV_SIZE;
/// Response packet length.
pub const RESPONSE_LEN: usize = 2 + AUTH_RES_SIZE + IV_SIZE;
/// Success packet length.
pub const SUCCESS_LEN: usize = 2 + MAC_SIZE;

/// Encode a 48-bit sequence number.
pub fn encode_sequence(sequence: u64) -> [u8; AUTH_SQN_SIZE] {
    let bytes = sequence.to_be_bytes();
    let mut out = [0u8; AUTH_SQN_SIZE];
    out.copy_from_slice(&bytes[8 - AUTH_SQN_SIZE..]);
    out
}

/// Decode a 48-bit sequence number.
pub fn decode_sequence(bytes: &[u8; AUTH_SQN_SIZE]) -> u64 {
    let mut buf = [0u8; 8];
    buf[8 - AUTH_SQN_SIZE..].copy_from_slice(bytes);
    u64::from_be_bytes(buf)
}

/// Keys derived for one challenge.
pub struct AuthVector {
    anonymity_key: [u8; AK_SIZE],
    mac_key: [u8; MAC_KEY_SIZE],
    res: [u8; AUTH_RES_SIZE],
    cipher_key: [u8; SESSION_KEY_SIZE],
}

impl AuthVector {
    /// Derive the vector for `rand` under the long-term key.
    pub fn derive(ltk: &LongTermKey, rand: &[u8; AUTH_RAND_SIZE]) -> Result<Self, CryptoError> {
        let mut okm: [u8; VECTOR_SIZE] = hkdf_expand(rand, ltk.as_bytes(), AUTH_KDF_INFO)?;

        let mut vector = Self {
            anonymity_key: [0u8; AK_SIZE],
            mac_key: [0u8; MAC_KEY_SIZE],
            res: [0u8; AUTH_RES_SIZE],
            cipher_key: [0u8; SESSION_KEY_SIZE],
        };
        let (ak, rest) = okm.split_at(AK_SIZE);
        let (mac_key, rest) = rest.split_at(MAC_KEY_SIZE);
        let (res, ck) = rest.split_at(AUTH_RES_SIZE);
        vector.anonymity_key.copy_from_slice(ak);
        vector.mac_key.copy_from_slice(mac_key);
        vector.res.copy_from_slice(res);
        vector.cipher_key.copy_from_slice(ck);
        okm.zeroize();

        Ok(vector)
    }

    /// XOR a sequence number with the anonymity key. Masking is its own inverse.
    pub fn mask_sequence(&self, sequence: &[u8; AUTH_SQN_SIZE]) -> [u8; AUTH_SQN_SIZE] {
        let mut out = *sequence;
        for (byte, key) in out.iter_mut().zip(self.anonymity_key.iter()) {
            *byte ^= key;
        }
        out
    }

    /// MAC binding the challenge to a sequence number.
    pub fn challenge_mac(
        &self,
        rand: &[u8; AUTH_RAND_SIZE],
        sequence: &[u8; AUTH_SQN_SIZE],
    ) -> Result<[u8; MAC_SIZE], CryptoError> {
        mac(&self.mac_key, &[rand, sequence])
    }

    /// Verify a challenge MAC in constant time.
    pub fn verify_challenge_mac(
        &self,
        rand: &[u8; AUTH_RAND_SIZE],
        sequence: &[u8; AUTH_SQN_SIZE],
        tag: &[u8; MAC_SIZE],
    ) -> Result<bool, CryptoError> {
        verify_mac(&self.mac_key, &[rand, sequence], tag)
    }

    /// Expected challenge response.
    pub fn res(&self) -> &[u8; AUTH_RES_SIZE] {
        &self.res
    }

    /// Success confirmation for `sequence`.
    pub fn success_confirmation(&self, sequence: &[u8; AUTH_SQN_SIZE]) -> Result<[u8; MAC_SIZE], CryptoError> {
        mac(&self.cipher_key, &[AUTH_SUCCESS_LABEL, sequence])
    }

    /// Verify a success confirmation in constant time.
    pub fn verify_success_confirmation(
        &self,
        sequence: &[u8; AUTH_SQN_SIZE],
        tag: &[u8; MAC_SIZE],
    ) -> Result<bool, CryptoError> {
        verify_mac(&self.cipher_key, &[AUTH_SUCCESS_LABEL, sequence], tag)
    }

    /// The session key this challenge establishes.
    pub fn session_key(&self) -> SessionKey {
        SessionKey::from_bytes(self.cipher_key)
    }
}

impl Drop for AuthVector {
    fn drop(&mut self) {
        self.anonymity_key.zeroize();
        self.mac_key.zeroize();
        self.res.zeroize();
        self.cipher_key.zeroize();
    }
}

/// Controller challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Exchange identifier, echoed by every later packet.
    pub identifier: u8,
    /// Random challenge.
    pub rand: [u8; AUTH_RAND_SIZE],
    /// Sequence number masked with the anonymity key.
    pub masked_sequence: [u8; AUTH_SQN_SIZE],
    /// MAC over `rand` and the unmasked sequence.
    pub mac: [u8; MAC_SIZE],
    /// Controller half of the nonce prefix.
    pub controller_iv: [u8; IV_SIZE],
}

impl Challenge {
    /// Build a challenge for `sequence` under `vector`.
    pub fn build(
        vector: &AuthVector,
        identifier: u8,
        rand: [u8; AUTH_RAND_SIZE],
        sequence: u64,
        controller_iv: [u8; IV_SIZE],
    ) -> Result<Self, CryptoError> {
        let sqn = encode_sequence(sequence);
        Ok(Self {
            identifier,
            rand,
            masked_sequence: vector.mask_sequence(&sqn),
            mac: vector.challenge_mac(&rand, &sqn)?,
            controller_iv,
        })
    }

    /// Serialize.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(CHALLENGE_LEN);
        buf.push(CODE_CHALLENGE);
        buf.push(self.identifier);
        buf.extend_from_slice(&self.rand);
        buf.extend_from_slice(&self.masked_sequence);
        buf.extend_from_slice(&self.mac);
        buf.extend_from_slice(&self.controller_iv);
        buf
    }

    /// Parse.
    pub fn decode(bytes: &[u8]) -> Result<Self, AuthError> {
        let mut reader = PacketReader::new(bytes, CODE_CHALLENGE, CHALLENGE_LEN)?;
        Ok(Self {
            identifier: reader.identifier(),
            rand: reader.take(),
            masked_sequence: reader.take(),
            mac: reader.take(),
            controller_iv: reader.take(),
        })
    }
}

/// Device challenge response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResponse {
    /// Identifier of the challenge being answered.
    pub identifier: u8,
    /// Proof of the long-term key.
    pub res: [u8; AUTH_RES_SIZE],
    /// Device half of the nonce prefix.
    pub device_iv: [u8; IV_SIZE],
}

impl ChallengeResponse {
    /// Serialize.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(RESPONSE_LEN);
        buf.push(CODE_RESPONSE);
        buf.push(self.identifier);
        buf.extend_from_slice(&self.res);
        buf.extend_from_slice(&self.device_iv);
        buf
    }

    /// Parse.
    pub fn decode(bytes: &[u8]) -> Result<Self, AuthError> {
        let mut reader = PacketReader::new(bytes, CODE_RESPONSE, RESPONSE_LEN)?;
        Ok(Self {
            identifier: reader.identifier(),
            res: reader.take(),
            device_iv: reader.take(),
        })
    }
}

/// Outcome announced by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Success with its confirmation value.
    Success {
        /// Identifier of the exchange.
        identifier: u8,
        /// Confirmation under the new session key.
        confirmation: [u8; MAC_SIZE],
    },
    /// Controller rejected the response.
    Failure {
        /// Identifier of the exchange.
        identifier: u8,
    },
}

impl Outcome {
    /// Serialize.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Success {
                identifier,
                confirmation,
            } => {
                let mut buf = Vec::with_capacity(SUCCESS_LEN);
                buf.push(CODE_SUCCESS);
                buf.push(*identifier);
                buf.extend_from_slice(confirmation);
                buf
            }
            Self::Failure { identifier } => vec![CODE_FAILURE, *identifier],
        }
    }

    /// Parse.
    pub fn decode(bytes: &[u8]) -> Result<Self, AuthError> {
        if bytes.first() == Some(&CODE_FAILURE) {
            let reader = PacketReader::new(bytes, CODE_FAILURE, 2)?;
            return Ok(Self::Failure {
                identifier: reader.identifier(),
            });
        }

        let mut reader = PacketReader::new(bytes, CODE_SUCCESS, SUCCESS_LEN)?;
        Ok(Self::Success {
            identifier: reader.identifier(),
            confirmation: reader.take(),
        })
    }
}

/// Cursor over a fixed-layout packet whose length was checked up front.
struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    fn new(data: &'a [u8], code: u8, len: usize) -> Result<Self, AuthError> {
        let actual = data.first().copied().unwrap_or_default();
        if data.is_empty() || actual != code {
            return Err(AuthError::UnexpectedCode {
                expected: code,
                actual,
            });
        }
        if data.len() < len {
            return Err(AuthError::TooShort {
                expected: len,
                actual: data.len(),
            });
        }
        Ok(Self {
            data: &data[..len],
            pos: 2,
        })
    }

    fn identifier(&self) -> u8 {
        self.data[1]
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        out
    }
}
