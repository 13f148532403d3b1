//! XChaCha20-Poly1305 message cipher.
//!
//! Nonces are 24 bytes:
//! ```text
//! [ nonce prefix (8) | zeros (8) | counter (8, BE) ]
//! ```
//! The associated data is the transport header of the message as it appears
//! on the wire, so addresses, sequence numbers and flags are authenticated
//! along with the payload.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};

use super::{NoncePrefix, SessionKey};
use crate::core::{AEAD_NONCE_SIZE, AEAD_TAG_SIZE, Cipher, CryptoError, NONCE_PREFIX_SIZE};
use crate::transport::Message;

/// Construct a 24-byte nonce from the session prefix and a counter.
pub fn construct_nonce(prefix: &NoncePrefix, counter: u64) -> [u8; AEAD_NONCE_SIZE] {
    let mut nonce = [0u8; AEAD_NONCE_SIZE];

    // Prefix (bytes 0-7)
    nonce[..NONCE_PREFIX_SIZE].copy_from_slice(prefix.as_bytes());

    // Zeros (bytes 8-15) - already zeroed

    // Counter (bytes 16-23, big-endian)
    nonce[16..24].copy_from_slice(&counter.to_be_bytes());

    nonce
}

/// The [`Cipher`] used by the emulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCipher;

impl MessageCipher {
    /// Create a new cipher.
    pub fn new() -> Self {
        Self
    }
}

impl Cipher for MessageCipher {
    fn encrypt(
        &self,
        key: &SessionKey,
        prefix: &NoncePrefix,
        counter: u64,
        mut message: Message,
    ) -> Result<Message, CryptoError> {
        let aad = message
            .header_bytes(message.payload.len() + AEAD_TAG_SIZE)
            .map_err(|_| CryptoError::EncryptionFailed)?;
        let nonce = construct_nonce(prefix, counter);

        let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &message.payload,
                    aad: &aad,
                },
            )
            .map_err(|_| CryptoError::EncryptionFailed)?;

        message.payload = ciphertext;
        Ok(message)
    }

    fn decrypt(
        &self,
        key: &SessionKey,
        prefix: &NoncePrefix,
        counter: u64,
        message: &Message,
    ) -> Result<Vec<u8>, CryptoError> {
        if message.payload.len() < AEAD_TAG_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }

        let aad = message
            .header_bytes(message.payload.len())
            .map_err(|_| CryptoError::DecryptionFailed)?;
        let nonce = construct_nonce(prefix, counter);

        let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
        cipher
            .decrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &message.payload,
                    aad: &aad,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SESSION_KEY_SIZE;
    use crate::transport::MessageType;

    fn fixtures() -> (SessionKey, NoncePrefix, Message) {
        let key = SessionKey::from_bytes([0x42; SESSION_KEY_SIZE]);
        let prefix = NoncePrefix::from_bytes([1, 2, 3, 4, 5, 6, 7, 8]);
        let msg = Message::new(MessageType::Encrypted, 0x1000, 0x2000, 5, b"S0.0=request".to_vec());
        (key, prefix, msg)
    }

    #[test]
    fn test_nonce_construction() {
        let prefix = NoncePrefix::from_bytes([0xAA; NONCE_PREFIX_SIZE]);
        let nonce = construct_nonce(&prefix, 0x0102);

        assert_eq!(&nonce[0..8], &[0xAA; 8]);
        assert_eq!(&nonce[8..16], &[0u8; 8]);
        assert_eq!(&nonce[16..24], &0x0102u64.to_be_bytes());
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let (key, prefix, msg) = fixtures();
        let cipher = MessageCipher::new();

        let sealed = cipher.encrypt(&key, &prefix, 7, msg.clone()).unwrap();
        assert_eq!(sealed.payload.len(), msg.payload.len() + AEAD_TAG_SIZE);
        assert_eq!(sealed.sequence, msg.sequence);

        let opened = cipher.decrypt(&key, &prefix, 7, &sealed).unwrap();
        assert_eq!(opened, msg.payload);
    }

    #[test]
    fn test_empty_payload() {
        let (key, prefix, mut msg) = fixtures();
        msg.payload.clear();
        let cipher = MessageCipher::new();

        let sealed = cipher.encrypt(&key, &prefix, 1, msg).unwrap();
        assert_eq!(sealed.payload.len(), AEAD_TAG_SIZE); // Just the tag
        assert!(cipher.decrypt(&key, &prefix, 1, &sealed).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_counter_fails() {
        let (key, prefix, msg) = fixtures();
        let cipher = MessageCipher::new();

        let sealed = cipher.encrypt(&key, &prefix, 7, msg).unwrap();
        let result = cipher.decrypt(&key, &prefix, 8, &sealed);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let (key, prefix, msg) = fixtures();
        let cipher = MessageCipher::new();

        let sealed = cipher.encrypt(&key, &prefix, 7, msg).unwrap();
        let other = SessionKey::from_bytes([0x43; SESSION_KEY_SIZE]);
        assert!(matches!(
            cipher.decrypt(&other, &prefix, 7, &sealed),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_header_fails() {
        let (key, prefix, msg) = fixtures();
        let cipher = MessageCipher::new();

        let mut sealed = cipher.encrypt(&key, &prefix, 7, msg).unwrap();
        sealed.sequence ^= 1;
        assert!(matches!(
            cipher.decrypt(&key, &prefix, 7, &sealed),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let (key, prefix, mut msg) = fixtures();
        msg.payload = vec![0u8; AEAD_TAG_SIZE - 1];
        let cipher = MessageCipher::new();
        assert!(matches!(
            cipher.decrypt(&key, &prefix, 1, &msg),
            Err(CryptoError::DecryptionFailed)
        ));
    }
}
