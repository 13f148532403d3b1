//! Error types for the pod emulator.
//!
//! Every layer has its own enum; [`SessionError`] composes them. Nothing in
//! here ends the process: the binary decides that once, in one place.

use thiserror::Error;

use crate::transport::MessageType;

/// Errors raised by a [`Transport`](super::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Peer closed the link.
    #[error("transport closed")]
    Closed,

    /// Header does not start with the protocol magic.
    #[error("invalid header magic: {0:02x?}")]
    InvalidMagic([u8; 2]),

    /// Unknown message type in the header flags.
    #[error("invalid message type: {0:#04x}")]
    InvalidType(u8),

    /// Buffer shorter than the header claims.
    #[error("message too short: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Payload does not fit the header length field.
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in the crypto layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD encryption failed.
    #[error("AEAD encryption failed")]
    EncryptionFailed,

    /// AEAD decryption failed (invalid tag or corrupted).
    #[error("AEAD decryption failed (invalid tag or corrupted)")]
    DecryptionFailed,

    /// Nonce counter exhausted - session must terminate.
    #[error("nonce counter exhausted - session must terminate")]
    CounterExhaustion,

    /// Key derivation failed.
    #[error("key derivation failed")]
    KeyDerivationFailed,

    /// The peer's public key produced a degenerate shared secret.
    #[error("non-contributory key exchange")]
    NonContributory,
}

/// Errors while running the pairing exchange.
#[derive(Debug, Error)]
pub enum PairingError {
    /// A named field was expected but something else was found.
    #[error("expected field {expected}")]
    MissingField {
        /// Field name that was expected.
        expected: &'static str,
    },

    /// A field value does not fit its u16 length prefix.
    #[error("field {field} value of {len} bytes is too long to encode")]
    FieldTooLong {
        /// Field name.
        field: &'static str,
        /// Value length.
        len: usize,
    },

    /// A field carried a value of the wrong size.
    #[error("field {field} has length {actual}, expected {expected}")]
    InvalidLength {
        /// Field name.
        field: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Bytes left over after the last expected field.
    #[error("{0} trailing bytes after pairing fields")]
    TrailingBytes(usize),

    /// The controller's confirmation value did not verify.
    #[error("controller confirmation mismatch")]
    ConfirmationMismatch,

    /// A step was attempted before the steps it depends on.
    #[error("pairing step out of order: {0}")]
    OutOfOrder(&'static str),

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Errors while running the authentication handshake.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Packet code was not the one expected at this step.
    #[error("unexpected packet code: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedCode {
        /// Expected code.
        expected: u8,
        /// Actual code.
        actual: u8,
    },

    /// Packet shorter than its fixed layout.
    #[error("packet too short: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Identifier does not match the challenge.
    #[error("identifier mismatch: expected {expected}, got {actual}")]
    IdentifierMismatch {
        /// Expected identifier.
        expected: u8,
        /// Actual identifier.
        actual: u8,
    },

    /// Challenge MAC did not verify under the long-term key.
    #[error("challenge MAC mismatch")]
    ChallengeMacMismatch,

    /// Success confirmation did not verify under the session key.
    #[error("success confirmation mismatch")]
    ConfirmationMismatch,

    /// Controller rejected the challenge response.
    #[error("controller rejected authentication")]
    Rejected,

    /// A step was attempted before the steps it depends on.
    #[error("authentication step out of order: {0}")]
    OutOfOrder(&'static str),

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Errors when decoding a command payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No decoder registered for the opcode.
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    /// Unexpected end of data.
    #[error("unexpected end of data: expected {expected} bytes, got {actual}")]
    UnexpectedEof {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Section marker missing or malformed.
    #[error("invalid section marker")]
    InvalidMarker,

    /// Command body does not fit the one-byte length field.
    #[error("command body of {0} bytes is too long to encode")]
    BodyTooLong(usize),
}

/// Errors from the session state store.
#[derive(Debug, Error)]
pub enum StateError {
    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored state could not be parsed.
    #[error("malformed state: {0}")]
    Deserialize(#[from] toml::de::Error),

    /// State could not be serialized.
    #[error("could not serialize state: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Errors loading a [`DeviceConfig`](crate::device::DeviceConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for this schema.
    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level session errors. Every variant is fatal for the session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Pairing error.
    #[error("pairing error: {0}")]
    Pairing(#[from] PairingError),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Command decode error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Persistence error.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Decrypted request shorter than the minimum payload.
    #[error("decrypted payload too short: {len} bytes")]
    PayloadTooShort {
        /// Payload length.
        len: usize,
    },

    /// Acknowledgment carried a body.
    #[error("acknowledgment carried {len} payload bytes")]
    NonEmptyAck {
        /// Payload length.
        len: usize,
    },

    /// Message of the wrong type for the current phase.
    #[error("unexpected message type: expected {expected:?}, got {actual:?}")]
    UnexpectedMessageType {
        /// Expected type.
        expected: MessageType,
        /// Actual type.
        actual: MessageType,
    },

    /// Command loop entered without session key material.
    #[error("no session key material; authentication has not completed")]
    MissingSessionMaterial,

    /// Authentication entered without a long-term key.
    #[error("no long-term key; device is not paired")]
    NotPaired,
}
