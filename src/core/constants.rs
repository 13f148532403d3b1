//! Protocol constants for the pod emulator.
//!
//! These values are fixed by the wire protocol and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// CRYPTOGRAPHIC CONSTANTS
// =============================================================================

/// Poly1305 authentication tag size.
pub const AEAD_TAG_SIZE: usize = 16;

/// XChaCha20 nonce size.
pub const AEAD_NONCE_SIZE: usize = 24;

/// Session (cipher) key size.
pub const SESSION_KEY_SIZE: usize = 32;

/// Long-term key size produced by pairing.
pub const LTK_SIZE: usize = 16;

/// Nonce prefix size (controller IV followed by device IV).
pub const NONCE_PREFIX_SIZE: usize = 8;

/// Half of the nonce prefix contributed by each side of the handshake.
pub const IV_SIZE: usize = 4;

/// X25519 public key size.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Truncated MAC / confirmation value size.
pub const MAC_SIZE: usize = 16;

// =============================================================================
// TRANSPORT HEADER
// =============================================================================

/// Magic bytes opening every transport header.
pub const MESSAGE_MAGIC: [u8; 2] = *b"TW";

/// Transport header size (magic + flags + seq + ack seq + length + src + dst).
pub const MESSAGE_HEADER_SIZE: usize = 2 + 1 + 1 + 1 + 2 + 4 + 4;

/// Largest payload representable in the header length field.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

// =============================================================================
// PAIRING
// =============================================================================

/// Nonce size used by both sides of the pairing key exchange.
pub const PAIRING_NONCE_SIZE: usize = 16;

/// Device identifier carried in `SP1=`.
pub const DEVICE_ID_SIZE: usize = 4;

/// Value of the `P0=` field that closes pairing.
pub const P0_CONSTANT: u8 = 0xA5;

/// HKDF info for the pairing key schedule.
pub const PAIRING_KDF_INFO: &[u8] = b"pod pairing v1";

/// Label mixed into the controller's confirmation value.
pub const CONTROLLER_CONFIRMATION_LABEL: &[u8] = b"KC_2_U";

/// Label mixed into the device's confirmation value.
pub const DEVICE_CONFIRMATION_LABEL: &[u8] = b"KC_2_V";

// =============================================================================
// AUTHENTICATION
// =============================================================================

/// Random challenge size.
pub const AUTH_RAND_SIZE: usize = 16;

/// Authentication sequence number size on the wire (48-bit).
pub const AUTH_SQN_SIZE: usize = 6;

/// Challenge-response (RES) size.
pub const AUTH_RES_SIZE: usize = 16;

/// HKDF info for the authentication key schedule.
pub const AUTH_KDF_INFO: &[u8] = b"pod auth v1";

/// Label mixed into the success confirmation.
pub const AUTH_SUCCESS_LABEL: &[u8] = b"success";

// =============================================================================
// COMMAND PAYLOAD LAYOUT
// =============================================================================

/// Marker opening a command or response section.
pub const SECTION_PREFIX: &[u8; 5] = b"S0.0=";

/// Marker closing a command or response section.
pub const SECTION_SUFFIX: &[u8; 5] = b",G0.0";

/// Fixed header region in front of the opcode.
pub const HEADER_LEN: usize = 13;

/// Fixed trailing region after the command body.
pub const TRAILER_LEN: usize = 5;

/// Offset of the opcode byte inside a decrypted payload.
pub const OPCODE_OFFSET: usize = HEADER_LEN;

/// Minimum decrypted payload length; anything shorter is a protocol violation.
pub const MIN_PAYLOAD_LEN: usize = 16;

/// Offset of the request identifier inside the header region.
pub const REQUEST_ID_OFFSET: usize = 7;

/// Request identifier size.
pub const REQUEST_ID_SIZE: usize = 4;

/// Offset of the byte carrying the command sequence number.
pub const SEQUENCE_BYTE_OFFSET: usize = 11;

/// Opcode of the deactivation command.
pub const DEACTIVATE_OPCODE: u8 = 0x1c;

// =============================================================================
// TIMING
// =============================================================================

/// Pause after the final acknowledgment before a deactivated session ends.
pub const DEACTIVATION_GRACE: Duration = Duration::from_secs(1);
