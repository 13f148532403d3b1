//! Transport message and its header encoding.
//!
//! Wire format (15-byte header, big-endian, followed by the payload):
//! ```text
//! +-------+-------+-----+---------+--------+----------+-------------+
//! | Magic | Flags | Seq | Ack Seq | Length | Source   | Destination |
//! | "TW"  | 1     | 1   | 1       | 2      | 4        | 4           |
//! +-------+-------+-----+---------+--------+----------+-------------+
//! ```
//! Flags: bit 4 = ack, bits 0..3 = message type. The header, with the length
//! of the payload as sent, is also the AEAD associated data.

use crate::core::{MESSAGE_HEADER_SIZE, MESSAGE_MAGIC, TransportError};

const ACK_FLAG: u8 = 0x10;
const TYPE_MASK: u8 = 0x0F;

/// Message type carried in the header flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Unencrypted, not part of a handshake.
    Clear = 0x00,
    /// Encrypted with the session key.
    Encrypted = 0x01,
    /// Authentication handshake.
    SessionEstablishment = 0x02,
    /// Pairing exchange.
    Pairing = 0x03,
}

impl MessageType {
    /// Parse a message type from the low nibble of the flags byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Clear),
            0x01 => Some(Self::Encrypted),
            0x02 => Some(Self::SessionEstablishment),
            0x03 => Some(Self::Pairing),
            _ => None,
        }
    }

    /// Byte representation.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One framed message exchanged with the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type.
    pub message_type: MessageType,
    /// Sender address.
    pub source: u32,
    /// Receiver address.
    pub destination: u32,
    /// Link-level sequence number.
    pub sequence: u8,
    /// Whether `ack_sequence` is meaningful.
    pub ack: bool,
    /// Sequence number being acknowledged.
    pub ack_sequence: u8,
    /// Opaque payload (plaintext or ciphertext depending on the type).
    pub payload: Vec<u8>,
}

impl Message {
    /// Create a message without acknowledgment.
    pub fn new(
        message_type: MessageType,
        source: u32,
        destination: u32,
        sequence: u8,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            message_type,
            source,
            destination,
            sequence,
            ack: false,
            ack_sequence: 0,
            payload,
        }
    }

    /// Mark the message as acknowledging `sequence`.
    pub fn with_ack(mut self, sequence: u8) -> Self {
        self.ack = true;
        self.ack_sequence = sequence;
        self
    }

    /// Encode the header for a payload of `payload_len` bytes.
    pub fn header_bytes(&self, payload_len: usize) -> Result<[u8; MESSAGE_HEADER_SIZE], TransportError> {
        let len = u16::try_from(payload_len).map_err(|_| TransportError::PayloadTooLarge(payload_len))?;

        let mut buf = [0u8; MESSAGE_HEADER_SIZE];
        buf[0..2].copy_from_slice(&MESSAGE_MAGIC);
        buf[2] = self.message_type.as_byte() | if self.ack { ACK_FLAG } else { 0 };
        buf[3] = self.sequence;
        buf[4] = self.ack_sequence;
        buf[5..7].copy_from_slice(&len.to_be_bytes());
        buf[7..11].copy_from_slice(&self.source.to_be_bytes());
        buf[11..15].copy_from_slice(&self.destination.to_be_bytes());
        Ok(buf)
    }

    /// Serialize header and payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransportError> {
        let header = self.header_bytes(self.payload.len())?;
        let mut buf = Vec::with_capacity(MESSAGE_HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Parse a complete message.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransportError> {
        let (mut message, len) = Self::parse_header(bytes)?;
        let expected = MESSAGE_HEADER_SIZE + len;
        if bytes.len() < expected {
            return Err(TransportError::TooShort {
                expected,
                actual: bytes.len(),
            });
        }
        message.payload = bytes[MESSAGE_HEADER_SIZE..expected].to_vec();
        Ok(message)
    }

    /// Parse a header, returning a message with an empty payload and the
    /// payload length announced by the header.
    pub fn parse_header(bytes: &[u8]) -> Result<(Self, usize), TransportError> {
        if bytes.len() < MESSAGE_HEADER_SIZE {
            return Err(TransportError::TooShort {
                expected: MESSAGE_HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let magic = [bytes[0], bytes[1]];
        if magic != MESSAGE_MAGIC {
            return Err(TransportError::InvalidMagic(magic));
        }

        let flags = bytes[2];
        let message_type =
            MessageType::from_byte(flags & TYPE_MASK).ok_or(TransportError::InvalidType(flags & TYPE_MASK))?;
        let len = u16::from_be_bytes([bytes[5], bytes[6]]) as usize;

        let message = Self {
            message_type,
            source: u32::from_be_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]),
            destination: u32::from_be_bytes([bytes[11], bytes[12], bytes[13], bytes[14]]),
            sequence: bytes[3],
            ack: flags & ACK_FLAG != 0,
            ack_sequence: bytes[4],
            payload: Vec::new(),
        };
        Ok((message, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MAX_PAYLOAD_SIZE;

    #[test]
    fn test_header_layout() {
        let msg = Message::new(MessageType::Encrypted, 0x0102_0304, 0xA0B0_C0D0, 7, vec![0xEE; 3]).with_ack(8);
        let bytes = msg.to_bytes().unwrap();

        assert_eq!(bytes.len(), MESSAGE_HEADER_SIZE + 3);
        assert_eq!(&bytes[0..2], b"TW");
        assert_eq!(bytes[2], 0x11); // ack flag | encrypted
        assert_eq!(bytes[3], 7);
        assert_eq!(bytes[4], 8);
        assert_eq!(&bytes[5..7], &[0x00, 0x03]);
        assert_eq!(&bytes[7..11], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[11..15], &[0xA0, 0xB0, 0xC0, 0xD0]);
    }

    #[test]
    fn test_parse_message() {
        let msg = Message::new(MessageType::Pairing, 1, 2, 200, b"SP1=".to_vec());
        let parsed = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, msg);
        assert!(!parsed.ack);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = Message::new(MessageType::Clear, 1, 2, 0, vec![]).to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            Message::from_bytes(&bytes),
            Err(TransportError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_unknown_type() {
        let mut bytes = Message::new(MessageType::Clear, 1, 2, 0, vec![]).to_bytes().unwrap();
        bytes[2] = 0x0A;
        assert!(matches!(
            Message::from_bytes(&bytes),
            Err(TransportError::InvalidType(0x0A))
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = Message::new(MessageType::Clear, 1, 2, 0, vec![1, 2, 3, 4]).to_bytes().unwrap();
        let result = Message::from_bytes(&bytes[..bytes.len() - 1]);
        assert!(matches!(
            result,
            Err(TransportError::TooShort { expected: 19, actual: 18 })
        ));
    }

    #[test]
    fn test_payload_too_large() {
        let msg = Message::new(MessageType::Clear, 1, 2, 0, vec![0; MAX_PAYLOAD_SIZE + 1]);
        assert!(matches!(msg.to_bytes(), Err(TransportError::PayloadTooLarge(_))));
    }
}
