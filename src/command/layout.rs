//! Section layout shared by commands and responses.
//!
//! ```text
//! +--------+---------+------------+--------+---------+--------+---------+---------+
//! | "S0.0="| Sec Len | Request ID | Seq    | Msg Len | Opcode | Args    | ",G0.0" |
//! | 5      | 2 (BE)  | 4          | 1      | 1       | 1      | ...     | 5       |
//! +--------+---------+------------+--------+---------+--------+---------+---------+
//! 0        5         7            11       12        13
//! ```
//! The sequence lives in bits 2..5 of byte 11. The section length counts the
//! bytes between the length field and the trailer.

use crate::core::{
    DecodeError, HEADER_LEN, OPCODE_OFFSET, REQUEST_ID_OFFSET, REQUEST_ID_SIZE, SECTION_PREFIX,
    SECTION_SUFFIX, SEQUENCE_BYTE_OFFSET, TRAILER_LEN,
};

const SEQUENCE_SHIFT: u8 = 2;
const SEQUENCE_MASK: u8 = 0x0F;

/// Sequence number and request identifier common to every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandHeader {
    /// Per-command sequence number (4 bits on the wire).
    pub sequence: u8,
    /// Opaque request identifier, echoed in the response.
    pub request_id: [u8; REQUEST_ID_SIZE],
}

impl CommandHeader {
    /// Parse the header region of a decrypted payload.
    pub fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < HEADER_LEN {
            return Err(DecodeError::UnexpectedEof {
                expected: HEADER_LEN,
                actual: payload.len(),
            });
        }
        if !payload.starts_with(SECTION_PREFIX) {
            return Err(DecodeError::InvalidMarker);
        }

        let mut request_id = [0u8; REQUEST_ID_SIZE];
        request_id.copy_from_slice(&payload[REQUEST_ID_OFFSET..REQUEST_ID_OFFSET + REQUEST_ID_SIZE]);

        Ok(Self {
            sequence: (payload[SEQUENCE_BYTE_OFFSET] >> SEQUENCE_SHIFT) & SEQUENCE_MASK,
            request_id,
        })
    }
}

/// Opcode byte of a decrypted payload, if present.
pub fn opcode(payload: &[u8]) -> Option<u8> {
    payload.get(OPCODE_OFFSET).copied()
}

/// The bytes strictly between the header region and the trailer.
///
/// Starts with the opcode. Empty when the payload is too short to have a
/// body; never panics.
pub fn command_body(payload: &[u8]) -> &[u8] {
    payload
        .len()
        .checked_sub(TRAILER_LEN)
        .and_then(|end| payload.get(HEADER_LEN..end))
        .unwrap_or(&[])
}

/// Frame `body` (opcode followed by arguments) into a section.
///
/// The body length must fit the one-byte length field.
pub fn encode_section(
    request_id: [u8; REQUEST_ID_SIZE],
    sequence: u8,
    body: &[u8],
) -> Result<Vec<u8>, DecodeError> {
    let body_len = u8::try_from(body.len()).map_err(|_| DecodeError::BodyTooLong(body.len()))?;
    // At most 4 + 2 + 255 bytes
    let content_len = (REQUEST_ID_SIZE + 2 + body.len()) as u16;
    let mut buf = Vec::with_capacity(HEADER_LEN + body.len() + TRAILER_LEN);

    buf.extend_from_slice(SECTION_PREFIX);
    buf.extend_from_slice(&content_len.to_be_bytes());
    buf.extend_from_slice(&request_id);
    buf.push((sequence & SEQUENCE_MASK) << SEQUENCE_SHIFT);
    buf.push(body_len);
    buf.extend_from_slice(body);
    buf.extend_from_slice(SECTION_SUFFIX);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DEACTIVATE_OPCODE, MIN_PAYLOAD_LEN};

    #[test]
    fn test_section_offsets() {
        let payload = encode_section([0xDE, 0xAD, 0xBE, 0xEF], 5, &[DEACTIVATE_OPCODE, 0x01, 0x02]).unwrap();

        assert!(payload.starts_with(b"S0.0="));
        assert!(payload.ends_with(b",G0.0"));
        assert_eq!(&payload[7..11], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(payload[11], 5 << 2);
        assert_eq!(payload[12], 3);
        assert_eq!(opcode(&payload), Some(DEACTIVATE_OPCODE));
        assert_eq!(command_body(&payload), &[DEACTIVATE_OPCODE, 0x01, 0x02]);
    }

    #[test]
    fn test_header_parse() {
        let payload = encode_section([1, 2, 3, 4], 9, &[0x0e]).unwrap();
        let header = CommandHeader::parse(&payload).unwrap();
        assert_eq!(header.sequence, 9);
        assert_eq!(header.request_id, [1, 2, 3, 4]);
    }

    #[test]
    fn test_sequence_wraps_to_four_bits() {
        let payload = encode_section([0; 4], 17, &[0x0e]).unwrap();
        assert_eq!(CommandHeader::parse(&payload).unwrap().sequence, 1);
    }

    #[test]
    fn test_header_rejects_bad_marker() {
        let mut payload = encode_section([0; 4], 1, &[0x0e]).unwrap();
        payload[0] = b'X';
        assert_eq!(CommandHeader::parse(&payload), Err(DecodeError::InvalidMarker));
    }

    #[test]
    fn test_header_rejects_short() {
        assert_eq!(
            CommandHeader::parse(b"S0.0="),
            Err(DecodeError::UnexpectedEof { expected: 13, actual: 5 })
        );
    }

    #[test]
    fn test_body_of_minimum_payload() {
        // 16 bytes: header, opcode, two bytes of a truncated trailer
        let mut payload = encode_section([0; 4], 1, &[0x0e]).unwrap();
        payload.truncate(MIN_PAYLOAD_LEN);
        assert!(command_body(&payload).is_empty());
        assert_eq!(opcode(&payload), Some(0x0e));
    }

    #[test]
    fn test_body_never_panics() {
        for len in 0..HEADER_LEN + TRAILER_LEN + 2 {
            let payload = vec![0u8; len];
            let body = command_body(&payload);
            assert!(body.len() <= len.saturating_sub(HEADER_LEN + TRAILER_LEN));
        }
    }

    #[test]
    fn test_body_length_limit() {
        let max = vec![0x0e; 255];
        let payload = encode_section([0; 4], 1, &max).unwrap();
        assert_eq!(payload[12], 255);
        assert_eq!(&payload[5..7], &[0x01, 0x05]);
        assert_eq!(command_body(&payload), &max[..]);

        assert_eq!(
            encode_section([0; 4], 1, &[0x0e; 256]),
            Err(DecodeError::BodyTooLong(256))
        );
    }
}
