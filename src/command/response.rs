//! Responses and their marshaling into transport messages.

use super::layout::encode_section;
use crate::core::{DecodeError, REQUEST_ID_SIZE};
use crate::transport::{Message, MessageType};

/// Response opcode for [`Response::Version`].
pub const VERSION_RESPONSE_OPCODE: u8 = 0x01;
/// Response opcode for [`Response::GeneralStatus`].
pub const GENERAL_STATUS_RESPONSE_OPCODE: u8 = 0x1d;

/// Firmware version reported by [`Response::Version`].
pub const FIRMWARE_VERSION: [u8; 3] = [4, 10, 0];

/// Lifecycle progress reported to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Progress {
    /// Address assigned, not yet set up.
    PairingCompleted = 0x03,
    /// Delivering normally.
    Running = 0x08,
    /// Deactivated; no further delivery.
    Deactivated = 0x0f,
}

/// Reply to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Firmware and address information.
    Version {
        /// Progress after the command.
        progress: Progress,
        /// Address the device answers on.
        address: u32,
    },
    /// Generic acknowledgment with the current progress.
    GeneralStatus {
        /// Progress after the command.
        progress: Progress,
    },
}

impl Response {
    /// Opcode of this response.
    pub fn opcode(&self) -> u8 {
        match self {
            Self::Version { .. } => VERSION_RESPONSE_OPCODE,
            Self::GeneralStatus { .. } => GENERAL_STATUS_RESPONSE_OPCODE,
        }
    }

    /// Progress carried by this response.
    pub fn progress(&self) -> Progress {
        match self {
            Self::Version { progress, .. } | Self::GeneralStatus { progress } => *progress,
        }
    }

    /// Opcode followed by the response fields.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![self.opcode()];
        match self {
            Self::Version { progress, address } => {
                buf.extend_from_slice(&FIRMWARE_VERSION);
                buf.push(*progress as u8);
                buf.extend_from_slice(&address.to_be_bytes());
            }
            Self::GeneralStatus { progress } => {
                buf.push(*progress as u8);
                buf.extend_from_slice(&[0u8; 8]);
            }
        }
        buf
    }
}

/// Addressing and sequencing of a response message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// The request's source.
    pub destination: u32,
    /// The request's destination.
    pub source: u32,
    /// Sequence written into the section header.
    pub command_sequence: u8,
    /// Transport sequence of the response message.
    pub message_sequence: u8,
    /// Identifier of the request being answered.
    pub request_id: [u8; REQUEST_ID_SIZE],
    /// Transport sequence being acknowledged.
    pub ack_sequence: u8,
}

impl ResponseMetadata {
    /// Metadata answering `request`.
    pub fn for_request(
        request: &Message,
        request_id: [u8; REQUEST_ID_SIZE],
        command_sequence: u8,
        message_sequence: u8,
    ) -> Self {
        Self {
            destination: request.source,
            source: request.destination,
            command_sequence,
            message_sequence,
            request_id,
            ack_sequence: request.sequence.wrapping_add(1),
        }
    }
}

/// Build the plaintext response message.
pub fn marshal(response: &Response, metadata: &ResponseMetadata) -> Result<Message, DecodeError> {
    let payload = encode_section(metadata.request_id, metadata.command_sequence, &response.encode())?;
    Ok(Message::new(
        MessageType::Encrypted,
        metadata.source,
        metadata.destination,
        metadata.message_sequence,
        payload,
    )
    .with_ack(metadata.ack_sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandHeader, command_body};

    #[test]
    fn test_metadata_swaps_addresses() {
        let request = Message::new(MessageType::Encrypted, 0x1111, 0x2222, 255, vec![]);
        let metadata = ResponseMetadata::for_request(&request, [1, 2, 3, 4], 3, 4);

        assert_eq!(metadata.destination, 0x1111);
        assert_eq!(metadata.source, 0x2222);
        assert_eq!(metadata.ack_sequence, 0);
    }

    #[test]
    fn test_marshal() {
        let request = Message::new(MessageType::Encrypted, 0x1111, 0x2222, 6, vec![]);
        let metadata = ResponseMetadata::for_request(&request, [9, 8, 7, 6], 3, 4);
        let response = Response::GeneralStatus {
            progress: Progress::Deactivated,
        };

        let message = marshal(&response, &metadata).unwrap();
        assert_eq!(message.message_type, MessageType::Encrypted);
        assert_eq!(message.sequence, 4);
        assert!(message.ack);
        assert_eq!(message.ack_sequence, 7);

        let header = CommandHeader::parse(&message.payload).unwrap();
        assert_eq!(header.sequence, 3);
        assert_eq!(header.request_id, [9, 8, 7, 6]);

        let body = command_body(&message.payload);
        assert_eq!(body[0], GENERAL_STATUS_RESPONSE_OPCODE);
        assert_eq!(body[1], Progress::Deactivated as u8);
    }

    #[test]
    fn test_version_layout() {
        let response = Response::Version {
            progress: Progress::PairingCompleted,
            address: 0xFFFF_FFFE,
        };
        assert_eq!(
            response.encode(),
            vec![0x01, 4, 10, 0, 0x03, 0xFF, 0xFF, 0xFF, 0xFE]
        );
    }
}
