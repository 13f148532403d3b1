//! Command variants and the opcode registry.

use std::collections::HashMap;
use std::fmt;

use super::layout::{CommandHeader, command_body};
use super::response::{Progress, Response};
use crate::core::{DEACTIVATE_OPCODE, DecodeError, OPCODE_OFFSET, REQUEST_ID_SIZE};

/// Decodes the arguments following an opcode.
pub type Decoder = fn(&[u8]) -> Result<CommandKind, DecodeError>;

/// The closed set of commands the device understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Report current status.
    GetStatus,
    /// Configure the device at `address`.
    SetupPod {
        /// Address being configured.
        address: u32,
    },
    /// Assign the device's address.
    AssignAddress {
        /// New address.
        address: u32,
    },
    /// Silence active alerts.
    SilenceAlerts,
    /// Program alert thresholds.
    ProgramAlerts,
    /// Program a delivery schedule.
    ProgramInsulin,
    /// Configure beeps.
    ConfigureBeeps,
    /// Cancel active delivery.
    CancelDelivery,
    /// Permanently deactivate.
    Deactivate,
}

impl CommandKind {
    /// Opcode identifying this command.
    pub fn opcode(&self) -> u8 {
        match self {
            Self::GetStatus => 0x0e,
            Self::SetupPod { .. } => 0x03,
            Self::AssignAddress { .. } => 0x07,
            Self::SilenceAlerts => 0x11,
            Self::ProgramAlerts => 0x19,
            Self::ProgramInsulin => 0x1a,
            Self::ConfigureBeeps => 0x1e,
            Self::CancelDelivery => 0x1f,
            Self::Deactivate => DEACTIVATE_OPCODE,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GetStatus => "GetStatus",
            Self::SetupPod { .. } => "SetupPod",
            Self::AssignAddress { .. } => "AssignAddress",
            Self::SilenceAlerts => "SilenceAlerts",
            Self::ProgramAlerts => "ProgramAlerts",
            Self::ProgramInsulin => "ProgramInsulin",
            Self::ConfigureBeeps => "ConfigureBeeps",
            Self::CancelDelivery => "CancelDelivery",
            Self::Deactivate => "Deactivate",
        };
        write!(f, "{name}({:#04x})", self.opcode())
    }
}

/// A decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    header: CommandHeader,
    kind: CommandKind,
    arguments: Vec<u8>,
}

impl Command {
    /// Create a command with a default header.
    pub fn new(kind: CommandKind, arguments: Vec<u8>) -> Self {
        Self {
            header: CommandHeader::default(),
            kind,
            arguments,
        }
    }

    /// Sequence number and request identifier.
    pub fn header(&self) -> (u8, [u8; REQUEST_ID_SIZE]) {
        (self.header.sequence, self.header.request_id)
    }

    /// Replace the sequence number and request identifier.
    pub fn set_header(&mut self, sequence: u8, request_id: [u8; REQUEST_ID_SIZE]) {
        self.header = CommandHeader {
            sequence,
            request_id,
        };
    }

    /// Which command this is.
    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    /// Raw arguments following the opcode.
    pub fn arguments(&self) -> &[u8] {
        &self.arguments
    }

    /// The reply to this command.
    pub fn respond(&self) -> Response {
        match self.kind {
            CommandKind::AssignAddress { address } | CommandKind::SetupPod { address } => {
                Response::Version {
                    progress: Progress::PairingCompleted,
                    address,
                }
            }
            CommandKind::Deactivate => Response::GeneralStatus {
                progress: Progress::Deactivated,
            },
            _ => Response::GeneralStatus {
                progress: Progress::Running,
            },
        }
    }
}

fn unit(kind: CommandKind) -> Result<CommandKind, DecodeError> {
    Ok(kind)
}

fn address(args: &[u8]) -> Result<u32, DecodeError> {
    args.get(..4)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or(DecodeError::UnexpectedEof {
            expected: 4,
            actual: args.len(),
        })
}

/// Maps opcodes to decoders.
///
/// New commands are added with [`register`](Self::register); the command
/// loop only ever calls [`decode`](Self::decode).
#[derive(Clone)]
pub struct CommandRegistry {
    decoders: HashMap<u8, Decoder>,
}

impl CommandRegistry {
    /// A registry with no commands.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// A registry with every built-in command.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(0x0e, |_| unit(CommandKind::GetStatus));
        registry.register(0x03, |args| Ok(CommandKind::SetupPod { address: address(args)? }));
        registry.register(0x07, |args| Ok(CommandKind::AssignAddress { address: address(args)? }));
        registry.register(0x11, |_| unit(CommandKind::SilenceAlerts));
        registry.register(0x19, |_| unit(CommandKind::ProgramAlerts));
        registry.register(0x1a, |_| unit(CommandKind::ProgramInsulin));
        registry.register(0x1e, |_| unit(CommandKind::ConfigureBeeps));
        registry.register(0x1f, |_| unit(CommandKind::CancelDelivery));
        registry.register(DEACTIVATE_OPCODE, |_| unit(CommandKind::Deactivate));
        registry
    }

    /// Register (or replace) the decoder for `opcode`.
    pub fn register(&mut self, opcode: u8, decoder: Decoder) {
        self.decoders.insert(opcode, decoder);
    }

    /// Whether `opcode` has a decoder.
    pub fn contains(&self, opcode: u8) -> bool {
        self.decoders.contains_key(&opcode)
    }

    /// Decode a decrypted payload into a command with its header applied.
    pub fn decode(&self, payload: &[u8]) -> Result<Command, DecodeError> {
        let header = CommandHeader::parse(payload)?;
        let opcode = payload
            .get(OPCODE_OFFSET)
            .copied()
            .ok_or(DecodeError::UnexpectedEof {
                expected: OPCODE_OFFSET + 1,
                actual: payload.len(),
            })?;
        let decoder = self
            .decoders
            .get(&opcode)
            .ok_or(DecodeError::UnknownOpcode(opcode))?;

        let arguments = command_body(payload).get(1..).unwrap_or_default();
        let mut command = Command::new(decoder(arguments)?, arguments.to_vec());
        command.set_header(header.sequence, header.request_id);
        Ok(command)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut opcodes: Vec<_> = self.decoders.keys().copied().collect();
        opcodes.sort_unstable();
        f.debug_struct("CommandRegistry")
            .field("opcodes", &opcodes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::encode_section;

    fn payload(sequence: u8, body: &[u8]) -> Vec<u8> {
        encode_section([0xA1, 0xA2, 0xA3, 0xA4], sequence, body).unwrap()
    }

    #[test]
    fn test_decode_sets_header() {
        let registry = CommandRegistry::new();
        let command = registry.decode(&payload(6, &[0x0e, 0x00])).unwrap();

        assert_eq!(command.kind(), &CommandKind::GetStatus);
        assert_eq!(command.header(), (6, [0xA1, 0xA2, 0xA3, 0xA4]));
        assert_eq!(command.arguments(), &[0x00]);
    }

    #[test]
    fn test_every_builtin_opcode_decodes() {
        let registry = CommandRegistry::new();
        for opcode in [0x0e, 0x03, 0x07, 0x11, 0x19, 0x1a, 0x1e, 0x1f, 0x1c] {
            let command = registry.decode(&payload(1, &[opcode, 0, 0, 0, 1])).unwrap();
            assert_eq!(command.kind().opcode(), opcode);
        }
    }

    #[test]
    fn test_unknown_opcode() {
        let registry = CommandRegistry::new();
        assert_eq!(
            registry.decode(&payload(1, &[0x42])),
            Err(DecodeError::UnknownOpcode(0x42))
        );
    }

    #[test]
    fn test_assign_address_requires_address() {
        let registry = CommandRegistry::new();
        assert!(matches!(
            registry.decode(&payload(1, &[0x07, 0x01])),
            Err(DecodeError::UnexpectedEof { expected: 4, actual: 1 })
        ));

        let command = registry
            .decode(&payload(1, &[0x07, 0x1F, 0x00, 0x00, 0x01]))
            .unwrap();
        assert_eq!(
            command.respond(),
            Response::Version {
                progress: Progress::PairingCompleted,
                address: 0x1F00_0001,
            }
        );
    }

    #[test]
    fn test_responses() {
        let status = Command::new(CommandKind::GetStatus, vec![]);
        assert_eq!(status.respond().progress(), Progress::Running);

        let deactivate = Command::new(CommandKind::Deactivate, vec![]);
        assert_eq!(deactivate.respond().progress(), Progress::Deactivated);
    }

    #[test]
    fn test_set_header() {
        let mut command = Command::new(CommandKind::SilenceAlerts, vec![]);
        command.set_header(9, [1, 1, 1, 1]);
        assert_eq!(command.header(), (9, [1, 1, 1, 1]));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = CommandRegistry::empty();
        assert!(!registry.contains(0x0e));
        registry.register(0x0e, |_| Ok(CommandKind::CancelDelivery));
        let command = registry.decode(&payload(1, &[0x0e])).unwrap();
        assert_eq!(command.kind(), &CommandKind::CancelDelivery);
    }
}
