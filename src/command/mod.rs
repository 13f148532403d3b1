//! Command decoding and responses.
//!
//! A decrypted request is a section (see [`layout`]) whose opcode selects a
//! decoder from the [`CommandRegistry`]. Every [`Command`] yields exactly one
//! [`Response`], which [`marshal`] turns back into a transport message.

pub mod layout;
mod registry;
mod response;

pub use layout::{CommandHeader, command_body, encode_section, opcode};
pub use registry::*;
pub use response::*;
