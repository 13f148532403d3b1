//! Authentication handshake.
//!
//! A challenge/response exchange keyed by the long-term key. Each successful
//! run yields a fresh session key and nonce prefix for the command loop.

mod handshake;
mod packet;

pub use handshake::*;
pub use packet::*;
