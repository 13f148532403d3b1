//! Pairing exchange.
//!
//! Runs once per device identity and yields the long-term key that every
//! later authentication handshake is keyed with.

mod exchange;
mod fields;

pub use exchange::*;
pub use fields::*;
