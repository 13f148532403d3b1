//! Transport layer.
//!
//! The core only depends on the [`Transport`](crate::core::Transport) trait;
//! this module provides the message type and two implementations:
//!
//! - **Message framing**: [`Message`], [`MessageType`] and the header codec
//! - **Stream transport**: [`StreamTransport`] over any tokio byte stream
//! - **In-memory transport**: [`ChannelTransport`] linked pairs
//!
//! Discovery and link setup are outside this crate; whoever owns the link
//! hands a connected stream in.

mod channel;
mod message;
mod stream;

pub use channel::*;
pub use message::*;
pub use stream::*;
