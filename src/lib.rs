//! # Pod Emulator
//!
//! The device side of a pump/pod control protocol. A controller pairs with
//! the device, authenticates, and then drives an encrypted command loop until
//! it deactivates the device.
//!
//! - **Pairing**: five-message X25519 exchange yielding a long-term key
//! - **Authentication**: challenge/response deriving a session key and nonce prefix
//! - **Command loop**: XChaCha20-Poly1305 rounds with duplicate suppression and acks
//! - **Durability**: every key and counter persisted before it is relied on
//!
//! ## Modules
//!
//! - [`core`]: constants, errors and the collaborator traits
//! - [`transport`]: message framing and transports
//! - [`crypto`]: keys, KDF/MAC and the message cipher
//! - [`pairing`]: the pairing exchange
//! - [`auth`]: the authentication handshake
//! - [`command`]: command decoding and responses
//! - [`state`]: session state and its stores
//! - [`device`]: configuration and the session lifecycle
//!
//! ## Example Usage
//!
//! ```no_run
//! use pod_emulator::prelude::*;
//!
//! # async fn demo(link: ChannelTransport) -> Result<(), SessionError> {
//! let config = DeviceConfig::builder().fresh(true).build();
//! let store = MemoryStateStore::new();
//!
//! let mut device = Device::new(link, MessageCipher::new(), store, &config);
//! let final_state = device.run(SessionState::default()).await?;
//! assert!(final_state.is_paired());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod command;
pub mod core;
pub mod crypto;
pub mod device;
pub mod pairing;
pub mod state;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::crypto::{LongTermKey, MessageCipher, NoncePrefix, SessionKey};
    pub use crate::device::{Device, DeviceConfig, DeviceConfigBuilder, Phase, RoundOutcome};
    pub use crate::state::{FileStateStore, MemoryStateStore, SessionState};
    pub use crate::transport::{ChannelTransport, Message, MessageType, StreamTransport};
}

// Re-export commonly used items at crate root
pub use crate::core::{SessionError, StateStore, Transport};
pub use crate::device::{Device, DeviceConfig};
pub use crate::state::SessionState;
