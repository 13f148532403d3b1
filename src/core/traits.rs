//! Collaborator boundaries of the session lifecycle.
//!
//! The lifecycle only ever talks to the outside world through these three
//! traits: a [`Transport`] that moves framed messages, a [`Cipher`] that
//! seals and opens them, and a [`StateStore`] that makes [`SessionState`]
//! durable.

use std::future::Future;

use super::error::{CryptoError, StateError, TransportError};
use crate::crypto::{NoncePrefix, SessionKey};
use crate::state::SessionState;
use crate::transport::Message;

/// Delivers and accepts framed messages.
///
/// Receiving is the lifecycle's only suspension point besides the final
/// grace delay.
pub trait Transport: Send {
    /// Wait for the next message from the controller.
    fn receive_message(&mut self) -> impl Future<Output = Result<Message, TransportError>> + Send;

    /// Hand a message to the link.
    fn send_message(
        &mut self,
        message: Message,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Authenticated encryption of whole messages.
///
/// The nonce is built from `prefix` and `counter`; callers guarantee a
/// counter is never presented twice for the same key and prefix.
pub trait Cipher {
    /// Encrypt the payload of `message`, binding its header as associated data.
    fn encrypt(
        &self,
        key: &SessionKey,
        prefix: &NoncePrefix,
        counter: u64,
        message: Message,
    ) -> Result<Message, CryptoError>;

    /// Open the payload of `message`. Fails with
    /// [`CryptoError::DecryptionFailed`] when authentication fails.
    fn decrypt(
        &self,
        key: &SessionKey,
        prefix: &NoncePrefix,
        counter: u64,
        message: &Message,
    ) -> Result<Vec<u8>, CryptoError>;
}

/// Durable storage for one device identity's [`SessionState`].
pub trait StateStore {
    /// Load the stored state, or `None` if nothing has been stored yet.
    fn load(&self) -> Result<Option<SessionState>, StateError>;

    /// Durably replace the stored state.
    fn save(&mut self, state: &SessionState) -> Result<(), StateError>;
}
