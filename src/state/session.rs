//! The durable session record.

use serde::{Deserialize, Serialize};

use crate::auth::SessionMaterial;
use crate::core::CryptoError;
use crate::crypto::{LongTermKey, NoncePrefix, SessionKey};

/// Every long-lived key and counter of one device identity.
///
/// Owned by the lifecycle for the whole connection and threaded through
/// each phase; persisted at every checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    /// Set by pairing; its presence means "resume, don't pair".
    pub long_term_key: Option<LongTermKey>,
    /// Authentication counter, reset to 1 by pairing.
    pub auth_sequence: u64,
    /// Set by authentication.
    pub session_key: Option<SessionKey>,
    /// Set alongside `session_key`.
    pub nonce_prefix: Option<NoncePrefix>,
    /// Next unused nonce counter.
    pub nonce_counter: u64,
    /// Transport sequence of the next response.
    pub message_sequence: u8,
    /// Section sequence of the next response.
    pub command_sequence: u8,
}

impl SessionState {
    /// Whether pairing has completed.
    pub fn is_paired(&self) -> bool {
        self.long_term_key.is_some()
    }

    /// Record a new long-term key, restarting the authentication counter.
    pub fn set_long_term_key(&mut self, ltk: LongTermKey) {
        self.long_term_key = Some(ltk);
        self.auth_sequence = 1;
    }

    /// Install the material of a completed authentication and reset the
    /// per-session counters.
    pub fn begin_session(&mut self, material: SessionMaterial) {
        self.session_key = Some(material.session_key);
        self.nonce_prefix = Some(material.nonce_prefix);
        self.auth_sequence = material.auth_sequence;
        self.nonce_counter = 1;
        self.message_sequence = 1;
        self.command_sequence = 1;
    }

    /// Take the current nonce counter and advance it.
    ///
    /// The caller must persist the state before using the returned value.
    pub fn reserve_nonce(&mut self) -> Result<u64, CryptoError> {
        let counter = self.nonce_counter;
        self.nonce_counter = counter.checked_add(1).ok_or(CryptoError::CounterExhaustion)?;
        Ok(counter)
    }

    /// Advance both response sequences after a completed round.
    pub fn advance_sequences(&mut self) {
        self.message_sequence = self.message_sequence.wrapping_add(1);
        self.command_sequence = self.command_sequence.wrapping_add(1);
    }
}
