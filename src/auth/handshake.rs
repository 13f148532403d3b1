//! Device side of the authentication handshake.

use tracing::{debug, warn};

use super::packet::{AuthVector, Challenge, ChallengeResponse, Outcome, decode_sequence};
use crate::core::{AUTH_SQN_SIZE, AuthError, IV_SIZE};
use crate::crypto::{LongTermKey, NoncePrefix, SessionKey, random_bytes};

/// What a completed handshake establishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMaterial {
    /// Working key for the command loop.
    pub session_key: SessionKey,
    /// Controller IV followed by device IV.
    pub nonce_prefix: NoncePrefix,
    /// Authentication sequence asserted by the controller.
    pub auth_sequence: u64,
}

struct Accepted {
    identifier: u8,
    vector: AuthVector,
    sequence: [u8; AUTH_SQN_SIZE],
    controller_iv: [u8; IV_SIZE],
    device_iv: Option<[u8; IV_SIZE]>,
}

/// Challenge/response state machine, one per connection.
pub struct AuthHandshake {
    ltk: LongTermKey,
    local_sequence: u64,
    accepted: Option<Accepted>,
    confirmed: bool,
}

impl AuthHandshake {
    /// Start a handshake keyed by `ltk`, with the locally cached sequence.
    pub fn new(ltk: LongTermKey, local_sequence: u64) -> Self {
        Self {
            ltk,
            local_sequence,
            accepted: None,
            confirmed: false,
        }
    }

    /// Verify the controller's challenge.
    ///
    /// The controller's sequence number is authoritative; a value behind the
    /// local cache is accepted but logged.
    pub fn parse_challenge(&mut self, payload: &[u8]) -> Result<(), AuthError> {
        if self.accepted.is_some() {
            return Err(AuthError::OutOfOrder("challenge"));
        }

        let challenge = Challenge::decode(payload)?;
        let vector = AuthVector::derive(&self.ltk, &challenge.rand)?;
        let sequence = vector.mask_sequence(&challenge.masked_sequence);

        if !vector.verify_challenge_mac(&challenge.rand, &sequence, &challenge.mac)? {
            return Err(AuthError::ChallengeMacMismatch);
        }

        let asserted = decode_sequence(&sequence);
        if asserted < self.local_sequence {
            warn!(
                local = self.local_sequence,
                asserted, "controller authentication sequence is behind local state"
            );
        }
        debug!(identifier = challenge.identifier, sequence = asserted, "challenge accepted");

        self.accepted = Some(Accepted {
            identifier: challenge.identifier,
            vector,
            sequence,
            controller_iv: challenge.controller_iv,
            device_iv: None,
        });
        Ok(())
    }

    /// Produce the response proving possession of the long-term key.
    pub fn generate_challenge_response(&mut self) -> Result<Vec<u8>, AuthError> {
        let accepted = self
            .accepted
            .as_mut()
            .filter(|accepted| accepted.device_iv.is_none())
            .ok_or(AuthError::OutOfOrder("challenge response"))?;

        let device_iv = random_bytes::<IV_SIZE>();
        accepted.device_iv = Some(device_iv);

        Ok(ChallengeResponse {
            identifier: accepted.identifier,
            res: *accepted.vector.res(),
            device_iv,
        }
        .encode())
    }

    /// Verify the controller's success confirmation.
    pub fn parse_success(&mut self, payload: &[u8]) -> Result<(), AuthError> {
        let accepted = self
            .accepted
            .as_ref()
            .filter(|accepted| accepted.device_iv.is_some() && !self.confirmed)
            .ok_or(AuthError::OutOfOrder("success"))?;

        let (identifier, confirmation) = match Outcome::decode(payload)? {
            Outcome::Failure { .. } => return Err(AuthError::Rejected),
            Outcome::Success {
                identifier,
                confirmation,
            } => (identifier, confirmation),
        };

        if identifier != accepted.identifier {
            return Err(AuthError::IdentifierMismatch {
                expected: accepted.identifier,
                actual: identifier,
            });
        }
        if !accepted
            .vector
            .verify_success_confirmation(&accepted.sequence, &confirmation)?
        {
            return Err(AuthError::ConfirmationMismatch);
        }

        self.confirmed = true;
        Ok(())
    }

    /// Session key, nonce prefix and adopted sequence of a completed exchange.
    pub fn session_material(&self) -> Result<SessionMaterial, AuthError> {
        let accepted = self
            .accepted
            .as_ref()
            .filter(|_| self.confirmed)
            .ok_or(AuthError::OutOfOrder("session material"))?;
        let device_iv = accepted
            .device_iv
            .ok_or(AuthError::OutOfOrder("session material"))?;

        Ok(SessionMaterial {
            session_key: accepted.vector.session_key(),
            nonce_prefix: NoncePrefix::from_ivs(&accepted.controller_iv, &device_iv),
            auth_sequence: decode_sequence(&accepted.sequence),
        })
    }
}
