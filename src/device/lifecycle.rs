//! The session lifecycle.
//!
//! ```text
//! Uninitialized ──(no LTK)──> Pairing ──> Authenticating ──> Active ⟲ ──(deactivate)──> Terminated
//!        └────────(LTK stored)─────────────────┘
//! ```
//!
//! Every fallible step returns a [`SessionError`]; nothing in here ends the
//! process. Nonce counters are reserved and persisted before they are used,
//! so a crash can skip a counter but never repeat one.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::DeviceConfig;
use crate::auth::AuthHandshake;
use crate::command::{CommandRegistry, ResponseMetadata, command_body, marshal, opcode};
use crate::core::{
    Cipher, DEACTIVATE_OPCODE, MIN_PAYLOAD_LEN, SessionError, StateStore, Transport,
};
use crate::crypto::{NoncePrefix, SessionKey};
use crate::pairing::PairingExchange;
use crate::state::SessionState;
use crate::transport::{Message, MessageType};

/// Where the lifecycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has happened yet.
    Uninitialized,
    /// Running the pairing exchange.
    Pairing,
    /// Running the authentication handshake.
    Authenticating,
    /// Servicing command rounds.
    Active,
    /// Deactivated; the session is over.
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of one command round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Round completed; keep going.
    Completed,
    /// Retransmission of the previous request; nothing was done.
    Duplicate,
    /// Deactivation acknowledged; the loop must end.
    Deactivated,
}

/// The device side of one connection.
pub struct Device<T, C, S> {
    transport: T,
    cipher: C,
    store: S,
    registry: CommandRegistry,
    address: u32,
    grace: Duration,
    phase: Phase,
    handshake_sequence: u8,
    last_sequence: Option<u8>,
}

impl<T, C, S> Device<T, C, S>
where
    T: Transport,
    C: Cipher,
    S: StateStore,
{
    /// Create a device speaking over `transport`.
    pub fn new(transport: T, cipher: C, store: S, config: &DeviceConfig) -> Self {
        Self {
            transport,
            cipher,
            store,
            registry: CommandRegistry::new(),
            address: config.address,
            grace: config.deactivation_grace,
            phase: Phase::Uninitialized,
            handshake_sequence: 0,
            last_sequence: None,
        }
    }

    /// Replace the command registry.
    pub fn with_registry(mut self, registry: CommandRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The state store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give back the transport, e.g. to close it.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run the whole lifecycle: pair if needed, authenticate, then service
    /// commands until deactivated.
    ///
    /// Returns the final state on deactivation.
    pub async fn run(&mut self, mut state: SessionState) -> Result<SessionState, SessionError> {
        if state.is_paired() {
            info!("long-term key present, skipping pairing");
        } else {
            self.pair(&mut state).await?;
        }
        self.authenticate(&mut state).await?;
        self.command_loop(&mut state).await?;
        Ok(state)
    }

    /// Run the pairing exchange and persist the long-term key.
    pub async fn pair(&mut self, state: &mut SessionState) -> Result<(), SessionError> {
        self.enter(Phase::Pairing);
        let mut exchange = PairingExchange::new();

        let link = self.receive(MessageType::Pairing).await?;
        exchange.parse_sp1_sp2(&link.payload)?;

        let key = self.receive(MessageType::Pairing).await?;
        exchange.parse_sps1(&key.payload)?;
        let reply = exchange.generate_sps1()?;
        self.reply(&key, MessageType::Pairing, reply).await?;

        let confirmation = self.receive(MessageType::Pairing).await?;
        exchange.parse_sps2(&confirmation.payload)?;
        let reply = exchange.generate_sps2()?;
        self.reply(&confirmation, MessageType::Pairing, reply).await?;

        let done = self.receive(MessageType::Pairing).await?;
        exchange.parse_sp0gp0(&done.payload)?;
        let reply = exchange.generate_p0()?;
        self.reply(&done, MessageType::Pairing, reply).await?;

        let ltk = exchange.ltk()?;
        info!(ltk = %ltk.fingerprint(), "pairing complete");
        state.set_long_term_key(ltk);
        self.store.save(state)?;
        Ok(())
    }

    /// Run the authentication handshake and install the session material.
    pub async fn authenticate(&mut self, state: &mut SessionState) -> Result<(), SessionError> {
        self.enter(Phase::Authenticating);
        let ltk = state.long_term_key.clone().ok_or(SessionError::NotPaired)?;
        let mut handshake = AuthHandshake::new(ltk, state.auth_sequence);

        let challenge = self.receive(MessageType::SessionEstablishment).await?;
        handshake.parse_challenge(&challenge.payload)?;
        let reply = handshake.generate_challenge_response()?;
        self.reply(&challenge, MessageType::SessionEstablishment, reply).await?;

        let success = self.receive(MessageType::SessionEstablishment).await?;
        handshake.parse_success(&success.payload)?;

        let material = handshake.session_material()?;
        info!(
            session_key = %material.session_key.fingerprint(),
            nonce_prefix = %hex::encode(material.nonce_prefix.as_bytes()),
            auth_sequence = material.auth_sequence,
            "authenticated"
        );
        state.begin_session(material);
        self.store.save(state)?;
        Ok(())
    }

    /// Service rounds until a deactivation completes.
    pub async fn command_loop(&mut self, state: &mut SessionState) -> Result<(), SessionError> {
        self.enter(Phase::Active);
        self.last_sequence = None;

        while self.process_round(state).await? != RoundOutcome::Deactivated {}

        info!(grace = ?self.grace, "deactivated");
        tokio::time::sleep(self.grace).await;
        self.enter(Phase::Terminated);
        Ok(())
    }

    /// Receive one request and, unless it is a retransmission, answer it and
    /// consume the controller's acknowledgment.
    pub async fn process_round(&mut self, state: &mut SessionState) -> Result<RoundOutcome, SessionError> {
        let request = self.transport.receive_message().await?;
        trace!(?request, "request received");

        if self.last_sequence == Some(request.sequence) {
            warn!(sequence = request.sequence, "duplicate request discarded");
            return Ok(RoundOutcome::Duplicate);
        }
        self.last_sequence = Some(request.sequence);
        expect_type(&request, MessageType::Encrypted)?;

        let (key, prefix) = session_material(state)?;

        let counter = self.reserve_nonce(state)?;
        let plaintext = self.cipher.decrypt(&key, &prefix, counter, &request)?;
        debug!(counter, sequence = request.sequence, payload = %hex::encode(&plaintext), "request decrypted");

        if plaintext.len() < MIN_PAYLOAD_LEN {
            return Err(SessionError::PayloadTooShort { len: plaintext.len() });
        }
        let command = self.registry.decode(&plaintext)?;
        let (command_sequence, request_id) = command.header();
        state.command_sequence = command_sequence;

        let deactivate = opcode(&plaintext) == Some(DEACTIVATE_OPCODE);
        info!(
            command = %command.kind(),
            sequence = command_sequence,
            body = %hex::encode(command_body(&plaintext)),
            "command received"
        );

        let response = command.respond();
        state.advance_sequences();
        self.store.save(state)?;

        let metadata = ResponseMetadata::for_request(
            &request,
            request_id,
            state.command_sequence,
            state.message_sequence,
        );
        let reply = marshal(&response, &metadata)?;
        let counter = self.reserve_nonce(state)?;
        let sealed = self.cipher.encrypt(&key, &prefix, counter, reply)?;
        debug!(counter, sequence = sealed.sequence, ack = sealed.ack_sequence, "sending response");
        self.transport.send_message(sealed).await?;

        let ack = self.transport.receive_message().await?;
        expect_type(&ack, MessageType::Encrypted)?;
        let counter = self.reserve_nonce(state)?;
        let ack_payload = self.cipher.decrypt(&key, &prefix, counter, &ack)?;
        if !ack_payload.is_empty() {
            return Err(SessionError::NonEmptyAck {
                len: ack_payload.len(),
            });
        }
        debug!(counter, "acknowledgment consumed");

        Ok(if deactivate {
            RoundOutcome::Deactivated
        } else {
            RoundOutcome::Completed
        })
    }

    fn enter(&mut self, phase: Phase) {
        info!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    /// Take a nonce counter and persist its successor before handing it out.
    fn reserve_nonce(&mut self, state: &mut SessionState) -> Result<u64, SessionError> {
        let counter = state.reserve_nonce()?;
        self.store.save(state)?;
        Ok(counter)
    }

    async fn receive(&mut self, expected: MessageType) -> Result<Message, SessionError> {
        let message = self.transport.receive_message().await?;
        trace!(?message, "handshake message received");
        expect_type(&message, expected)?;
        Ok(message)
    }

    async fn reply(
        &mut self,
        request: &Message,
        message_type: MessageType,
        payload: Vec<u8>,
    ) -> Result<(), SessionError> {
        let message = Message::new(
            message_type,
            self.address,
            request.source,
            self.handshake_sequence,
            payload,
        )
        .with_ack(request.sequence.wrapping_add(1));
        self.handshake_sequence = self.handshake_sequence.wrapping_add(1);

        trace!(?message, "handshake message sent");
        self.transport.send_message(message).await?;
        Ok(())
    }
}

fn expect_type(message: &Message, expected: MessageType) -> Result<(), SessionError> {
    if message.message_type == expected {
        Ok(())
    } else {
        Err(SessionError::UnexpectedMessageType {
            expected,
            actual: message.message_type,
        })
    }
}

fn session_material(state: &SessionState) -> Result<(SessionKey, NoncePrefix), SessionError> {
    match (&state.session_key, state.nonce_prefix) {
        (Some(key), Some(prefix)) => Ok((key.clone(), prefix)),
        _ => Err(SessionError::MissingSessionMaterial),
    }
}
