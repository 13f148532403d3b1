//! Controller simulator shared by the integration tests.

#![allow(dead_code)]

use pod_emulator::auth::{AuthVector, Challenge, ChallengeResponse, Outcome, encode_sequence};
use pod_emulator::command::encode_section;
use pod_emulator::core::{Cipher, PAIRING_NONCE_SIZE, PUBLIC_KEY_SIZE, Transport};
use pod_emulator::crypto::{DeviceKeypair, LongTermKey, MessageCipher, NoncePrefix, SessionKey, random_bytes};
use pod_emulator::pairing::{FieldReader, FieldWriter, PairingKeys, SP0GP0, SP1, SP2, SPS1, SPS2};
use pod_emulator::transport::{Message, MessageType};

pub const CONTROLLER_ADDRESS: u32 = 0x1700_0001;
pub const POD_ADDRESS: u32 = 0xFFFF_FFFE;

/// What a controller does wrong, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    WrongConfirmation,
    ForgedChallenge,
    RejectResponse,
}

pub struct Controller<T> {
    link: T,
    sequence: u8,
    fault: Fault,
    ltk: Option<LongTermKey>,
    session: Option<(SessionKey, NoncePrefix)>,
    nonce_counter: u64,
}

impl<T: Transport> Controller<T> {
    pub fn new(link: T) -> Self {
        Self {
            link,
            sequence: 0,
            fault: Fault::None,
            ltk: None,
            session: None,
            nonce_counter: 0,
        }
    }

    pub fn with_ltk(mut self, ltk: LongTermKey) -> Self {
        self.ltk = Some(ltk);
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    pub fn ltk(&self) -> Option<&LongTermKey> {
        self.ltk.as_ref()
    }

    pub fn nonce_counter(&self) -> u64 {
        self.nonce_counter
    }

    fn next_sequence(&mut self) -> u8 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    async fn send(&mut self, message_type: MessageType, payload: Vec<u8>) {
        let sequence = self.next_sequence();
        let message = Message::new(message_type, CONTROLLER_ADDRESS, POD_ADDRESS, sequence, payload);
        self.link.send_message(message).await.unwrap();
    }

    async fn receive(&mut self, message_type: MessageType) -> Message {
        let message = self.link.receive_message().await.unwrap();
        assert_eq!(message.message_type, message_type);
        assert_eq!(message.destination, CONTROLLER_ADDRESS);
        message
    }

    /// Run the pairing exchange. Returns early after a deliberate fault.
    pub async fn pair(&mut self) {
        let keypair = DeviceKeypair::generate();
        let nonce = random_bytes::<PAIRING_NONCE_SIZE>();

        let link = FieldWriter::new()
            .field(SP1, &[0x17, 0x00, 0x00, 0x01])
            .field(SP2, &[0x00, 0x01])
            .finish()
            .unwrap();
        self.send(MessageType::Pairing, link).await;

        let mut sps1 = keypair.public_key().to_vec();
        sps1.extend_from_slice(&nonce);
        self.send(MessageType::Pairing, FieldWriter::new().field(SPS1, &sps1).finish().unwrap())
            .await;

        let reply = self.receive(MessageType::Pairing).await;
        let mut reader = FieldReader::new(&reply.payload);
        let value = reader
            .expect_array::<{ PUBLIC_KEY_SIZE + PAIRING_NONCE_SIZE }>(SPS1)
            .unwrap();
        reader.finish().unwrap();
        let device_public: [u8; PUBLIC_KEY_SIZE] = value[..PUBLIC_KEY_SIZE].try_into().unwrap();
        let device_nonce: [u8; PAIRING_NONCE_SIZE] = value[PUBLIC_KEY_SIZE..].try_into().unwrap();

        let shared = keypair.diffie_hellman(&device_public).unwrap();
        let keys = PairingKeys::derive(&shared, &nonce, &device_nonce).unwrap();

        let mut confirmation = keys
            .controller_confirmation(keypair.public_key(), &device_public)
            .unwrap();
        if self.fault == Fault::WrongConfirmation {
            confirmation[0] ^= 0xFF;
        }
        self.send(MessageType::Pairing, FieldWriter::new().field(SPS2, &confirmation).finish().unwrap())
            .await;
        if self.fault == Fault::WrongConfirmation {
            return;
        }

        let reply = self.receive(MessageType::Pairing).await;
        let expected = keys
            .device_confirmation(&device_public, keypair.public_key())
            .unwrap();
        assert_eq!(reply.payload, FieldWriter::new().field(SPS2, &expected).finish().unwrap());

        self.send(MessageType::Pairing, FieldWriter::new().field(SP0GP0, &[]).finish().unwrap())
            .await;
        let reply = self.receive(MessageType::Pairing).await;
        assert_eq!(reply.payload, b"P0=\x00\x01\xA5");

        self.ltk = Some(keys.ltk().clone());
    }

    /// Run the authentication handshake asserting `auth_sequence`.
    pub async fn authenticate(&mut self, auth_sequence: u64) {
        let ltk = self.ltk.clone().expect("controller has no LTK");
        let rand = random_bytes::<16>();
        let controller_iv = random_bytes::<4>();
        let vector = AuthVector::derive(&ltk, &rand).unwrap();

        let mut challenge = Challenge::build(&vector, 0x42, rand, auth_sequence, controller_iv)
            .unwrap()
            .encode();
        if self.fault == Fault::ForgedChallenge {
            challenge[30] ^= 0x01;
        }
        self.send(MessageType::SessionEstablishment, challenge).await;
        if self.fault == Fault::ForgedChallenge {
            return;
        }

        let reply = self.receive(MessageType::SessionEstablishment).await;
        let response = ChallengeResponse::decode(&reply.payload).unwrap();
        assert_eq!(response.identifier, 0x42);
        assert_eq!(&response.res, vector.res());

        let outcome = if self.fault == Fault::RejectResponse {
            Outcome::Failure { identifier: 0x42 }
        } else {
            Outcome::Success {
                identifier: 0x42,
                confirmation: vector
                    .success_confirmation(&encode_sequence(auth_sequence))
                    .unwrap(),
            }
        };
        self.send(MessageType::SessionEstablishment, outcome.encode()).await;

        self.session = Some((
            vector.session_key(),
            NoncePrefix::from_ivs(&controller_iv, &response.device_iv),
        ));
        self.nonce_counter = 1;
    }

    fn reserve_nonce(&mut self) -> u64 {
        let counter = self.nonce_counter;
        self.nonce_counter += 1;
        counter
    }

    /// Encrypt and send a raw request payload with an explicit transport sequence.
    pub async fn send_request(&mut self, sequence: u8, payload: Vec<u8>) -> Message {
        self.sequence = sequence;
        let (key, prefix) = self.session.clone().expect("not authenticated");
        let counter = self.reserve_nonce();
        let message = Message::new(MessageType::Encrypted, CONTROLLER_ADDRESS, POD_ADDRESS, sequence, payload);
        let sealed = MessageCipher::new()
            .encrypt(&key, &prefix, counter, message)
            .unwrap();
        self.link.send_message(sealed.clone()).await.unwrap();
        sealed
    }

    /// Resend an already encrypted message verbatim.
    pub async fn resend(&mut self, message: Message) {
        self.link.send_message(message).await.unwrap();
    }

    /// Receive and decrypt a response.
    pub async fn receive_response(&mut self) -> (Message, Vec<u8>) {
        let (key, prefix) = self.session.clone().expect("not authenticated");
        let message = self.receive(MessageType::Encrypted).await;
        let counter = self.reserve_nonce();
        let plaintext = MessageCipher::new()
            .decrypt(&key, &prefix, counter, &message)
            .unwrap();
        (message, plaintext)
    }

    /// Send an acknowledgment carrying `payload` (empty for a well-formed ack).
    pub async fn send_ack(&mut self, payload: Vec<u8>) {
        let sequence = self.next_sequence();
        self.send_request(sequence, payload).await;
    }

    /// One full round: request, response, empty ack. Returns the response.
    pub async fn round(&mut self, sequence: u8, command_sequence: u8, body: &[u8]) -> (Message, Vec<u8>) {
        let payload = encode_section([0xC0, 0xFF, 0xEE, sequence], command_sequence, body).unwrap();
        self.send_request(sequence, payload).await;
        let response = self.receive_response().await;
        self.send_ack(Vec::new()).await;
        response
    }
}
