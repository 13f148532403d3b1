//! Device side of the five-step pairing exchange.
//!
//! ```text
//! controller                          device
//!   SP1= id, SP2= link params   ->                      (1)
//!   SPS1= pub_c ‖ nonce_c       ->                      (2)
//!                               <-  SPS1= pub_d ‖ nonce_d (3)
//!   SPS2= conf_c                ->
//!                               <-  SPS2= conf_d         (4)
//!   SP0GP0                      ->
//!                               <-  P0= 0xA5             (5)
//! ```
//!
//! Key schedule:
//! ```text
//! shared        = X25519(secret_d, pub_c)
//! conf_key ‖ ltk = HKDF-SHA256(salt = nonce_c ‖ nonce_d, ikm = shared, "pod pairing v1")
//! conf_c        = MAC(conf_key, "KC_2_U" ‖ pub_c ‖ pub_d)
//! conf_d        = MAC(conf_key, "KC_2_V" ‖ pub_d ‖ pub_c)
//! ```

use tracing::debug;
use zeroize::Zeroize;

use super::fields::{FieldReader, FieldWriter, P0, SP0GP0, SP1, SP2, SPS1, SPS2};
use crate::core::{
    CONTROLLER_CONFIRMATION_LABEL, CryptoError, DEVICE_CONFIRMATION_LABEL, DEVICE_ID_SIZE, LTK_SIZE,
    MAC_SIZE, P0_CONSTANT, PAIRING_KDF_INFO, PAIRING_NONCE_SIZE, PUBLIC_KEY_SIZE, PairingError,
};
use crate::crypto::{DeviceKeypair, LongTermKey, hkdf_expand, mac, random_bytes, verify_mac};

const CONFIRMATION_KEY_SIZE: usize = 32;
const SPS1_VALUE_SIZE: usize = PUBLIC_KEY_SIZE + PAIRING_NONCE_SIZE;

/// Keys derived from the pairing key exchange.
///
/// Both sides compute this; the controller side lives outside this crate but
/// uses the same schedule.
pub struct PairingKeys {
    confirmation_key: [u8; CONFIRMATION_KEY_SIZE],
    ltk: LongTermKey,
}

impl PairingKeys {
    /// Derive the confirmation key and long-term key.
    pub fn derive(
        shared_secret: &[u8; 32],
        controller_nonce: &[u8; PAIRING_NONCE_SIZE],
        device_nonce: &[u8; PAIRING_NONCE_SIZE],
    ) -> Result<Self, CryptoError> {
        let mut salt = [0u8; 2 * PAIRING_NONCE_SIZE];
        salt[..PAIRING_NONCE_SIZE].copy_from_slice(controller_nonce);
        salt[PAIRING_NONCE_SIZE..].copy_from_slice(device_nonce);

        let mut okm: [u8; CONFIRMATION_KEY_SIZE + LTK_SIZE] =
            hkdf_expand(&salt, shared_secret, PAIRING_KDF_INFO)?;

        let mut confirmation_key = [0u8; CONFIRMATION_KEY_SIZE];
        let mut ltk = [0u8; LTK_SIZE];
        confirmation_key.copy_from_slice(&okm[..CONFIRMATION_KEY_SIZE]);
        ltk.copy_from_slice(&okm[CONFIRMATION_KEY_SIZE..]);
        okm.zeroize();

        Ok(Self {
            confirmation_key,
            ltk: LongTermKey::from_bytes(ltk),
        })
    }

    /// Confirmation value the controller must send.
    pub fn controller_confirmation(
        &self,
        controller_public: &[u8; PUBLIC_KEY_SIZE],
        device_public: &[u8; PUBLIC_KEY_SIZE],
    ) -> Result<[u8; MAC_SIZE], CryptoError> {
        mac(
            &self.confirmation_key,
            &[CONTROLLER_CONFIRMATION_LABEL, controller_public, device_public],
        )
    }

    /// Confirmation value the device sends.
    pub fn device_confirmation(
        &self,
        device_public: &[u8; PUBLIC_KEY_SIZE],
        controller_public: &[u8; PUBLIC_KEY_SIZE],
    ) -> Result<[u8; MAC_SIZE], CryptoError> {
        mac(
            &self.confirmation_key,
            &[DEVICE_CONFIRMATION_LABEL, device_public, controller_public],
        )
    }

    /// The long-term key.
    pub fn ltk(&self) -> &LongTermKey {
        &self.ltk
    }
}

impl Drop for PairingKeys {
    fn drop(&mut self) {
        self.confirmation_key.zeroize();
    }
}

/// Pairing step reached so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PairingStep {
    /// Nothing received yet.
    Initial,
    /// `SP1=`/`SP2=` received.
    LinkParameters,
    /// Controller public key received.
    ControllerKey,
    /// Device public key sent, keys derived.
    KeysDerived,
    /// Controller confirmation verified.
    Confirmed,
    /// `SP0GP0` received.
    Finished,
}

/// Device-side pairing state machine.
///
/// Each `parse_*` consumes one controller payload, each `generate_*`
/// produces one device payload. Calls must follow the protocol order.
pub struct PairingExchange {
    step: PairingStep,
    keypair: Option<DeviceKeypair>,
    device_id: Option<[u8; DEVICE_ID_SIZE]>,
    link_parameters: Vec<u8>,
    controller_public: Option<[u8; PUBLIC_KEY_SIZE]>,
    controller_nonce: Option<[u8; PAIRING_NONCE_SIZE]>,
    device_nonce: Option<[u8; PAIRING_NONCE_SIZE]>,
    keys: Option<PairingKeys>,
}

impl PairingExchange {
    /// Start a pairing exchange with a fresh keypair.
    pub fn new() -> Self {
        Self::with_keypair(DeviceKeypair::generate())
    }

    /// Start a pairing exchange with a given keypair.
    pub fn with_keypair(keypair: DeviceKeypair) -> Self {
        Self {
            step: PairingStep::Initial,
            keypair: Some(keypair),
            device_id: None,
            link_parameters: Vec::new(),
            controller_public: None,
            controller_nonce: None,
            device_nonce: None,
            keys: None,
        }
    }

    /// Current step.
    pub fn step(&self) -> PairingStep {
        self.step
    }

    /// Device identifier announced by the controller in `SP1=`.
    pub fn device_id(&self) -> Option<[u8; DEVICE_ID_SIZE]> {
        self.device_id
    }

    /// Link parameters announced in `SP2=`.
    pub fn link_parameters(&self) -> &[u8] {
        &self.link_parameters
    }

    fn require(&self, step: PairingStep, what: &'static str) -> Result<(), PairingError> {
        if self.step == step {
            Ok(())
        } else {
            Err(PairingError::OutOfOrder(what))
        }
    }

    /// Step 1: link parameters and identifiers.
    pub fn parse_sp1_sp2(&mut self, payload: &[u8]) -> Result<(), PairingError> {
        self.require(PairingStep::Initial, "SP1/SP2")?;

        let mut reader = FieldReader::new(payload);
        let device_id = reader.expect_array::<DEVICE_ID_SIZE>(SP1)?;
        let link_parameters = reader.expect(SP2)?.to_vec();
        reader.finish()?;

        debug!(device_id = %hex::encode(device_id), "pairing: link parameters received");
        self.device_id = Some(device_id);
        self.link_parameters = link_parameters;
        self.step = PairingStep::LinkParameters;
        Ok(())
    }

    /// Step 2: controller public key and nonce.
    pub fn parse_sps1(&mut self, payload: &[u8]) -> Result<(), PairingError> {
        self.require(PairingStep::LinkParameters, "controller SPS1")?;

        let mut reader = FieldReader::new(payload);
        let value = reader.expect_array::<SPS1_VALUE_SIZE>(SPS1)?;
        reader.finish()?;

        let mut public = [0u8; PUBLIC_KEY_SIZE];
        let mut nonce = [0u8; PAIRING_NONCE_SIZE];
        public.copy_from_slice(&value[..PUBLIC_KEY_SIZE]);
        nonce.copy_from_slice(&value[PUBLIC_KEY_SIZE..]);

        self.controller_public = Some(public);
        self.controller_nonce = Some(nonce);
        self.step = PairingStep::ControllerKey;
        Ok(())
    }

    /// Step 3: device public key and nonce. Derives the pairing keys.
    pub fn generate_sps1(&mut self) -> Result<Vec<u8>, PairingError> {
        self.require(PairingStep::ControllerKey, "device SPS1")?;
        let (Some(controller_public), Some(controller_nonce), Some(keypair)) =
            (self.controller_public, self.controller_nonce, self.keypair.as_ref())
        else {
            return Err(PairingError::OutOfOrder("device SPS1"));
        };

        let device_nonce = random_bytes::<PAIRING_NONCE_SIZE>();
        let mut shared = keypair.diffie_hellman(&controller_public)?;
        let keys = PairingKeys::derive(&shared, &controller_nonce, &device_nonce);
        shared.zeroize();

        let mut value = Vec::with_capacity(SPS1_VALUE_SIZE);
        value.extend_from_slice(keypair.public_key());
        value.extend_from_slice(&device_nonce);

        self.keys = Some(keys?);
        self.device_nonce = Some(device_nonce);
        self.step = PairingStep::KeysDerived;
        FieldWriter::new().field(SPS1, &value).finish()
    }

    /// Step 4a: verify the controller's confirmation value.
    pub fn parse_sps2(&mut self, payload: &[u8]) -> Result<(), PairingError> {
        self.require(PairingStep::KeysDerived, "controller SPS2")?;

        let mut reader = FieldReader::new(payload);
        let confirmation = reader.expect_array::<MAC_SIZE>(SPS2)?;
        reader.finish()?;

        let (Some(keys), Some(controller_public), Some(keypair)) =
            (self.keys.as_ref(), self.controller_public, self.keypair.as_ref())
        else {
            return Err(PairingError::OutOfOrder("controller SPS2"));
        };

        let valid = verify_mac(
            &keys.confirmation_key,
            &[CONTROLLER_CONFIRMATION_LABEL, &controller_public, keypair.public_key()],
            &confirmation,
        )?;
        if !valid {
            return Err(PairingError::ConfirmationMismatch);
        }

        self.step = PairingStep::Confirmed;
        Ok(())
    }

    /// Step 4b: the device's confirmation value.
    pub fn generate_sps2(&self) -> Result<Vec<u8>, PairingError> {
        self.require(PairingStep::Confirmed, "device SPS2")?;
        let (Some(keys), Some(controller_public), Some(keypair)) =
            (self.keys.as_ref(), self.controller_public, self.keypair.as_ref())
        else {
            return Err(PairingError::OutOfOrder("device SPS2"));
        };

        let confirmation = keys.device_confirmation(keypair.public_key(), &controller_public)?;
        FieldWriter::new().field(SPS2, &confirmation).finish()
    }

    /// Step 5a: the controller's closing constant.
    pub fn parse_sp0gp0(&mut self, payload: &[u8]) -> Result<(), PairingError> {
        self.require(PairingStep::Confirmed, "SP0GP0")?;

        let mut reader = FieldReader::new(payload);
        reader.expect(SP0GP0)?;
        reader.finish()?;

        // The ephemeral secret is no longer needed
        self.keypair = None;
        self.step = PairingStep::Finished;
        Ok(())
    }

    /// Step 5b: the device's closing constant.
    pub fn generate_p0(&self) -> Result<Vec<u8>, PairingError> {
        self.require(PairingStep::Finished, "P0")?;
        FieldWriter::new().field(P0, &[P0_CONSTANT]).finish()
    }

    /// The long-term key, available once the exchange has finished.
    pub fn ltk(&self) -> Result<LongTermKey, PairingError> {
        self.require(PairingStep::Finished, "LTK")?;
        self.keys
            .as_ref()
            .map(|keys| keys.ltk().clone())
            .ok_or(PairingError::OutOfOrder("LTK"))
    }
}

impl Default for PairingExchange {
    fn default() -> Self {
        Self::new()
    }
}
