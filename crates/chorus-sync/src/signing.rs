//! Ed25519 event signatures.
//!
//! Every replica signs the events it originates with its own key. A
//! receiver checks each event against the public key it trusts for the
//! event's origin, so a replica cannot speak for another one.

use std::collections::{BTreeMap, HashMap};

use chorus_core::errors::{ChorusError, ChorusResult};
use chorus_core::{ExperienceEvent, ReplicaId, SyncError};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

fn config_error(reason: String) -> ChorusError {
    ChorusError::ConfigError { reason }
}

fn decode_key(what: &str, hex_key: &str) -> ChorusResult<[u8; 32]> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| config_error(format!("{what} is not valid hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| config_error(format!("{what} must be 32 bytes")))
}

fn signing_bytes(event: &ExperienceEvent) -> Result<Vec<u8>, SyncError> {
    event.signing_bytes().map_err(|e| SyncError::MalformedEvent {
        event_id: event.event_id,
        reason: format!("cannot encode event for signing: {e}"),
    })
}

/// This replica's signing key.
#[derive(Clone)]
pub struct EventSigner {
    key: SigningKey,
}

impl std::fmt::Debug for EventSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSigner")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl EventSigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Fresh random key.
    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Secret key given as hex, as it appears in `sync.signing_key`.
    pub fn from_hex(secret: &str) -> ChorusResult<Self> {
        let bytes = decode_key("sync.signing_key", secret)?;
        Ok(Self::new(SigningKey::from_bytes(&bytes)))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Public key as hex, the form `sync.peer_keys` expects.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key().as_bytes())
    }

    pub fn sign(&self, event: &mut ExperienceEvent) -> Result<(), SyncError> {
        let bytes = signing_bytes(event)?;
        event.signature = Some(self.sign_bytes(&bytes));
        Ok(())
    }

    /// Detached signature over arbitrary bytes, used for state offers.
    pub fn sign_bytes(&self, bytes: &[u8]) -> Vec<u8> {
        self.key.sign(bytes).to_bytes().to_vec()
    }
}

/// Public keys trusted for each origin replica.
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    keys: HashMap<ReplicaId, VerifyingKey>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys from `sync.peer_keys`: replica id to hex public key.
    pub fn from_hex_map(entries: &BTreeMap<String, String>) -> ChorusResult<Self> {
        let mut keyring = Self::new();
        for (replica, key) in entries {
            keyring.trust_hex(ReplicaId::new(replica.clone()), key)?;
        }
        Ok(keyring)
    }

    pub fn trust(&mut self, replica: ReplicaId, key: VerifyingKey) {
        self.keys.insert(replica, key);
    }

    pub fn trust_hex(&mut self, replica: ReplicaId, key: &str) -> ChorusResult<()> {
        let what = format!("public key of {replica}");
        let bytes = decode_key(&what, key)?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| config_error(format!("{what} is not a valid ed25519 key: {e}")))?;
        self.trust(replica, key);
        Ok(())
    }

    pub fn knows(&self, replica: &ReplicaId) -> bool {
        self.keys.contains_key(replica)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check the event's signature against its origin's key. Unsigned
    /// events and events from unknown origins fail.
    pub fn verify(&self, event: &ExperienceEvent) -> Result<(), SyncError> {
        let invalid = || SyncError::InvalidSignature {
            event_id: event.event_id,
        };
        let key = self.keys.get(&event.origin_replica).ok_or_else(invalid)?;
        let signature = event.signature.as_deref().ok_or_else(invalid)?;
        let signature = Signature::from_slice(signature).map_err(|_| invalid())?;
        key.verify(&signing_bytes(event)?, &signature)
            .map_err(|_| invalid())
    }

    /// Check a detached signature made by `replica` over `bytes`.
    pub fn verify_bytes(&self, replica: &ReplicaId, bytes: &[u8], signature: &[u8]) -> bool {
        let Some(key) = self.keys.get(replica) else {
            return false;
        };
        Signature::from_slice(signature).is_ok_and(|sig| key.verify(bytes, &sig).is_ok())
    }
}
