//! Rotating asymmetric key lists.
//!
//! Each purpose (offline encryption, signing) owns a short list of key pairs
//! ordered newest-first. The newest unexpired key is the current key. When
//! the newest key enters the rotation window a fresh pair is prepended and
//! the list is trimmed to `max_keys`. Older keys stay resolvable by checksum
//! until they are evicted, so data encrypted under a rotated-out key can
//! still be opened.
//!
//! Private halves are stored inside a [`SymmetricEnvelope`] under a caller
//! supplied secret. The list itself never holds a raw private key.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::error::{CoreError, Result};
use crate::secret::{Secret, SymmetricKey};
use crate::types::{KeyListId, UnixTimeMillis};
use crate::wrap::SymmetricEnvelope;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// What a key list is used for. Determines the key algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyPurpose {
    /// X25519 keys used to receive payloads while the owner is offline.
    OfflineEncryption,
    /// Ed25519 keys used to sign outbound data.
    Signing,
}

impl KeyPurpose {
    /// Stable storage id of the list for this purpose.
    pub fn list_id(&self) -> KeyListId {
        match self {
            KeyPurpose::OfflineEncryption => KeyListId::from_name("offline-encryption"),
            KeyPurpose::Signing => KeyListId::from_name("signing"),
        }
    }
}

/// Tuning for a key list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyListConfig {
    /// Maximum number of keys retained, current plus historic.
    pub max_keys: usize,
    /// Lifetime of a newly generated key.
    pub key_lifetime_ms: i64,
    /// Rotate once the newest key is this close to expiring.
    pub rotation_window_ms: i64,
}

impl Default for KeyListConfig {
    fn default() -> Self {
        Self {
            max_keys: 2,
            key_lifetime_ms: 90 * DAY_MS,
            rotation_window_ms: DAY_MS,
        }
    }
}

/// Checksum identifying a public key: the first four bytes of its Blake3
/// hash, little-endian.
pub fn key_checksum(public_key: &[u8; 32]) -> u32 {
    let hash = blake3::hash(public_key);
    let b = hash.as_bytes();
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// One key pair in a rotating list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsymmetricKeyRecord {
    pub purpose: KeyPurpose,
    pub public_key: [u8; 32],
    pub encrypted_private_key: SymmetricEnvelope,
    pub checksum: u32,
    pub created_at: UnixTimeMillis,
    pub expires_at: UnixTimeMillis,
    pub is_private_key_encrypted: bool,
}

impl AsymmetricKeyRecord {
    /// Generate a key pair and seal its private half under `wrapping_key`.
    pub fn generate(
        purpose: KeyPurpose,
        wrapping_key: &SymmetricKey,
        now: UnixTimeMillis,
        lifetime_ms: i64,
    ) -> Result<Self> {
        let (private_key, public_key) = match purpose {
            KeyPurpose::OfflineEncryption => {
                let secret = StaticSecret::random_from_rng(rand::thread_rng());
                let public = X25519PublicKey::from(&secret);
                (Secret::<32>::from_bytes(secret.to_bytes()), public.to_bytes())
            }
            KeyPurpose::Signing => {
                let signing = SigningKey::generate(&mut rand::thread_rng());
                let public = signing.verifying_key().to_bytes();
                (Secret::<32>::from_bytes(signing.to_bytes()), public)
            }
        };

        let encrypted_private_key = SymmetricEnvelope::seal(&private_key, wrapping_key)?;

        Ok(Self {
            purpose,
            public_key,
            encrypted_private_key,
            checksum: key_checksum(&public_key),
            created_at: now,
            expires_at: now.saturating_add(lifetime_ms),
            is_private_key_encrypted: true,
        })
    }

    pub fn is_expired(&self, now: UnixTimeMillis) -> bool {
        now >= self.expires_at
    }

    /// Open the private half.
    pub fn decrypt_private_key(&self, wrapping_key: &SymmetricKey) -> Result<Secret<32>> {
        self.encrypted_private_key.open(wrapping_key)
    }

    /// X25519 secret for an offline-encryption key.
    pub fn x25519_secret(&self, wrapping_key: &SymmetricKey) -> Result<StaticSecret> {
        self.expect_purpose(KeyPurpose::OfflineEncryption)?;
        let private_key = self.decrypt_private_key(wrapping_key)?;
        Ok(StaticSecret::from(*private_key.expose()))
    }

    /// Sign `message` with a signing key.
    pub fn sign(&self, wrapping_key: &SymmetricKey, message: &[u8]) -> Result<KeySignature> {
        self.expect_purpose(KeyPurpose::Signing)?;
        let private_key = self.decrypt_private_key(wrapping_key)?;
        let signing = SigningKey::from_bytes(private_key.expose());
        Ok(KeySignature {
            checksum: self.checksum,
            signature: signing.sign(message).to_bytes().to_vec(),
        })
    }

    fn expect_purpose(&self, expected: KeyPurpose) -> Result<()> {
        if self.purpose != expected {
            return Err(CoreError::PurposeMismatch {
                expected,
                actual: self.purpose,
            });
        }
        Ok(())
    }
}

/// A detached Ed25519 signature tagged with the signing key's checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    pub checksum: u32,
    pub signature: Vec<u8>,
}

/// Verify a detached signature against an Ed25519 public key.
pub fn verify_signature(public_key: &[u8; 32], message: &[u8], signature: &KeySignature) -> Result<()> {
    let verifying_key = VerifyingKey::from_bytes(public_key).map_err(|_| CoreError::InvalidPublicKey)?;
    let bytes: [u8; 64] = signature
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| CoreError::InvalidSignature)?;
    verifying_key
        .verify(message, &Signature::from_bytes(&bytes))
        .map_err(|_| CoreError::InvalidSignature)
}

/// A newest-first list of key pairs for one purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatingKeyList {
    pub id: KeyListId,
    pub purpose: KeyPurpose,
    pub max_keys: usize,
    pub keys: Vec<AsymmetricKeyRecord>,
}

impl RotatingKeyList {
    /// Create a list holding one freshly generated key.
    pub fn create(
        wrapping_key: &SymmetricKey,
        purpose: KeyPurpose,
        config: &KeyListConfig,
        now: UnixTimeMillis,
    ) -> Result<Self> {
        let first = AsymmetricKeyRecord::generate(purpose, wrapping_key, now, config.key_lifetime_ms)?;
        Ok(Self {
            id: purpose.list_id(),
            purpose,
            max_keys: config.max_keys.max(1),
            keys: vec![first],
        })
    }

    /// Return the current key, rotating first if needed.
    ///
    /// The returned flag is `true` when the list changed and must be
    /// persisted by the caller.
    pub fn current_key(
        &mut self,
        wrapping_key: &SymmetricKey,
        config: &KeyListConfig,
        now: UnixTimeMillis,
    ) -> Result<(AsymmetricKeyRecord, bool)> {
        if let Some(newest) = self.keys.first() {
            if newest.expires_at.saturating_sub(now) > config.rotation_window_ms {
                return Ok((newest.clone(), false));
            }
        }

        let fresh =
            AsymmetricKeyRecord::generate(self.purpose, wrapping_key, now, config.key_lifetime_ms)?;
        self.keys.insert(0, fresh.clone());
        self.keys.truncate(self.max_keys.max(1));
        Ok((fresh, true))
    }

    /// The newest unexpired key, without rotating.
    pub fn peek_current(&self, now: UnixTimeMillis) -> Option<&AsymmetricKeyRecord> {
        self.keys.first().filter(|k| !k.is_expired(now))
    }

    /// Find a current or historic key by checksum.
    pub fn find_key(&self, checksum: u32) -> Option<&AsymmetricKeyRecord> {
        self.keys.iter().find(|k| k.checksum == checksum)
    }

    /// Like [`RotatingKeyList::find_key`], mapping a miss to `InvalidOrExpiredKey`.
    pub fn require_key(&self, checksum: u32) -> Result<&AsymmetricKeyRecord> {
        self.find_key(checksum)
            .ok_or(CoreError::InvalidOrExpiredKey(checksum))
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}
