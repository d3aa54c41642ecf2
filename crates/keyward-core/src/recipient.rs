//! Payload encryption for a remote recipient's offline public key.
//!
//! The sender generates an ephemeral X25519 key, agrees a shared secret
//! with the recipient's published offline key, derives a one-time
//! symmetric key from it and a random salt, and seals the payload. The
//! recipient finds its private key again by the checksum carried in the
//! payload.

use bytes::Bytes;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::{CoreError, Result};
use crate::secret::SymmetricKey;
use crate::wrap::SymmetricEnvelope;

const PAYLOAD_KEY_CONTEXT: &str = "keyward-v1-recipient-payload";

/// A payload sealed for one recipient key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientEncryptedPayload {
    /// Checksum of the recipient's public key used.
    pub recipient_checksum: u32,

    /// Sender's ephemeral X25519 public key.
    pub ephemeral_public: [u8; 32],

    /// Random salt mixed into key derivation.
    pub salt: [u8; 16],

    pub envelope: SymmetricEnvelope,
}

impl RecipientEncryptedPayload {
    /// Seal `plaintext` for the holder of `recipient_public`.
    pub fn encrypt(
        recipient_public: &[u8; 32],
        recipient_checksum: u32,
        plaintext: &[u8],
    ) -> Result<Self> {
        let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
        let ephemeral_public = PublicKey::from(&ephemeral).to_bytes();
        let shared = ephemeral.diffie_hellman(&PublicKey::from(*recipient_public));

        let mut salt_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt_bytes);

        let key = derive_payload_key(shared.as_bytes(), &salt_bytes);
        let envelope = SymmetricEnvelope::seal_bytes(plaintext, &key)?;

        Ok(Self {
            recipient_checksum,
            ephemeral_public,
            salt: salt_bytes,
            envelope,
        })
    }

    /// Open with the recipient's X25519 secret.
    pub fn decrypt(&self, recipient_secret: &StaticSecret) -> Result<Zeroizing<Vec<u8>>> {
        let shared = recipient_secret.diffie_hellman(&PublicKey::from(self.ephemeral_public));
        let key = derive_payload_key(shared.as_bytes(), &self.salt);
        self.envelope.open_bytes(&key)
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        Bytes::from(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

fn derive_payload_key(shared: &[u8; 32], salt: &[u8; 16]) -> SymmetricKey {
    let mut hasher = blake3::Hasher::new_derive_key(PAYLOAD_KEY_CONTEXT);
    hasher.update(shared);
    hasher.update(salt);
    SymmetricKey::from_bytes(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keylist::key_checksum;

    fn recipient() -> (StaticSecret, [u8; 32]) {
        let secret = StaticSecret::random_from_rng(rand::thread_rng());
        let public = PublicKey::from(&secret).to_bytes();
        (secret, public)
    }

    #[test]
    fn test_roundtrip() {
        let (secret, public) = recipient();
        let payload =
            RecipientEncryptedPayload::encrypt(&public, key_checksum(&public), b"hello there").unwrap();

        assert_eq!(payload.recipient_checksum, key_checksum(&public));
        assert_eq!(payload.decrypt(&secret).unwrap().as_slice(), b"hello there");
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let (_, public) = recipient();
        let (other, _) = recipient();
        let payload = RecipientEncryptedPayload::encrypt(&public, 0, b"secret").unwrap();

        assert!(matches!(
            payload.decrypt(&other),
            Err(CoreError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_salt_differs_per_payload() {
        let (_, public) = recipient();
        let a = RecipientEncryptedPayload::encrypt(&public, 0, b"x").unwrap();
        let b = RecipientEncryptedPayload::encrypt(&public, 0, b"x").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.ephemeral_public, b.ephemeral_public);
    }

    #[test]
    fn test_serialization() {
        let (secret, public) = recipient();
        let payload = RecipientEncryptedPayload::encrypt(&public, 7, b"abc").unwrap();
        let recovered = RecipientEncryptedPayload::from_bytes(&payload.to_bytes()).unwrap();
        assert_eq!(payload, recovered);
        assert_eq!(recovered.decrypt(&secret).unwrap().as_slice(), b"abc");
    }
}
