//! Key-wrap primitives.
//!
//! Two strategies:
//!
//! - [`XorSplitKey`]: a secret is split into a server half and a client
//!   half. Both halves are full-length; either one alone is uniformly
//!   random and says nothing about the secret.
//! - [`SymmetricEnvelope`]: a secret (or arbitrary bytes) encrypted under
//!   another secret with ChaCha20-Poly1305 and a random nonce. Opening with
//!   the wrong key fails authentication; garbage is never returned.

use std::fmt;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{CoreError, Result};
use crate::secret::{Secret, SymmetricKey};

/// Server-retained half of an XOR-split 256-bit key.
///
/// The matching client half is handed out once and never stored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XorSplitKey {
    server_half: [u8; 32],
}

impl XorSplitKey {
    /// Split `secret` into a stored server half and a random client half.
    pub fn split(secret: &SymmetricKey) -> (Self, SymmetricKey) {
        let client_half = SymmetricKey::generate();
        let server_half = secret.xor(&client_half);
        let split = Self {
            server_half: *server_half.expose(),
        };
        (split, client_half)
    }

    /// Recombine with the client half.
    ///
    /// Any client half produces *some* key; a forged half is only detected
    /// when the recombined key fails to open an envelope.
    pub fn combine(&self, client_half: &SymmetricKey) -> SymmetricKey {
        let server_half = SymmetricKey::from_bytes(self.server_half);
        server_half.xor(client_half)
    }
}

impl fmt::Debug for XorSplitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("XorSplitKey(..)")
    }
}

/// Format identifier for symmetric envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EnvelopeFormat {
    /// ChaCha20-Poly1305 with a 256-bit key and 96-bit nonce.
    ChaCha20Poly1305 = 1,
}

/// Authenticated symmetric encryption of a payload under a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymmetricEnvelope {
    pub format: EnvelopeFormat,

    /// Random per envelope.
    pub nonce: [u8; 12],

    /// Ciphertext including the Poly1305 tag.
    pub ciphertext: Vec<u8>,
}

impl SymmetricEnvelope {
    /// Wrap a fixed-length secret under `key`.
    pub fn seal<const N: usize>(payload: &Secret<N>, key: &SymmetricKey) -> Result<Self> {
        Self::seal_bytes(payload.expose(), key)
    }

    /// Encrypt arbitrary bytes under `key`.
    pub fn seal_bytes(plaintext: &[u8], key: &SymmetricKey) -> Result<Self> {
        let cipher = ChaCha20Poly1305::new_from_slice(key.expose())
            .map_err(|e| CoreError::EncryptionFailed(e.to_string()))?;

        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CoreError::EncryptionFailed(e.to_string()))?;

        Ok(Self {
            format: EnvelopeFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
        })
    }

    /// Unwrap a fixed-length secret.
    ///
    /// Fails when the key is wrong, the ciphertext was altered, or the
    /// plaintext is not exactly `N` bytes.
    pub fn open<const N: usize>(&self, key: &SymmetricKey) -> Result<Secret<N>> {
        let plaintext = self.open_bytes(key)?;
        Secret::from_slice(&plaintext).map_err(|_| CoreError::DecryptionFailed)
    }

    /// Decrypt to raw bytes. The buffer is zeroed when dropped.
    pub fn open_bytes(&self, key: &SymmetricKey) -> Result<Zeroizing<Vec<u8>>> {
        match self.format {
            EnvelopeFormat::ChaCha20Poly1305 => {
                let cipher = ChaCha20Poly1305::new_from_slice(key.expose())
                    .map_err(|_| CoreError::DecryptionFailed)?;
                cipher
                    .decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_slice())
                    .map(Zeroizing::new)
                    .map_err(|_| CoreError::DecryptionFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::SharedSecret;

    #[test]
    fn test_xor_split_roundtrip() {
        let secret = SymmetricKey::generate();
        let (split, client_half) = XorSplitKey::split(&secret);
        assert_eq!(split.combine(&client_half), secret);
    }

    #[test]
    fn test_xor_halves_differ_from_secret() {
        let secret = SymmetricKey::generate();
        let (split, client_half) = XorSplitKey::split(&secret);

        assert_ne!(&split.server_half, secret.expose());
        assert_ne!(client_half, secret);
    }

    #[test]
    fn test_xor_wrong_half_yields_other_key() {
        let secret = SymmetricKey::generate();
        let (split, _client_half) = XorSplitKey::split(&secret);
        let forged = SymmetricKey::generate();
        assert_ne!(split.combine(&forged), secret);
    }

    #[test]
    fn test_envelope_roundtrip() {
        let key = SymmetricKey::generate();
        let payload = SharedSecret::generate();

        let envelope = SymmetricEnvelope::seal(&payload, &key).unwrap();
        let opened: SharedSecret = envelope.open(&key).unwrap();

        assert_eq!(opened, payload);
    }

    #[test]
    fn test_envelope_wrong_key_fails() {
        let key = SymmetricKey::generate();
        let other = SymmetricKey::generate();
        let payload = SymmetricKey::generate();

        let envelope = SymmetricEnvelope::seal(&payload, &key).unwrap();
        let result: Result<SymmetricKey> = envelope.open(&other);

        assert!(matches!(result, Err(CoreError::DecryptionFailed)));
    }

    #[test]
    fn test_envelope_wrong_length_fails() {
        let key = SymmetricKey::generate();
        let payload = SharedSecret::generate();

        let envelope = SymmetricEnvelope::seal(&payload, &key).unwrap();
        let result: Result<SymmetricKey> = envelope.open(&key);

        assert!(matches!(result, Err(CoreError::DecryptionFailed)));
    }

    #[test]
    fn test_envelope_tampered_ciphertext_fails() {
        let key = SymmetricKey::generate();
        let mut envelope = SymmetricEnvelope::seal_bytes(b"drive storage key", &key).unwrap();
        envelope.ciphertext[0] ^= 0x01;
        assert!(envelope.open_bytes(&key).is_err());
    }

    #[test]
    fn test_envelope_nonces_are_unique() {
        let key = SymmetricKey::generate();
        let a = SymmetricEnvelope::seal_bytes(b"same", &key).unwrap();
        let b = SymmetricEnvelope::seal_bytes(b"same", &key).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn key() -> impl Strategy<Value = SymmetricKey> {
            any::<[u8; 32]>().prop_map(SymmetricKey::from_bytes)
        }

        proptest! {
            #[test]
            fn test_xor_split_recombines(secret in key()) {
                let (server_half, client_half) = XorSplitKey::split(&secret);
                prop_assert_eq!(server_half.combine(&client_half), secret);
            }

            #[test]
            fn test_client_halves_are_fresh(secret in key()) {
                let (_, a) = XorSplitKey::split(&secret);
                let (_, b) = XorSplitKey::split(&secret);
                prop_assert_ne!(&a, &b);
                prop_assert_ne!(&a, &secret);
            }

            #[test]
            fn test_forged_half_opens_nothing(
                secret in key(),
                data in proptest::collection::vec(any::<u8>(), 0..64),
            ) {
                let envelope = SymmetricEnvelope::seal_bytes(&data, &secret).unwrap();
                let (server_half, _) = XorSplitKey::split(&secret);
                let forged = server_half.combine(&SymmetricKey::generate());
                prop_assert!(envelope.open_bytes(&forged).is_err());
            }

            #[test]
            fn test_envelope_roundtrip_any_payload(
                key in key(),
                data in proptest::collection::vec(any::<u8>(), 0..256),
            ) {
                let envelope = SymmetricEnvelope::seal_bytes(&data, &key).unwrap();
                let opened = envelope.open_bytes(&key).unwrap();
                prop_assert_eq!(opened.as_slice(), data.as_slice());
            }
        }
    }
}
