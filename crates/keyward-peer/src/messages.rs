//! Wire shapes exchanged with remote identities.

use serde::{Deserialize, Serialize};

use keyward_core::{key_checksum, UnixTimeMillis};

use crate::error::{PeerError, Result};

/// A remote identity's published offline public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePublicKey {
    pub public_key: [u8; 32],
    pub checksum: u32,
    pub expires_at: UnixTimeMillis,
}

impl RemotePublicKey {
    /// Check the checksum matches the key and the key is still live.
    pub fn verify(&self, remote: &str, now: UnixTimeMillis) -> Result<()> {
        if key_checksum(&self.public_key) != self.checksum {
            return Err(PeerError::InvalidKey(format!(
                "checksum mismatch for {}",
                remote
            )));
        }
        if now >= self.expires_at {
            return Err(PeerError::Expired(remote.to_string()));
        }
        Ok(())
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| PeerError::InvalidKey(e.to_string()))
    }
}
