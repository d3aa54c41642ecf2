//! Host configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use keyward_core::KeyListConfig;
use keyward_peer::CacheConfig;

use crate::error::{ClientErrorCode, HostError, Result};

/// Tunables for an [`IdentityHost`](crate::IdentityHost).
///
/// Every field has a default, so a partial JSON document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Rotation policy of the offline encryption key list.
    pub offline_keys: KeyListConfig,

    /// Rotation policy of the signing key list.
    pub signing_keys: KeyListConfig,

    /// How long a fetched remote public key is trusted.
    pub remote_key_cache_ttl_ms: u64,

    /// Deadline for a remote public-key fetch when the caller gives none.
    pub public_key_fetch_timeout_ms: u64,

    /// Union anonymous-readable drives into every new exchange grant.
    pub include_anonymous_drives: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            offline_keys: KeyListConfig::default(),
            signing_keys: KeyListConfig::default(),
            remote_key_cache_ttl_ms: 60 * 60 * 1000,
            public_key_fetch_timeout_ms: 10_000,
            include_anonymous_drives: true,
        }
    }
}

impl HostConfig {
    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            HostError::client(ClientErrorCode::InvalidConfiguration, e.to_string())
        })
    }

    /// Settings for the remote key cache.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_millis(self.remote_key_cache_ttl_ms),
            fetch_timeout: Duration::from_millis(self.public_key_fetch_timeout_ms),
        }
    }
}
