//! Transport abstraction for remote public-key lookup.
//!
//! The transport issues an outbound request to a remote identity's
//! public-key endpoint. Implementations may use HTTPS or anything else;
//! the cache in [`crate::cache`] bounds every call with a deadline.

use async_trait::async_trait;

use keyward_core::DomainName;

use crate::error::Result;
use crate::messages::RemotePublicKey;

/// Fetches public keys published by remote identities.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait PublicKeyTransport: Send + Sync {
    /// Fetch the current offline encryption key of `remote`.
    async fn fetch_offline_public_key(&self, remote: &DomainName) -> Result<RemotePublicKey>;
}

/// A simple in-memory key directory for testing.
///
/// Remote identities publish keys into a shared map; fetches are counted
/// so tests can observe cache behaviour.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::RwLock;

    use crate::error::PeerError;

    /// In-memory transport implementation.
    #[derive(Default)]
    pub struct MemoryKeyDirectory {
        keys: RwLock<HashMap<DomainName, RemotePublicKey>>,
        fetches: AtomicUsize,
        latency: RwLock<Option<Duration>>,
    }

    impl MemoryKeyDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        /// Publish (or replace) the key of `remote`.
        pub async fn publish(&self, remote: DomainName, key: RemotePublicKey) {
            self.keys.write().await.insert(remote, key);
        }

        /// Delay every subsequent fetch by `latency`.
        pub async fn set_latency(&self, latency: Option<Duration>) {
            *self.latency.write().await = latency;
        }

        /// Number of fetches served so far.
        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PublicKeyTransport for MemoryKeyDirectory {
        async fn fetch_offline_public_key(&self, remote: &DomainName) -> Result<RemotePublicKey> {
            self.fetches.fetch_add(1, Ordering::SeqCst);

            let latency = *self.latency.read().await;
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }

            self.keys
                .read()
                .await
                .get(remote)
                .cloned()
                .ok_or_else(|| PeerError::UnknownRecipient(remote.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryKeyDirectory;
    use super::*;
    use crate::error::PeerError;

    #[tokio::test]
    async fn test_publish_and_fetch() {
        let directory = MemoryKeyDirectory::new();
        let remote = DomainName::parse("merry.example.com").unwrap();
        let key = RemotePublicKey {
            public_key: [1; 32],
            checksum: keyward_core::key_checksum(&[1; 32]),
            expires_at: i64::MAX,
        };

        directory.publish(remote.clone(), key.clone()).await;
        assert_eq!(directory.fetch_offline_public_key(&remote).await.unwrap(), key);
        assert_eq!(directory.fetch_count(), 1);

        let unknown = DomainName::parse("pippin.example.com").unwrap();
        assert!(matches!(
            directory.fetch_offline_public_key(&unknown).await,
            Err(PeerError::UnknownRecipient(_))
        ));
    }
}
