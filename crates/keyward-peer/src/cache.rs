//! Get-or-fetch cache of remote public keys.
//!
//! One mutex guards the whole cache. Misses are rare relative to hits, so
//! a miss holds the lock across the fetch: concurrent callers for the same
//! remote wait and then hit the freshly cached entry instead of issuing
//! their own request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use keyward_core::{now_millis, DomainName, UnixTimeMillis};

use crate::error::{PeerError, Result};
use crate::messages::RemotePublicKey;
use crate::transport::PublicKeyTransport;

/// Configuration for the remote key cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a fetched key is trusted before refetching.
    pub ttl: Duration,
    /// Deadline for a fetch when the caller supplies none.
    pub fetch_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedKey {
    key: RemotePublicKey,
    fresh_until: UnixTimeMillis,
}

/// Cache of remote identities' offline public keys.
pub struct RemoteKeyCache<T: PublicKeyTransport> {
    transport: Arc<T>,
    config: CacheConfig,
    entries: Mutex<HashMap<DomainName, CachedKey>>,
}

impl<T: PublicKeyTransport> RemoteKeyCache<T> {
    pub fn new(transport: Arc<T>, config: CacheConfig) -> Self {
        Self {
            transport,
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Return the cached key for `remote`, fetching it on a miss.
    ///
    /// The fetch is bounded by `deadline`, or the configured timeout.
    pub async fn get_or_fetch(
        &self,
        remote: &DomainName,
        deadline: Option<Duration>,
    ) -> Result<RemotePublicKey> {
        let mut entries = self.entries.lock().await;
        let now = now_millis();

        if let Some(cached) = entries.get(remote) {
            if now < cached.fresh_until {
                tracing::trace!(remote = %remote, "remote key cache hit");
                return Ok(cached.key.clone());
            }
        }

        let timeout = deadline.unwrap_or(self.config.fetch_timeout);
        tracing::debug!(remote = %remote, timeout_ms = timeout.as_millis() as u64, "fetching remote key");

        let key = match tokio::time::timeout(timeout, self.transport.fetch_offline_public_key(remote)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(remote = %remote, "remote key fetch timed out");
                return Err(PeerError::Timeout(format!("fetching key of {}", remote)));
            }
        };

        let now = now_millis();
        key.verify(remote.as_str(), now)?;

        let ttl_ms = self.config.ttl.as_millis() as i64;
        let fresh_until = now.saturating_add(ttl_ms).min(key.expires_at);
        entries.insert(
            remote.clone(),
            CachedKey {
                key: key.clone(),
                fresh_until,
            },
        );

        Ok(key)
    }

    /// Drop the cached key for `remote`, e.g. after it rejected a payload.
    pub async fn invalidate(&self, remote: &DomainName) -> bool {
        self.entries.lock().await.remove(remote).is_some()
    }

    /// Number of cached entries, fresh or not.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryKeyDirectory;
    use keyward_core::key_checksum;

    fn published(public_key: [u8; 32]) -> RemotePublicKey {
        RemotePublicKey {
            public_key,
            checksum: key_checksum(&public_key),
            expires_at: now_millis() + 24 * 60 * 60 * 1000,
        }
    }

    fn remote() -> DomainName {
        DomainName::parse("pippin.example.com").unwrap()
    }

    #[tokio::test]
    async fn test_hit_after_miss() {
        let directory = Arc::new(MemoryKeyDirectory::new());
        directory.publish(remote(), published([3; 32])).await;
        let cache = RemoteKeyCache::new(directory.clone(), CacheConfig::default());

        let a = cache.get_or_fetch(&remote(), None).await.unwrap();
        let b = cache.get_or_fetch(&remote(), None).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(directory.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let directory = Arc::new(MemoryKeyDirectory::new());
        directory.publish(remote(), published([3; 32])).await;
        let cache = RemoteKeyCache::new(directory.clone(), CacheConfig::default());

        cache.get_or_fetch(&remote(), None).await.unwrap();
        directory.publish(remote(), published([4; 32])).await;
        assert!(cache.invalidate(&remote()).await);

        let key = cache.get_or_fetch(&remote(), None).await.unwrap();
        assert_eq!(key.public_key, [4; 32]);
        assert_eq!(directory.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let directory = Arc::new(MemoryKeyDirectory::new());
        directory.publish(remote(), published([5; 32])).await;
        directory.set_latency(Some(Duration::from_millis(20))).await;
        let cache = Arc::new(RemoteKeyCache::new(directory.clone(), CacheConfig::default()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.get_or_fetch(&remote(), None).await.unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().public_key, [5; 32]);
        }

        assert_eq!(directory.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_deadline_is_honored() {
        let directory = Arc::new(MemoryKeyDirectory::new());
        directory.publish(remote(), published([6; 32])).await;
        directory.set_latency(Some(Duration::from_millis(500))).await;
        let cache = RemoteKeyCache::new(directory, CacheConfig::default());

        let result = cache
            .get_or_fetch(&remote(), Some(Duration::from_millis(10)))
            .await;
        assert!(matches!(result, Err(PeerError::Timeout(_))));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_tampered_checksum_not_cached() {
        let directory = Arc::new(MemoryKeyDirectory::new());
        let mut key = published([7; 32]);
        key.checksum = key.checksum.wrapping_add(1);
        directory.publish(remote(), key).await;
        let cache = RemoteKeyCache::new(directory, CacheConfig::default());

        assert!(matches!(
            cache.get_or_fetch(&remote(), None).await,
            Err(PeerError::InvalidKey(_))
        ));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_recipient() {
        let directory = Arc::new(MemoryKeyDirectory::new());
        let cache = RemoteKeyCache::new(directory, CacheConfig::default());
        assert!(matches!(
            cache.get_or_fetch(&remote(), None).await,
            Err(PeerError::UnknownRecipient(_))
        ));
    }
}
