//! The host's own key lists and payload encryption for remote identities.
//!
//! Two lists are kept. The offline encryption list lets remote senders
//! seal payloads while the owner is not logged in, so its private keys are
//! sealed under a fixed host key rather than the master key. The signing
//! list is sealed under the master key, so signing needs the owner.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use zeroize::Zeroizing;

use keyward_core::{
    now_millis, verify_signature, AsymmetricKeyRecord, CoreError, DomainName, KeyListConfig,
    KeyPurpose, KeySignature, RecipientEncryptedPayload, RotatingKeyList, SymmetricKey,
};
use keyward_peer::{PublicKeyTransport, RemoteKeyCache, RemotePublicKey};
use keyward_store::{Category, Store, StoreExt};

use crate::config::HostConfig;
use crate::context::CallerContext;
use crate::error::{HostError, Result};

/// Wrapping key of the offline encryption list's private keys.
pub const OFFLINE_PRIVATE_KEY_ENCRYPTION_KEY: [u8; 32] = [0u8; 32];

fn offline_wrapping_key() -> SymmetricKey {
    SymmetricKey::from_bytes(OFFLINE_PRIVATE_KEY_ENCRYPTION_KEY)
}

/// Manages the host's key lists and remote recipients' keys.
///
/// Read-modify-write of each list runs under that list's lock, so
/// concurrent rotations cannot lose a key.
pub struct PublicKeyService<S, T: PublicKeyTransport> {
    store: Arc<S>,
    remote_keys: RemoteKeyCache<T>,
    offline_config: KeyListConfig,
    signing_config: KeyListConfig,
    offline_lock: Mutex<()>,
    signing_lock: Mutex<()>,
}

impl<S: Store, T: PublicKeyTransport> PublicKeyService<S, T> {
    pub fn new(store: Arc<S>, transport: Arc<T>, config: &HostConfig) -> Self {
        Self {
            store,
            remote_keys: RemoteKeyCache::new(transport, config.cache_config()),
            offline_config: config.offline_keys.clone(),
            signing_config: config.signing_keys.clone(),
            offline_lock: Mutex::new(()),
            signing_lock: Mutex::new(()),
        }
    }

    fn config(&self, purpose: KeyPurpose) -> &KeyListConfig {
        match purpose {
            KeyPurpose::OfflineEncryption => &self.offline_config,
            KeyPurpose::Signing => &self.signing_config,
        }
    }

    fn lock(&self, purpose: KeyPurpose) -> &Mutex<()> {
        match purpose {
            KeyPurpose::OfflineEncryption => &self.offline_lock,
            KeyPurpose::Signing => &self.signing_lock,
        }
    }

    async fn load(&self, purpose: KeyPurpose) -> Result<Option<RotatingKeyList>> {
        Ok(self
            .store
            .get_value(Category::KeyList, purpose.list_id().as_bytes())
            .await?)
    }

    async fn save(&self, list: &RotatingKeyList) -> Result<()> {
        self.store
            .put_value(Category::KeyList, list.id.as_bytes(), list)
            .await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Initialization
    // ─────────────────────────────────────────────────────────────────────

    /// Create both key lists. Must run once per tenant, as the owner.
    ///
    /// Fails with a security error if either list already exists.
    pub async fn create_initial_keys(&self, ctx: &CallerContext) -> Result<()> {
        let master_key = ctx.assert_has_master_key()?;
        let now = now_millis();

        for (purpose, wrapping_key) in [
            (KeyPurpose::OfflineEncryption, offline_wrapping_key()),
            (KeyPurpose::Signing, master_key.clone()),
        ] {
            let _guard = self.lock(purpose).lock().await;
            if self.load(purpose).await?.is_some() {
                return Err(HostError::security("key list already initialized"));
            }
            let list = RotatingKeyList::create(&wrapping_key, purpose, self.config(purpose), now)?;
            self.save(&list).await?;
            tracing::info!(?purpose, "key list created");
        }
        Ok(())
    }

    /// Whether both key lists exist.
    pub async fn has_initial_keys(&self) -> Result<bool> {
        Ok(self.load(KeyPurpose::OfflineEncryption).await?.is_some()
            && self.load(KeyPurpose::Signing).await?.is_some())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Offline encryption keys
    // ─────────────────────────────────────────────────────────────────────

    /// The current offline public key, rotating first if it is near expiry.
    ///
    /// Needs no master key, so remote lookups can be served unattended.
    pub async fn get_offline_public_key(&self) -> Result<RemotePublicKey> {
        let purpose = KeyPurpose::OfflineEncryption;
        let _guard = self.lock(purpose).lock().await;
        let wrapping_key = offline_wrapping_key();
        let config = self.config(purpose);
        let now = now_millis();

        let mut list = self
            .load(purpose)
            .await?
            .ok_or_else(|| HostError::security("offline keys not initialized"))?;

        let (current, rotated) = list.current_key(&wrapping_key, config, now)?;
        if rotated {
            self.save(&list).await?;
            tracing::info!(checksum = current.checksum, "offline key rotated");
        }
        Ok(to_published(&current))
    }

    /// A current or historic offline public key by checksum.
    pub async fn get_offline_public_key_by_checksum(&self, checksum: u32) -> Result<RemotePublicKey> {
        let list = self.require_list(KeyPurpose::OfflineEncryption, checksum).await?;
        Ok(to_published(list.require_key(checksum)?))
    }

    /// Open a payload sealed for one of our offline keys.
    ///
    /// A checksum naming no key we hold fails with `InvalidOrExpiredKey`.
    pub async fn decrypt_payload(
        &self,
        payload: &RecipientEncryptedPayload,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let list = self
            .require_list(KeyPurpose::OfflineEncryption, payload.recipient_checksum)
            .await?;
        let record = list.require_key(payload.recipient_checksum)?;
        let secret = record.x25519_secret(&offline_wrapping_key())?;
        Ok(payload.decrypt(&secret)?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Remote recipients
    // ─────────────────────────────────────────────────────────────────────

    /// Seal `payload` for `recipient`'s current offline key.
    ///
    /// The recipient's key comes from the cache or, on a miss, a fetch
    /// bounded by `deadline`.
    pub async fn encrypt_payload_for_recipient(
        &self,
        recipient: &DomainName,
        payload: &[u8],
        deadline: Option<Duration>,
    ) -> Result<RecipientEncryptedPayload> {
        let key = self.remote_keys.get_or_fetch(recipient, deadline).await?;
        Ok(RecipientEncryptedPayload::encrypt(
            &key.public_key,
            key.checksum,
            payload,
        )?)
    }

    /// Forget `recipient`'s cached key, e.g. after it reported a stale
    /// checksum.
    pub async fn invalidate_recipient_key(&self, recipient: &DomainName) -> bool {
        self.remote_keys.invalidate(recipient).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Signing keys
    // ─────────────────────────────────────────────────────────────────────

    /// The current signing public key.
    ///
    /// Rotates when the owner is present; otherwise returns the newest
    /// unexpired key, or a security error if there is none.
    pub async fn get_signing_public_key(&self, ctx: &CallerContext) -> Result<RemotePublicKey> {
        let purpose = KeyPurpose::Signing;
        let _guard = self.lock(purpose).lock().await;
        let now = now_millis();

        let mut list = self
            .load(purpose)
            .await?
            .ok_or_else(|| HostError::security("signing keys not initialized"))?;

        match ctx.master_key() {
            Some(master_key) => {
                let (current, rotated) = list.current_key(master_key, self.config(purpose), now)?;
                if rotated {
                    self.save(&list).await?;
                    tracing::info!(checksum = current.checksum, "signing key rotated");
                }
                Ok(to_published(&current))
            }
            None => list
                .peek_current(now)
                .map(to_published)
                .ok_or_else(|| HostError::security("signing key expired and owner absent")),
        }
    }

    /// Sign `data` with the current signing key. Requires the master key.
    pub async fn sign(&self, ctx: &CallerContext, data: &[u8]) -> Result<KeySignature> {
        let master_key = ctx.assert_has_master_key()?;
        let purpose = KeyPurpose::Signing;
        let _guard = self.lock(purpose).lock().await;

        let mut list = self
            .load(purpose)
            .await?
            .ok_or_else(|| HostError::security("signing keys not initialized"))?;
        let (current, rotated) = list.current_key(master_key, self.config(purpose), now_millis())?;
        if rotated {
            self.save(&list).await?;
        }
        Ok(current.sign(master_key, data)?)
    }

    /// Verify a signature made by one of our current or historic signing keys.
    pub async fn verify_signature(&self, data: &[u8], signature: &KeySignature) -> Result<()> {
        let list = self.require_list(KeyPurpose::Signing, signature.checksum).await?;
        let record = list.require_key(signature.checksum)?;
        Ok(verify_signature(&record.public_key, data, signature)?)
    }

    async fn require_list(&self, purpose: KeyPurpose, checksum: u32) -> Result<RotatingKeyList> {
        match self.load(purpose).await? {
            Some(list) => Ok(list),
            None => Err(CoreError::InvalidOrExpiredKey(checksum).into()),
        }
    }
}

fn to_published(record: &AsymmetricKeyRecord) -> RemotePublicKey {
    RemotePublicKey {
        public_key: record.public_key,
        checksum: record.checksum,
        expires_at: record.expires_at,
    }
}
