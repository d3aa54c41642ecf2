//! Access registrations and client access tokens.
//!
//! Issuing a token generates a random access key-store key and splits it:
//! the server keeps one half in the [`AccessRegistration`], the client
//! receives the other half in its [`ClientAccessToken`]. A shared secret
//! and, optionally, the grant's key-store key are sealed under the full
//! access key-store key. The two records are correlated only by id.

use std::fmt;

use serde::{Deserialize, Serialize};

use keyward_core::{
    AccessRegistrationId, GrantId, SharedSecret, SymmetricEnvelope, SymmetricKey,
    UnixTimeMillis, XorSplitKey,
};

use crate::error::{GrantsError, Result};

/// What kind of client a registration was issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientTokenType {
    /// App and owner-console clients.
    Other,
    /// A browser session of another identity.
    YouAuth,
    /// A remote identity subscribed to push notifications.
    RemoteNotificationSubscriber,
}

/// Server-side record of an issued client credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRegistration {
    pub id: AccessRegistrationId,
    pub client_type: ClientTokenType,
    pub created: UnixTimeMillis,
    pub is_revoked: bool,

    /// The exchange grant this registration derives from.
    pub grant_id: Option<GrantId>,

    pub client_access_key_encrypted_key_store_key: XorSplitKey,
    pub access_key_store_key_encrypted_shared_secret: SymmetricEnvelope,
    pub access_key_store_key_encrypted_exchange_grant_key_store_key: Option<SymmetricEnvelope>,
}

/// Client-held credential. Never persisted server-side.
#[derive(Clone)]
pub struct ClientAccessToken {
    pub id: AccessRegistrationId,
    pub access_token_half_key: SymmetricKey,
    pub shared_secret: SharedSecret,
    pub client_type: ClientTokenType,
}

/// The part of a token presented on each request.
#[derive(Clone)]
pub struct ClientAuthenticationToken {
    pub id: AccessRegistrationId,
    pub access_token_half_key: SymmetricKey,
    pub client_type: ClientTokenType,
}

/// What a validated token unlocks.
pub struct UnlockedAccess {
    pub shared_secret: SharedSecret,
    pub grant_key_store_key: Option<SymmetricKey>,
}

impl AccessRegistration {
    /// Issue a new registration and the matching client token.
    ///
    /// Every intermediate secret is dropped (and zeroed) before return.
    pub fn issue(
        grant_id: Option<GrantId>,
        grant_key_store_key: Option<&SymmetricKey>,
        client_type: ClientTokenType,
        now: UnixTimeMillis,
    ) -> Result<(Self, ClientAccessToken)> {
        let access_key_store_key = SymmetricKey::generate();
        let (server_half, client_half) = XorSplitKey::split(&access_key_store_key);

        let shared_secret = SharedSecret::generate();
        let encrypted_shared_secret = SymmetricEnvelope::seal(&shared_secret, &access_key_store_key)?;

        let encrypted_grant_key = match grant_key_store_key {
            Some(key) => Some(SymmetricEnvelope::seal(key, &access_key_store_key)?),
            None => None,
        };

        let id = AccessRegistrationId::generate();
        let registration = Self {
            id,
            client_type,
            created: now,
            is_revoked: false,
            grant_id,
            client_access_key_encrypted_key_store_key: server_half,
            access_key_store_key_encrypted_shared_secret: encrypted_shared_secret,
            access_key_store_key_encrypted_exchange_grant_key_store_key: encrypted_grant_key,
        };

        let token = ClientAccessToken {
            id,
            access_token_half_key: client_half,
            shared_secret,
            client_type,
        };

        Ok((registration, token))
    }

    /// Recombine the halves and open what the registration protects.
    ///
    /// Fails with `RegistrationRevoked` when revoked, or a decryption error
    /// when the presented half is not the one issued.
    pub fn unlock(&self, client_half: &SymmetricKey) -> Result<UnlockedAccess> {
        if self.is_revoked {
            return Err(GrantsError::RegistrationRevoked);
        }

        let access_key_store_key = self
            .client_access_key_encrypted_key_store_key
            .combine(client_half);

        let shared_secret = self
            .access_key_store_key_encrypted_shared_secret
            .open(&access_key_store_key)?;

        let grant_key_store_key = match &self.access_key_store_key_encrypted_exchange_grant_key_store_key {
            Some(envelope) => Some(envelope.open(&access_key_store_key)?),
            None => None,
        };

        Ok(UnlockedAccess {
            shared_secret,
            grant_key_store_key,
        })
    }

    pub fn revoke(&mut self) {
        self.is_revoked = true;
    }

    pub fn reinstate(&mut self) {
        self.is_revoked = false;
    }
}

impl ClientAccessToken {
    /// The per-request credential derived from this token.
    pub fn to_authentication_token(&self) -> ClientAuthenticationToken {
        ClientAuthenticationToken {
            id: self.id,
            access_token_half_key: self.access_token_half_key.clone(),
            client_type: self.client_type,
        }
    }
}

impl fmt::Debug for ClientAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAccessToken")
            .field("id", &self.id)
            .field("client_type", &self.client_type)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ClientAuthenticationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAuthenticationToken")
            .field("id", &self.id)
            .field("client_type", &self.client_type)
            .finish_non_exhaustive()
    }
}
