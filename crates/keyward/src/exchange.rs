//! Exchange grants and the client access tokens derived from them.

use std::collections::BTreeSet;
use std::sync::Arc;

use keyward_core::{now_millis, AccessRegistrationId, GrantId, SharedSecret, SymmetricKey};
use keyward_grants::{
    merge_drive_requests, AccessRegistration, CircleDefinition, ClientAccessToken,
    ClientAuthenticationToken, ClientTokenType, DriveGrant, DriveGrantRequest, DrivePermission,
    ExchangeGrant, PermissionSet, StoredGrant, TargetDrive,
};
use keyward_store::{Category, Store, StoreExt};

use crate::context::CallerContext;
use crate::drives::{resolve_drive, DriveResolver};
use crate::error::{ClientErrorCode, HostError, Result};

/// What a new exchange grant should cover.
#[derive(Debug, Clone, Default)]
pub struct ExchangeGrantRequest {
    pub drives: Vec<DriveGrantRequest>,
    pub permission_set: PermissionSet,
}

impl ExchangeGrantRequest {
    pub fn new(drives: Vec<DriveGrantRequest>, permission_set: PermissionSet) -> Self {
        Self {
            drives,
            permission_set,
        }
    }
}

/// The outcome of validating a presented client token.
#[derive(Debug)]
pub struct ValidatedAccess {
    pub registration: AccessRegistration,
    /// The grant the registration derives from, if any.
    pub grant: Option<StoredGrant>,
    pub shared_secret: SharedSecret,
    pub grant_key_store_key: Option<SymmetricKey>,
}

impl ValidatedAccess {
    /// Open the storage key of `drive` through the grant.
    ///
    /// `Ok(None)` when the grant does not cover the drive or carries no
    /// storage key for it.
    pub fn storage_key(&self, drive: &TargetDrive) -> Result<Option<SymmetricKey>> {
        let (Some(grant), Some(key_store_key)) = (&self.grant, &self.grant_key_store_key) else {
            return Ok(None);
        };
        match grant.grant().drive_grant(drive) {
            Some(drive_grant) => Ok(drive_grant.storage_key(key_store_key)?),
            None => Ok(None),
        }
    }

    /// Whether the grant allows `permission` on `drive`.
    pub fn allows(&self, drive: &TargetDrive, permission: DrivePermission) -> bool {
        self.grant
            .as_ref()
            .is_some_and(|g| g.grant().allows(drive, permission))
    }
}

/// Creates, persists and validates exchange grants and access registrations.
pub struct ExchangeGrantService<S, D> {
    store: Arc<S>,
    drives: Arc<D>,
    include_anonymous_drives: bool,
}

impl<S: Store, D: DriveResolver> ExchangeGrantService<S, D> {
    pub fn new(store: Arc<S>, drives: Arc<D>, include_anonymous_drives: bool) -> Self {
        Self {
            store,
            drives,
            include_anonymous_drives,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Grants
    // ─────────────────────────────────────────────────────────────────────

    /// Create a grant under a fresh key-store key.
    ///
    /// Returns the grant and its key-store key; the caller decides whether
    /// to hand the key to a token or drop it.
    pub async fn create_exchange_grant(
        &self,
        ctx: &CallerContext,
        request: &ExchangeGrantRequest,
    ) -> Result<(ExchangeGrant, SymmetricKey)> {
        let key_store_key = SymmetricKey::generate();
        let grant = self
            .create_exchange_grant_with_key(ctx, &key_store_key, request)
            .await?;
        Ok((grant, key_store_key))
    }

    /// Create a grant under an existing key-store key.
    ///
    /// Without a master key in `ctx` the grant carries permissions only:
    /// no key-store key is sealed and no drive storage key is wrapped.
    pub async fn create_exchange_grant_with_key(
        &self,
        ctx: &CallerContext,
        key_store_key: &SymmetricKey,
        request: &ExchangeGrantRequest,
    ) -> Result<ExchangeGrant> {
        let master_key = ctx.master_key();
        let drive_grants = self
            .build_drive_grants(
                key_store_key,
                master_key,
                &request.drives,
                self.include_anonymous_drives,
            )
            .await?;

        let grant = ExchangeGrant::new(
            key_store_key,
            master_key,
            drive_grants,
            request.permission_set.clone(),
            now_millis(),
        )?;

        tracing::debug!(
            drives = grant.drive_grants.len(),
            has_key = grant.master_key_encrypted_key_store_key.is_some(),
            "created exchange grant"
        );
        Ok(grant)
    }

    /// Resolve drive requests and build one drive grant per distinct drive.
    ///
    /// Every drive is resolved before anything is wrapped, so an unknown
    /// drive fails the whole call.
    pub(crate) async fn build_drive_grants(
        &self,
        key_store_key: &SymmetricKey,
        master_key: Option<&SymmetricKey>,
        requests: &[DriveGrantRequest],
        include_anonymous_drives: bool,
    ) -> Result<Vec<DriveGrant>> {
        let mut all = requests.to_vec();
        if include_anonymous_drives {
            for drive in self.drives.get_anonymous_drives().await? {
                all.push(DriveGrantRequest::new(drive.target_drive, DrivePermission::READ));
            }
        }

        let mut resolved = Vec::new();
        for request in merge_drive_requests(&all) {
            let drive = resolve_drive(self.drives.as_ref(), request.drive()).await?;
            resolved.push((drive, request.permission()));
        }

        resolved
            .iter()
            .map(|(drive, permission)| {
                DriveGrant::create(drive, *permission, key_store_key, master_key).map_err(HostError::from)
            })
            .collect()
    }

    pub async fn save_grant(&self, id: &GrantId, grant: &StoredGrant) -> Result<()> {
        self.store
            .put_value(Category::ExchangeGrant, id.as_bytes(), grant)
            .await?;
        Ok(())
    }

    pub async fn get_grant(&self, id: &GrantId) -> Result<Option<StoredGrant>> {
        Ok(self
            .store
            .get_value(Category::ExchangeGrant, id.as_bytes())
            .await?)
    }

    pub async fn list_grants(&self) -> Result<Vec<StoredGrant>> {
        Ok(self.store.list_values(Category::ExchangeGrant).await?)
    }

    /// Revoke a grant. Every token derived from it stops validating.
    pub async fn revoke_grant(&self, id: &GrantId) -> Result<()> {
        let mut stored = self.require_grant(id).await?;
        stored.grant_mut().revoke(now_millis());
        self.save_grant(id, &stored).await?;
        tracing::info!(grant = %id, kind = stored.kind_name(), "grant revoked");
        Ok(())
    }

    /// Lift a revocation.
    pub async fn reinstate_grant(&self, id: &GrantId) -> Result<()> {
        let mut stored = self.require_grant(id).await?;
        stored.grant_mut().reinstate(now_millis());
        self.save_grant(id, &stored).await?;
        tracing::info!(grant = %id, kind = stored.kind_name(), "grant reinstated");
        Ok(())
    }

    async fn require_grant(&self, id: &GrantId) -> Result<StoredGrant> {
        self.get_grant(id).await?.ok_or_else(|| {
            HostError::client(ClientErrorCode::GrantNotFound, format!("no grant {}", id))
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Access registrations
    // ─────────────────────────────────────────────────────────────────────

    /// Issue a client token for `grant`.
    ///
    /// When `grant_key_store_key` is given it is sealed into the
    /// registration so a validated token can reach the grant's drives.
    /// The registration is returned, not persisted.
    pub fn create_client_access_token(
        &self,
        grant: &ExchangeGrant,
        grant_id: Option<GrantId>,
        grant_key_store_key: Option<&SymmetricKey>,
        client_type: ClientTokenType,
    ) -> Result<(AccessRegistration, ClientAccessToken)> {
        if grant.is_revoked {
            return Err(HostError::security("token requested for revoked grant"));
        }
        Ok(AccessRegistration::issue(
            grant_id,
            grant_key_store_key,
            client_type,
            now_millis(),
        )?)
    }

    /// Issue a client token, opening the grant's key-store key with the
    /// owner's master key.
    pub fn create_client_access_token_from_master(
        &self,
        ctx: &CallerContext,
        grant: &ExchangeGrant,
        grant_id: Option<GrantId>,
        client_type: ClientTokenType,
    ) -> Result<(AccessRegistration, ClientAccessToken)> {
        let master_key = ctx.assert_has_master_key()?;
        let key_store_key = grant.key_store_key(master_key)?;
        self.create_client_access_token(grant, grant_id, Some(&key_store_key), client_type)
    }

    /// Issue and persist a new client token for a stored grant.
    pub async fn register_client(
        &self,
        ctx: &CallerContext,
        grant_id: &GrantId,
        client_type: ClientTokenType,
    ) -> Result<ClientAccessToken> {
        let stored = self.require_grant(grant_id).await?;
        let (registration, token) = self.create_client_access_token_from_master(
            ctx,
            stored.grant(),
            Some(*grant_id),
            client_type,
        )?;
        self.save_access_registration(&registration).await?;
        tracing::debug!(grant = %grant_id, registration = %registration.id, "client registered");
        Ok(token)
    }

    /// Validate a presented token.
    ///
    /// Any failure (unknown id, revoked registration, revoked grant, wrong
    /// half key) is a [`HostError::Security`]. A circle-backed grant comes
    /// back covering only the circles enabled right now.
    pub async fn validate_client_access_token(
        &self,
        token: &ClientAuthenticationToken,
    ) -> Result<ValidatedAccess> {
        let registration = self
            .get_access_registration(&token.id)
            .await?
            .ok_or_else(|| HostError::security("unknown access registration"))?;

        if registration.is_revoked {
            return Err(HostError::security("access registration revoked"));
        }

        let grant = match &registration.grant_id {
            Some(grant_id) => {
                let mut stored = self
                    .get_grant(grant_id)
                    .await?
                    .ok_or_else(|| HostError::security("registration references missing grant"))?;
                stored.grant().ensure_active()?;
                self.restrict_to_enabled_circles(&mut stored).await?;
                Some(stored)
            }
            None => None,
        };

        let unlocked = registration
            .unlock(&token.access_token_half_key)
            .map_err(|_| HostError::security("client half key rejected"))?;

        Ok(ValidatedAccess {
            registration,
            grant,
            shared_secret: unlocked.shared_secret,
            grant_key_store_key: unlocked.grant_key_store_key,
        })
    }

    /// Drop the drives and permissions of disabled or deleted circles from a
    /// circle-backed grant.
    async fn restrict_to_enabled_circles(&self, stored: &mut StoredGrant) -> Result<()> {
        let Some(circle_grants) = stored.circle_grants() else {
            return Ok(());
        };

        let mut enabled = BTreeSet::new();
        for id in circle_grants.keys() {
            let definition: Option<CircleDefinition> = self
                .store
                .get_value(Category::CircleDefinition, id.as_bytes())
                .await?;
            if definition.is_some_and(|d| d.is_enabled()) {
                enabled.insert(*id);
            } else {
                tracing::debug!(circle = %id, "circle not enabled, dropping its grants");
            }
        }

        stored.restrict_to_circles(|id| enabled.contains(id));
        Ok(())
    }

    pub async fn save_access_registration(&self, registration: &AccessRegistration) -> Result<()> {
        self.store
            .put_value(
                Category::AccessRegistration,
                registration.id.as_bytes(),
                registration,
            )
            .await?;
        Ok(())
    }

    pub async fn get_access_registration(
        &self,
        id: &AccessRegistrationId,
    ) -> Result<Option<AccessRegistration>> {
        Ok(self
            .store
            .get_value(Category::AccessRegistration, id.as_bytes())
            .await?)
    }

    pub async fn revoke_access_registration(&self, id: &AccessRegistrationId) -> Result<()> {
        let mut registration = self.require_registration(id).await?;
        registration.revoke();
        self.save_access_registration(&registration).await?;
        tracing::info!(registration = %id, "access registration revoked");
        Ok(())
    }

    pub async fn reinstate_access_registration(&self, id: &AccessRegistrationId) -> Result<()> {
        let mut registration = self.require_registration(id).await?;
        registration.reinstate();
        self.save_access_registration(&registration).await
    }

    async fn require_registration(&self, id: &AccessRegistrationId) -> Result<AccessRegistration> {
        self.get_access_registration(id).await?.ok_or_else(|| {
            HostError::client(
                ClientErrorCode::AccessRegistrationNotFound,
                format!("no access registration {}", id),
            )
        })
    }
}
