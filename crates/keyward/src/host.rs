//! The identity host: one tenant's services wired over shared storage.

use std::sync::Arc;

use keyward_core::{now_millis, CircleId, DomainName, GrantId, SymmetricKey};
use keyward_grants::{
    merge_circle_grants, CircleGrantMap, ClientAccessToken, ClientAuthenticationToken,
    ClientTokenType, ExchangeGrant, StoredGrant,
};
use keyward_peer::PublicKeyTransport;
use keyward_store::Store;

use crate::circles::CircleDefinitionService;
use crate::config::HostConfig;
use crate::context::CallerContext;
use crate::drives::DriveResolver;
use crate::error::Result;
use crate::exchange::{ExchangeGrantRequest, ExchangeGrantService, ValidatedAccess};
use crate::keys::PublicKeyService;
use crate::membership::CircleMembershipService;

/// A grant persisted together with the first token issued for it.
#[derive(Debug)]
pub struct IssuedAccess {
    pub grant_id: GrantId,
    pub token: ClientAccessToken,
}

/// A connected identity's grant, token and circle grants.
pub struct IdentityConnection {
    pub grant_id: GrantId,
    pub token: ClientAccessToken,
    pub circle_grants: CircleGrantMap,
}

/// One tenant's host.
pub struct IdentityHost<S, D, T: PublicKeyTransport> {
    config: HostConfig,
    store: Arc<S>,
    drives: Arc<D>,
    exchange: Arc<ExchangeGrantService<S, D>>,
    circles: Arc<CircleDefinitionService<S, D>>,
    membership: CircleMembershipService<S, D>,
    keys: PublicKeyService<S, T>,
}

impl<S: Store, D: DriveResolver, T: PublicKeyTransport> IdentityHost<S, D, T> {
    pub fn new(store: Arc<S>, drives: Arc<D>, transport: Arc<T>, config: HostConfig) -> Self {
        let exchange = Arc::new(ExchangeGrantService::new(
            store.clone(),
            drives.clone(),
            config.include_anonymous_drives,
        ));
        let circles = Arc::new(CircleDefinitionService::new(store.clone(), drives.clone()));
        let membership =
            CircleMembershipService::new(store.clone(), circles.clone(), exchange.clone());
        let keys = PublicKeyService::new(store.clone(), transport, &config);

        Self {
            config,
            store,
            drives,
            exchange,
            circles,
            membership,
            keys,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn drives(&self) -> &Arc<D> {
        &self.drives
    }

    pub fn exchange(&self) -> &ExchangeGrantService<S, D> {
        &self.exchange
    }

    pub fn circles(&self) -> &CircleDefinitionService<S, D> {
        &self.circles
    }

    pub fn membership(&self) -> &CircleMembershipService<S, D> {
        &self.membership
    }

    pub fn keys(&self) -> &PublicKeyService<S, T> {
        &self.keys
    }

    /// Tenant setup: the system circle and, on first run, both key lists.
    pub async fn initialize(&self, ctx: &CallerContext) -> Result<()> {
        self.circles.create_system_circle().await?;
        if !self.keys.has_initial_keys().await? {
            self.keys.create_initial_keys(ctx).await?;
        }
        tracing::info!("identity host initialized");
        Ok(())
    }

    /// Validate a presented client token.
    pub async fn validate(&self, token: &ClientAuthenticationToken) -> Result<ValidatedAccess> {
        self.exchange.validate_client_access_token(token).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Apps
    // ─────────────────────────────────────────────────────────────────────

    /// Register an app: persist its grant and issue its first token.
    pub async fn register_app(
        &self,
        ctx: &CallerContext,
        app_id: &str,
        name: &str,
        request: &ExchangeGrantRequest,
    ) -> Result<IssuedAccess> {
        ctx.assert_has_master_key()?;
        let (grant, key_store_key) = self.exchange.create_exchange_grant(ctx, request).await?;

        let stored = StoredGrant::App {
            app_id: app_id.to_string(),
            name: name.to_string(),
            grant,
        };
        let issued = self
            .persist_and_issue(stored, &key_store_key, ClientTokenType::Other)
            .await?;
        tracing::info!(app = app_id, grant = %issued.grant_id, "app registered");
        Ok(issued)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Identities
    // ─────────────────────────────────────────────────────────────────────

    /// Connect a remote identity as a member of `circle_ids` (and the
    /// system circle).
    pub async fn connect_identity(
        &self,
        ctx: &CallerContext,
        domain: &DomainName,
        circle_ids: &[CircleId],
    ) -> Result<IdentityConnection> {
        let key_store_key = SymmetricKey::generate();
        let circle_grants = self
            .membership
            .create_circle_grant_list(ctx, circle_ids, &key_store_key)
            .await?;
        let grant = self
            .circle_backed_grant(ctx, &key_store_key, &circle_grants)
            .await?;

        let stored = StoredGrant::Identity {
            domain: domain.clone(),
            grant,
            circle_grants: circle_grants.clone(),
        };
        let issued = self
            .persist_and_issue(stored, &key_store_key, ClientTokenType::Other)
            .await?;
        self.membership.reconcile(domain, &circle_grants).await?;

        tracing::info!(identity = %domain, circles = circle_grants.len(), "identity connected");
        Ok(IdentityConnection {
            grant_id: issued.grant_id,
            token: issued.token,
            circle_grants,
        })
    }

    /// Revoke an identity's grant and drop it from every circle.
    pub async fn disconnect_identity(&self, domain: &DomainName, grant_id: &GrantId) -> Result<()> {
        self.exchange.revoke_grant(grant_id).await?;
        self.membership.delete_member_from_all_circles(domain).await?;
        tracing::info!(identity = %domain, "identity disconnected");
        Ok(())
    }

    /// Authorize a YouAuth guest domain with the access of `circle_ids`.
    ///
    /// YouAuth guests are not circle members, so the membership cache is
    /// left alone.
    pub async fn register_youauth_domain(
        &self,
        ctx: &CallerContext,
        domain: &DomainName,
        circle_ids: &[CircleId],
    ) -> Result<IssuedAccess> {
        let key_store_key = SymmetricKey::generate();
        let circle_grants = self
            .membership
            .create_circle_grant_list(ctx, circle_ids, &key_store_key)
            .await?;
        let grant = self
            .circle_backed_grant(ctx, &key_store_key, &circle_grants)
            .await?;

        let stored = StoredGrant::YouAuth {
            domain: domain.clone(),
            grant,
            circle_grants,
        };
        self.persist_and_issue(stored, &key_store_key, ClientTokenType::YouAuth)
            .await
    }

    /// One exchange grant covering the grants of the enabled circles, all
    /// under the same key-store key. Validation narrows it again as circles
    /// are later disabled or re-enabled.
    async fn circle_backed_grant(
        &self,
        ctx: &CallerContext,
        key_store_key: &SymmetricKey,
        circle_grants: &CircleGrantMap,
    ) -> Result<ExchangeGrant> {
        let master_key = ctx.assert_has_master_key()?;
        let (_, enabled) = self
            .membership
            .map_circle_grants_to_exchange_grants(circle_grants)
            .await?;
        let (drive_grants, permission_set) =
            merge_circle_grants(enabled.iter().filter_map(|id| circle_grants.get(id)));
        Ok(ExchangeGrant::new(
            key_store_key,
            Some(master_key),
            drive_grants,
            permission_set,
            now_millis(),
        )?)
    }

    async fn persist_and_issue(
        &self,
        stored: StoredGrant,
        key_store_key: &SymmetricKey,
        client_type: ClientTokenType,
    ) -> Result<IssuedAccess> {
        let grant_id = GrantId::generate();
        self.exchange.save_grant(&grant_id, &stored).await?;

        let (registration, token) = self.exchange.create_client_access_token(
            stored.grant(),
            Some(grant_id),
            Some(key_store_key),
            client_type,
        )?;
        self.exchange.save_access_registration(&registration).await?;

        Ok(IssuedAccess { grant_id, token })
    }
}
