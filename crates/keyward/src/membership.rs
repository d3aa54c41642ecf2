//! Circle membership: materializing circle grants and caching them per
//! member.
//!
//! The membership cache is derived data. The authoritative grants live
//! with each connection; [`CircleMembershipService::reconcile`] rebuilds a
//! member's rows from them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use keyward_core::{now_millis, CircleId, DomainName, MemberId, SymmetricKey};
use keyward_grants::{
    CircleDefinition, CircleGrant, CircleGrantMap, CircleMemberRecord, ExchangeGrant,
    SYSTEM_CIRCLE_ID,
};
use keyward_store::{decode, encode, MemberRow, Store};

use crate::circles::CircleDefinitionService;
use crate::context::CallerContext;
use crate::drives::DriveResolver;
use crate::error::{ClientErrorCode, HostError, Result};
use crate::exchange::ExchangeGrantService;

/// Builds circle grants and maintains the membership cache.
pub struct CircleMembershipService<S, D> {
    store: Arc<S>,
    circles: Arc<CircleDefinitionService<S, D>>,
    exchange: Arc<ExchangeGrantService<S, D>>,
}

impl<S: Store, D: DriveResolver> CircleMembershipService<S, D> {
    pub fn new(
        store: Arc<S>,
        circles: Arc<CircleDefinitionService<S, D>>,
        exchange: Arc<ExchangeGrantService<S, D>>,
    ) -> Self {
        Self {
            store,
            circles,
            exchange,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Grant materialization
    // ─────────────────────────────────────────────────────────────────────

    /// Materialize `definition` for one member under `key_store_key`.
    ///
    /// Storage keys are wrapped only when `ctx` holds the master key.
    pub async fn create_circle_grant(
        &self,
        ctx: &CallerContext,
        definition: &CircleDefinition,
        key_store_key: &SymmetricKey,
    ) -> Result<CircleGrant> {
        let drive_grants = self
            .exchange
            .build_drive_grants(key_store_key, ctx.master_key(), &definition.drive_grants, false)
            .await?;

        Ok(CircleGrant {
            circle_id: definition.id,
            drive_grants,
            permission_set: definition.permissions.clone(),
        })
    }

    /// Grants for every circle in `circle_ids`, plus the system circle.
    ///
    /// Requires the master key: this path always produces grants for a
    /// new connection, which must carry storage keys.
    pub async fn create_circle_grant_list(
        &self,
        ctx: &CallerContext,
        circle_ids: &[CircleId],
        key_store_key: &SymmetricKey,
    ) -> Result<CircleGrantMap> {
        ctx.assert_has_master_key()?;

        self.circles.create_system_circle().await?;
        let ids: BTreeSet<CircleId> = circle_ids
            .iter()
            .copied()
            .chain(std::iter::once(SYSTEM_CIRCLE_ID))
            .collect();

        let mut grants = CircleGrantMap::new();
        for id in ids {
            let definition = self.circles.require_circle(&id).await?;
            let grant = self.create_circle_grant(ctx, &definition, key_store_key).await?;
            grants.insert(id, grant);
        }
        Ok(grants)
    }

    /// Project circle grants onto exchange-grant shells.
    ///
    /// Grants of disabled or deleted circles are left out. Returns the
    /// shells and the ids of the enabled circles they came from.
    pub async fn map_circle_grants_to_exchange_grants(
        &self,
        grants: &CircleGrantMap,
    ) -> Result<(BTreeMap<CircleId, ExchangeGrant>, Vec<CircleId>)> {
        let now = now_millis();
        let mut mapped = BTreeMap::new();
        let mut enabled = Vec::new();

        for (id, grant) in grants {
            if self.circles.is_enabled(id).await? {
                mapped.insert(*id, grant.to_exchange_grant_shell(now));
                enabled.push(*id);
            } else {
                tracing::debug!(circle = %id, "skipping grant of disabled circle");
            }
        }
        Ok((mapped, enabled))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Membership cache
    // ─────────────────────────────────────────────────────────────────────

    /// Record `domain` as a member of the grant's circle.
    pub async fn add_circle_member(&self, domain: &DomainName, grant: CircleGrant) -> Result<()> {
        let circle_id = grant.circle_id;
        self.circles.require_circle(&circle_id).await?;

        let member_id = domain.member_id();
        let already = self
            .store
            .get_by_member(&member_id)
            .await?
            .iter()
            .any(|row| row.circle_id == circle_id);
        if already {
            return Err(HostError::client(
                ClientErrorCode::IdentityAlreadyMemberOfCircle,
                format!("{} is already in circle {}", domain, circle_id),
            ));
        }

        self.upsert_member(member_id, grant).await?;
        tracing::debug!(circle = %circle_id, member = %domain, "member added");
        Ok(())
    }

    /// Member ids of a circle.
    pub async fn get_circle_members(&self, circle_id: &CircleId) -> Result<Vec<MemberId>> {
        Ok(self
            .store
            .get_by_circle(circle_id)
            .await?
            .into_iter()
            .map(|row| row.member_id)
            .collect())
    }

    /// Every circle `domain` belongs to, with the cached grant.
    pub async fn get_circles_by_domain(&self, domain: &DomainName) -> Result<Vec<CircleMemberRecord>> {
        self.store
            .get_by_member(&domain.member_id())
            .await?
            .into_iter()
            .map(to_record)
            .collect()
    }

    /// Remove `domain` from every circle. Returns the number of rows removed.
    pub async fn delete_member_from_all_circles(&self, domain: &DomainName) -> Result<usize> {
        let removed = self.store.delete_by_member(&domain.member_id()).await?;
        tracing::debug!(member = %domain, removed, "member removed from all circles");
        Ok(removed)
    }

    /// Replace a member's cached rows with `authoritative`.
    pub async fn reconcile(&self, domain: &DomainName, authoritative: &CircleGrantMap) -> Result<()> {
        let member_id = domain.member_id();
        self.store.delete_by_member(&member_id).await?;
        for grant in authoritative.values() {
            self.upsert_member(member_id, grant.clone()).await?;
        }
        tracing::debug!(member = %domain, circles = authoritative.len(), "membership reconciled");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Membership-aware circle changes
    // ─────────────────────────────────────────────────────────────────────

    /// Delete a circle, refusing while it still has members.
    pub async fn delete_circle(&self, circle_id: &CircleId) -> Result<()> {
        if !self.store.get_by_circle(circle_id).await?.is_empty() {
            return Err(HostError::client(
                ClientErrorCode::CannotDeleteCircleWithMembers,
                format!("circle {} still has members", circle_id),
            ));
        }
        self.circles.delete(circle_id).await
    }

    /// Update a circle definition and regrant its current members.
    ///
    /// `key_store_key_of` yields a member's connection key-store key;
    /// members it has no key for keep their old cached grant and are
    /// returned.
    pub async fn update_circle<F>(
        &self,
        ctx: &CallerContext,
        definition: CircleDefinition,
        key_store_key_of: F,
    ) -> Result<Vec<MemberId>>
    where
        F: Fn(&MemberId) -> Option<SymmetricKey> + Send + Sync,
    {
        let updated = self.circles.update(definition).await?;
        let mut stale = Vec::new();

        for row in self.store.get_by_circle(&updated.id).await? {
            match key_store_key_of(&row.member_id) {
                Some(key_store_key) => {
                    let grant = self.create_circle_grant(ctx, &updated, &key_store_key).await?;
                    self.upsert_member(row.member_id, grant).await?;
                }
                None => {
                    tracing::warn!(circle = %updated.id, member = %row.member_id, "no key to regrant member");
                    stale.push(row.member_id);
                }
            }
        }
        Ok(stale)
    }

    async fn upsert_member(&self, member_id: MemberId, grant: CircleGrant) -> Result<()> {
        let row = MemberRow {
            circle_id: grant.circle_id,
            member_id,
            data: encode(&grant)?,
        };
        self.store.upsert_member(row).await?;
        Ok(())
    }
}

fn to_record(row: MemberRow) -> Result<CircleMemberRecord> {
    let circle_grant: CircleGrant = decode(&row.data)?;
    Ok(CircleMemberRecord {
        circle_id: row.circle_id,
        member_id: row.member_id,
        circle_grant,
    })
}
