//! Circles: named, reusable bundles of drive grants and permissions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use keyward_core::{CircleId, MemberId, UnixTimeMillis};

use crate::drive::{DriveGrant, DriveGrantRequest, TargetDrive};
use crate::error::{GrantsError, Result};
use crate::grant::ExchangeGrant;
use crate::permission::{DrivePermission, PermissionSet};

/// Reserved id of the "all connected identities" circle.
pub const SYSTEM_CIRCLE_ID: CircleId = CircleId([
    0x9e, 0x22, 0xb4, 0x29, 0x52, 0xf7, 0x4d, 0x4a, 0x8a, 0x4e, 0x32, 0x1c, 0x7d, 0x1f, 0x6b, 0x01,
]);

/// Request to create a circle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCircleRequest {
    pub id: CircleId,
    pub name: String,
    pub description: String,
    pub drive_grants: Vec<DriveGrantRequest>,
    pub permissions: PermissionSet,
}

/// A persisted circle definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircleDefinition {
    pub id: CircleId,
    pub name: String,
    pub description: String,
    pub created: UnixTimeMillis,
    pub last_updated: UnixTimeMillis,
    pub disabled: bool,
    pub drive_grants: Vec<DriveGrantRequest>,
    pub permissions: PermissionSet,
}

impl CircleDefinition {
    pub fn from_request(request: CreateCircleRequest, now: UnixTimeMillis) -> Self {
        Self {
            id: request.id,
            name: request.name,
            description: request.description,
            created: now,
            last_updated: now,
            disabled: false,
            drive_grants: request.drive_grants,
            permissions: request.permissions,
        }
    }

    /// The built-in connected-identities circle: write access to chat and feed.
    pub fn system(now: UnixTimeMillis) -> Self {
        Self {
            id: SYSTEM_CIRCLE_ID,
            name: "All Connected Identities".into(),
            description: "All connected identities".into(),
            created: now,
            last_updated: now,
            disabled: false,
            drive_grants: vec![
                DriveGrantRequest::new(TargetDrive::chat(), DrivePermission::WRITE),
                DriveGrantRequest::new(TargetDrive::feed(), DrivePermission::WRITE),
            ],
            permissions: PermissionSet::new(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.id == SYSTEM_CIRCLE_ID
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    /// Structural checks that need no drive lookup: a name, at least one
    /// drive or permission, and only circle-eligible permission keys.
    pub fn validate_shape(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GrantsError::MissingCircleName);
        }
        if self.drive_grants.is_empty() && self.permissions.is_empty() {
            return Err(GrantsError::EmptyCircle);
        }
        if let Some(key) = self.permissions.first_ineligible_for_circle() {
            return Err(GrantsError::InvalidPermissionKey(key));
        }
        Ok(())
    }

    /// Drive requests with duplicates collapsed and permissions OR-ed.
    pub fn merged_drive_requests(&self) -> Vec<DriveGrantRequest> {
        merge_drive_requests(&self.drive_grants)
    }
}

/// Collapse requests for the same target drive, OR-ing their permissions.
/// Order follows first appearance.
pub fn merge_drive_requests(requests: &[DriveGrantRequest]) -> Vec<DriveGrantRequest> {
    let mut merged: Vec<DriveGrantRequest> = Vec::with_capacity(requests.len());
    for request in requests {
        match merged.iter_mut().find(|m| m.drive() == request.drive()) {
            Some(existing) => existing.permissioned_drive.permission |= request.permission(),
            None => merged.push(*request),
        }
    }
    merged
}

/// A circle's drives and permissions, materialized for one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircleGrant {
    pub circle_id: CircleId,
    pub drive_grants: Vec<DriveGrant>,
    pub permission_set: PermissionSet,
}

impl CircleGrant {
    /// Project onto an exchange-grant shell. No key-store key is carried.
    pub fn to_exchange_grant_shell(&self, now: UnixTimeMillis) -> ExchangeGrant {
        ExchangeGrant::shell(self.drive_grants.clone(), self.permission_set.clone(), now)
    }
}

/// Cached record of one member's grant in one circle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircleMemberRecord {
    pub circle_id: CircleId,
    pub member_id: MemberId,
    pub circle_grant: CircleGrant,
}

/// Circle grants keyed by circle.
pub type CircleGrantMap = BTreeMap<CircleId, CircleGrant>;

/// Union circle grants: one drive grant per drive with permissions OR-ed,
/// and the union of permission keys.
///
/// The grants must share a key-store key, so any wrapped storage key for a
/// drive serves the merged grant.
pub fn merge_circle_grants<'a>(
    circle_grants: impl IntoIterator<Item = &'a CircleGrant>,
) -> (Vec<DriveGrant>, PermissionSet) {
    let mut drive_grants: Vec<DriveGrant> = Vec::new();
    let mut permission_set = PermissionSet::new();

    for grant in circle_grants {
        permission_set.merge(&grant.permission_set);
        for drive_grant in &grant.drive_grants {
            match drive_grants
                .iter_mut()
                .find(|g| g.target_drive() == drive_grant.target_drive())
            {
                Some(existing) => {
                    existing.permissioned_drive.permission |= drive_grant.permission();
                    if existing.key_store_key_encrypted_storage_key.is_none() {
                        existing.key_store_key_encrypted_storage_key =
                            drive_grant.key_store_key_encrypted_storage_key.clone();
                    }
                }
                None => drive_grants.push(drive_grant.clone()),
            }
        }
    }

    (drive_grants, permission_set)
}
