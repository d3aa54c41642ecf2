//! Persisted grant records.
//!
//! A grant is stored as exactly one of three kinds. The discriminant is
//! decoded once at the persistence boundary; callers match on the enum.
//!
//! Identity and YouAuth grants are circle-backed: next to the merged
//! grant they keep each circle's grant, so the effective grant can be
//! recomputed when a circle is disabled or re-enabled.

use serde::{Deserialize, Serialize};

use keyward_core::{CircleId, DomainName};

use crate::circle::{merge_circle_grants, CircleGrantMap};
use crate::error::{GrantsError, Result};
use crate::grant::ExchangeGrant;

/// A grant as persisted by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StoredGrant {
    /// Issued to a registered third-party app.
    App {
        app_id: String,
        name: String,
        grant: ExchangeGrant,
    },
    /// Issued to a connected identity.
    Identity {
        domain: DomainName,
        grant: ExchangeGrant,
        #[serde(default)]
        circle_grants: CircleGrantMap,
    },
    /// Issued to a YouAuth guest domain.
    YouAuth {
        domain: DomainName,
        grant: ExchangeGrant,
        #[serde(default)]
        circle_grants: CircleGrantMap,
    },
}

impl StoredGrant {
    pub fn grant(&self) -> &ExchangeGrant {
        match self {
            StoredGrant::App { grant, .. }
            | StoredGrant::Identity { grant, .. }
            | StoredGrant::YouAuth { grant, .. } => grant,
        }
    }

    pub fn grant_mut(&mut self) -> &mut ExchangeGrant {
        match self {
            StoredGrant::App { grant, .. }
            | StoredGrant::Identity { grant, .. }
            | StoredGrant::YouAuth { grant, .. } => grant,
        }
    }

    /// Per-circle grants backing this grant. `None` for app grants.
    pub fn circle_grants(&self) -> Option<&CircleGrantMap> {
        match self {
            StoredGrant::App { .. } => None,
            StoredGrant::Identity { circle_grants, .. }
            | StoredGrant::YouAuth { circle_grants, .. } => Some(circle_grants),
        }
    }

    /// Rebuild the drive grants and permissions of a circle-backed grant
    /// from the circles `is_enabled` accepts. App grants are left as is.
    pub fn restrict_to_circles(&mut self, is_enabled: impl Fn(&CircleId) -> bool) {
        let (grant, circle_grants) = match self {
            StoredGrant::App { .. } => return,
            StoredGrant::Identity {
                grant,
                circle_grants,
                ..
            }
            | StoredGrant::YouAuth {
                grant,
                circle_grants,
                ..
            } => (grant, circle_grants),
        };
        let (drive_grants, permission_set) = merge_circle_grants(
            circle_grants
                .iter()
                .filter(|(id, _)| is_enabled(*id))
                .map(|(_, g)| g),
        );
        grant.drive_grants = drive_grants;
        grant.permission_set = permission_set;
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            StoredGrant::App { .. } => "app",
            StoredGrant::Identity { .. } => "identity",
            StoredGrant::YouAuth { .. } => "youauth",
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| GrantsError::Serialization(e.to_string()))
    }
}
