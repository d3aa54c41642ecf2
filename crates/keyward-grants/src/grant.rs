//! Exchange grants: the atomic unit of delegated access.

use serde::{Deserialize, Serialize};

use keyward_core::{SymmetricEnvelope, SymmetricKey, UnixTimeMillis};

use crate::drive::{DriveGrant, TargetDrive};
use crate::error::{GrantsError, Result};
use crate::permission::{DrivePermission, PermissionSet};

/// A key-store key wrapped under the master key, a set of drive grants
/// whose storage keys are wrapped under that key-store key, and a
/// permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeGrant {
    pub created: UnixTimeMillis,
    pub modified: UnixTimeMillis,
    pub is_revoked: bool,

    /// `None` for grants issued without master-key custody.
    pub master_key_encrypted_key_store_key: Option<SymmetricEnvelope>,

    pub drive_grants: Vec<DriveGrant>,
    pub permission_set: PermissionSet,
}

impl ExchangeGrant {
    /// Assemble a grant. The key-store key is wrapped when a master key is given.
    pub fn new(
        key_store_key: &SymmetricKey,
        master_key: Option<&SymmetricKey>,
        drive_grants: Vec<DriveGrant>,
        permission_set: PermissionSet,
        now: UnixTimeMillis,
    ) -> Result<Self> {
        let wrapped = match master_key {
            Some(master_key) => Some(SymmetricEnvelope::seal(key_store_key, master_key)?),
            None => None,
        };

        Ok(Self {
            created: now,
            modified: now,
            is_revoked: false,
            master_key_encrypted_key_store_key: wrapped,
            drive_grants,
            permission_set,
        })
    }

    /// A shell carrying only drive and permission data; no key material
    /// usable with any master key.
    pub fn shell(drive_grants: Vec<DriveGrant>, permission_set: PermissionSet, now: UnixTimeMillis) -> Self {
        Self {
            created: now,
            modified: now,
            is_revoked: false,
            master_key_encrypted_key_store_key: None,
            drive_grants,
            permission_set,
        }
    }

    /// Open the key-store key with the owner's master key.
    pub fn key_store_key(&self, master_key: &SymmetricKey) -> Result<SymmetricKey> {
        let envelope = self
            .master_key_encrypted_key_store_key
            .as_ref()
            .ok_or(GrantsError::MissingKeyStoreKey)?;
        Ok(envelope.open(master_key)?)
    }

    /// Fail with `GrantRevoked` if revoked.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_revoked {
            return Err(GrantsError::GrantRevoked);
        }
        Ok(())
    }

    /// Mark revoked. Revocation is permanent until [`ExchangeGrant::reinstate`].
    pub fn revoke(&mut self, now: UnixTimeMillis) {
        self.is_revoked = true;
        self.modified = now;
    }

    /// Clear the revoked flag (an owner re-allowing an app).
    pub fn reinstate(&mut self, now: UnixTimeMillis) {
        self.is_revoked = false;
        self.modified = now;
    }

    /// The grant on `drive`, if any.
    pub fn drive_grant(&self, drive: &TargetDrive) -> Option<&DriveGrant> {
        self.drive_grants.iter().find(|g| g.target_drive() == drive)
    }

    /// Whether this grant allows `permission` on `drive`.
    pub fn allows(&self, drive: &TargetDrive, permission: DrivePermission) -> bool {
        !self.is_revoked
            && self
                .drive_grant(drive)
                .is_some_and(|g| g.permission().contains(permission))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::StorageDrive;

    fn sample(master: &SymmetricKey, ksk: &SymmetricKey) -> (ExchangeGrant, StorageDrive) {
        let drive = StorageDrive::create(TargetDrive::named("notes", "docs"), "Notes", master, false, false)
            .unwrap();
        let dg = DriveGrant::create(&drive, DrivePermission::READ, ksk, Some(master)).unwrap();
        let grant = ExchangeGrant::new(ksk, Some(master), vec![dg], PermissionSet::new(), 1000).unwrap();
        (grant, drive)
    }

    #[test]
    fn test_key_store_key_roundtrip() {
        let master = SymmetricKey::generate();
        let ksk = SymmetricKey::generate();
        let (grant, _) = sample(&master, &ksk);

        assert_eq!(grant.key_store_key(&master).unwrap(), ksk);
        assert!(grant.key_store_key(&SymmetricKey::generate()).is_err());
    }

    #[test]
    fn test_shell_has_no_key() {
        let grant = ExchangeGrant::shell(vec![], PermissionSet::new(), 5);
        assert!(matches!(
            grant.key_store_key(&SymmetricKey::generate()),
            Err(GrantsError::MissingKeyStoreKey)
        ));
    }

    #[test]
    fn test_revoke_is_sticky() {
        let master = SymmetricKey::generate();
        let ksk = SymmetricKey::generate();
        let (mut grant, drive) = sample(&master, &ksk);

        assert!(grant.allows(&drive.target_drive, DrivePermission::READ));
        grant.revoke(2000);
        assert!(matches!(grant.ensure_active(), Err(GrantsError::GrantRevoked)));
        assert!(!grant.allows(&drive.target_drive, DrivePermission::READ));
        assert_eq!(grant.modified, 2000);

        grant.reinstate(3000);
        assert!(grant.ensure_active().is_ok());
    }

    #[test]
    fn test_allows_checks_flags() {
        let master = SymmetricKey::generate();
        let ksk = SymmetricKey::generate();
        let (grant, drive) = sample(&master, &ksk);

        assert!(!grant.allows(&drive.target_drive, DrivePermission::WRITE));
        assert!(!grant.allows(&TargetDrive::chat(), DrivePermission::READ));
    }

    #[test]
    fn test_cbor_roundtrip() {
        let master = SymmetricKey::generate();
        let ksk = SymmetricKey::generate();
        let (grant, _) = sample(&master, &ksk);
        assert_eq!(ExchangeGrant::from_bytes(&grant.to_bytes()).unwrap(), grant);
    }
}
