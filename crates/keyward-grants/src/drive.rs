//! Target drives and drive grants.

use serde::{Deserialize, Serialize};

use keyward_core::{DriveAlias, DriveId, SymmetricEnvelope, SymmetricKey};

use crate::error::{GrantsError, Result};
use crate::permission::DrivePermission;

/// Caller-facing drive identifier. Compared by value of `(alias, drive_type)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetDrive {
    pub alias: DriveAlias,
    pub drive_type: DriveAlias,
}

impl TargetDrive {
    pub const fn new(alias: DriveAlias, drive_type: DriveAlias) -> Self {
        Self { alias, drive_type }
    }

    /// Build a target drive from readable names.
    pub fn named(alias: &str, drive_type: &str) -> Self {
        Self {
            alias: DriveAlias::from_name(alias),
            drive_type: DriveAlias::from_name(drive_type),
        }
    }

    /// Drive holding chat messages; granted to every connected identity.
    pub fn chat() -> Self {
        Self::named("chat", "system")
    }

    /// Drive receiving feed posts; granted to every connected identity.
    pub fn feed() -> Self {
        Self::named("feed", "system")
    }
}

/// A target drive paired with a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionedDrive {
    pub drive: TargetDrive,
    pub permission: DrivePermission,
}

/// A request for access to a drive, as carried by circles and grant requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriveGrantRequest {
    pub permissioned_drive: PermissionedDrive,
}

impl DriveGrantRequest {
    pub fn new(drive: TargetDrive, permission: DrivePermission) -> Self {
        Self {
            permissioned_drive: PermissionedDrive { drive, permission },
        }
    }

    pub fn drive(&self) -> &TargetDrive {
        &self.permissioned_drive.drive
    }

    pub fn permission(&self) -> DrivePermission {
        self.permissioned_drive.permission
    }
}

/// Everything the grant engine needs to know about a drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDrive {
    pub id: DriveId,
    pub target_drive: TargetDrive,
    pub name: String,

    /// The drive's storage key, sealed under the owner's master key.
    pub master_key_encrypted_storage_key: SymmetricEnvelope,

    /// Only the owner may read this drive.
    pub owner_only: bool,

    /// Readable without any grant.
    pub allow_anonymous_reads: bool,
}

impl StorageDrive {
    /// Create a drive with a fresh storage key sealed under `master_key`.
    pub fn create(
        target_drive: TargetDrive,
        name: impl Into<String>,
        master_key: &SymmetricKey,
        owner_only: bool,
        allow_anonymous_reads: bool,
    ) -> Result<Self> {
        let storage_key = SymmetricKey::generate();
        Ok(Self {
            id: DriveId::generate(),
            target_drive,
            name: name.into(),
            master_key_encrypted_storage_key: SymmetricEnvelope::seal(&storage_key, master_key)?,
            owner_only,
            allow_anonymous_reads,
        })
    }

    /// Open the storage key with the owner's master key.
    pub fn storage_key(&self, master_key: &SymmetricKey) -> Result<SymmetricKey> {
        Ok(self.master_key_encrypted_storage_key.open(master_key)?)
    }

    /// Owner-only drives accept exactly `WRITE` and nothing broader.
    pub fn check_circle_permission(&self, permission: DrivePermission) -> Result<()> {
        if self.owner_only && permission != DrivePermission::WRITE {
            return Err(GrantsError::DriveSecurityMismatch(self.target_drive));
        }
        Ok(())
    }
}

/// Access to one drive within a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveGrant {
    pub drive_id: DriveId,
    pub permissioned_drive: PermissionedDrive,

    /// Drive storage key sealed under the grant's key-store key. `None`
    /// means the grant carries permission metadata but no decrypt
    /// capability.
    pub key_store_key_encrypted_storage_key: Option<SymmetricEnvelope>,
}

impl DriveGrant {
    /// Build a grant for `drive`.
    ///
    /// The storage key is wrapped whenever a master key is present,
    /// whatever the permission: writers need it to encrypt uploads.
    pub fn create(
        drive: &StorageDrive,
        permission: DrivePermission,
        key_store_key: &SymmetricKey,
        master_key: Option<&SymmetricKey>,
    ) -> Result<Self> {
        let wrapped = match master_key {
            Some(master_key) => {
                let storage_key = drive.storage_key(master_key)?;
                Some(SymmetricEnvelope::seal(&storage_key, key_store_key)?)
            }
            None => None,
        };

        Ok(Self {
            drive_id: drive.id,
            permissioned_drive: PermissionedDrive {
                drive: drive.target_drive,
                permission,
            },
            key_store_key_encrypted_storage_key: wrapped,
        })
    }

    pub fn target_drive(&self) -> &TargetDrive {
        &self.permissioned_drive.drive
    }

    pub fn permission(&self) -> DrivePermission {
        self.permissioned_drive.permission
    }

    /// Open the storage key with the grant's key-store key.
    ///
    /// `Ok(None)` when this grant carries no storage key.
    pub fn storage_key(&self, key_store_key: &SymmetricKey) -> Result<Option<SymmetricKey>> {
        match &self.key_store_key_encrypted_storage_key {
            Some(envelope) => Ok(Some(envelope.open(key_store_key)?)),
            None => Ok(None),
        }
    }

    /// Strip decrypt capability, keeping permission metadata.
    pub fn without_key(&self) -> Self {
        Self {
            drive_id: self.drive_id,
            permissioned_drive: self.permissioned_drive,
            key_store_key_encrypted_storage_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(owner_only: bool, master: &SymmetricKey) -> StorageDrive {
        StorageDrive::create(TargetDrive::named("photos", "media"), "Photos", master, owner_only, false)
            .unwrap()
    }

    #[test]
    fn test_target_drive_value_equality() {
        assert_eq!(TargetDrive::named("a", "b"), TargetDrive::named("a", "b"));
        assert_ne!(TargetDrive::named("a", "b"), TargetDrive::named("b", "a"));
        assert_ne!(TargetDrive::chat(), TargetDrive::feed());
    }

    #[test]
    fn test_read_grant_carries_storage_key() {
        let master = SymmetricKey::generate();
        let ksk = SymmetricKey::generate();
        let d = drive(false, &master);

        let grant = DriveGrant::create(&d, DrivePermission::READ, &ksk, Some(&master)).unwrap();
        let key = grant.storage_key(&ksk).unwrap().unwrap();
        assert_eq!(key, d.storage_key(&master).unwrap());
    }

    #[test]
    fn test_no_master_no_storage_key() {
        let master = SymmetricKey::generate();
        let ksk = SymmetricKey::generate();
        let d = drive(false, &master);

        let grant = DriveGrant::create(&d, DrivePermission::READ, &ksk, None).unwrap();
        assert!(grant.key_store_key_encrypted_storage_key.is_none());
        assert!(grant.storage_key(&ksk).unwrap().is_none());
        assert_eq!(grant.permission(), DrivePermission::READ);
    }

    #[test]
    fn test_write_only_grant_carries_storage_key() {
        let master = SymmetricKey::generate();
        let ksk = SymmetricKey::generate();
        let d = drive(true, &master);

        let grant = DriveGrant::create(&d, DrivePermission::WRITE, &ksk, Some(&master)).unwrap();
        let key = grant.storage_key(&ksk).unwrap();
        assert_eq!(key, Some(d.storage_key(&master).unwrap()));
    }

    #[test]
    fn test_wrong_key_store_key_fails() {
        let master = SymmetricKey::generate();
        let ksk = SymmetricKey::generate();
        let d = drive(false, &master);

        let grant = DriveGrant::create(&d, DrivePermission::READ, &ksk, Some(&master)).unwrap();
        assert!(grant.storage_key(&SymmetricKey::generate()).is_err());
    }

    #[test]
    fn test_owner_only_circle_permission() {
        let master = SymmetricKey::generate();
        let d = drive(true, &master);

        assert!(d.check_circle_permission(DrivePermission::WRITE).is_ok());
        assert!(matches!(
            d.check_circle_permission(DrivePermission::READ),
            Err(GrantsError::DriveSecurityMismatch(_))
        ));
        assert!(d.check_circle_permission(DrivePermission::READ_WRITE).is_err());

        let open = drive(false, &master);
        assert!(open.check_circle_permission(DrivePermission::ALL).is_ok());
    }
}
