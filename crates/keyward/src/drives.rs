//! Drive lookup.
//!
//! Drives live outside the grant engine. The host only needs to resolve a
//! caller-facing [`TargetDrive`] to the stored drive, and to enumerate
//! drives that allow anonymous reads.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use keyward_core::{DriveId, SymmetricKey};
use keyward_grants::{StorageDrive, TargetDrive};

use crate::error::{ClientErrorCode, HostError, Result};

/// Resolves drives for the grant engine.
#[async_trait]
pub trait DriveResolver: Send + Sync {
    /// The id of the drive addressed by `target`, if it exists.
    async fn resolve_drive_id(&self, target: &TargetDrive) -> Result<Option<DriveId>>;

    /// Load a drive. Unknown ids fail with `InvalidDrive`.
    async fn get_drive(&self, id: &DriveId) -> Result<StorageDrive>;

    /// Every drive that allows anonymous reads.
    async fn get_anonymous_drives(&self) -> Result<Vec<StorageDrive>>;
}

/// Resolve and load the drive addressed by `target`.
pub async fn resolve_drive<D: DriveResolver + ?Sized>(
    drives: &D,
    target: &TargetDrive,
) -> Result<StorageDrive> {
    match drives.resolve_drive_id(target).await? {
        Some(id) => drives.get_drive(&id).await,
        None => Err(HostError::client(
            ClientErrorCode::InvalidDrive,
            format!("no drive for {:?}", target),
        )),
    }
}

/// In-memory drive registry.
#[derive(Default)]
pub struct MemoryDriveRegistry {
    drives: RwLock<BTreeMap<DriveId, StorageDrive>>,
}

impl MemoryDriveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a drive with a fresh storage key and register it.
    pub fn create_drive(
        &self,
        master_key: &SymmetricKey,
        target: TargetDrive,
        name: &str,
        owner_only: bool,
        allow_anonymous_reads: bool,
    ) -> Result<StorageDrive> {
        let drive = StorageDrive::create(target, name, master_key, owner_only, allow_anonymous_reads)?;
        self.insert(drive.clone());
        Ok(drive)
    }

    pub fn insert(&self, drive: StorageDrive) {
        self.drives.write().unwrap().insert(drive.id, drive);
    }

    pub fn len(&self) -> usize {
        self.drives.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DriveResolver for MemoryDriveRegistry {
    async fn resolve_drive_id(&self, target: &TargetDrive) -> Result<Option<DriveId>> {
        let drives = self.drives.read().unwrap();
        Ok(drives
            .values()
            .find(|d| d.target_drive == *target)
            .map(|d| d.id))
    }

    async fn get_drive(&self, id: &DriveId) -> Result<StorageDrive> {
        let drives = self.drives.read().unwrap();
        drives.get(id).cloned().ok_or_else(|| {
            HostError::client(ClientErrorCode::InvalidDrive, format!("unknown drive {}", id))
        })
    }

    async fn get_anonymous_drives(&self) -> Result<Vec<StorageDrive>> {
        let drives = self.drives.read().unwrap();
        Ok(drives
            .values()
            .filter(|d| d.allow_anonymous_reads)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_by_target() {
        let master = SymmetricKey::generate();
        let registry = MemoryDriveRegistry::new();
        let photos = registry
            .create_drive(&master, TargetDrive::named("photos", "media"), "Photos", false, false)
            .unwrap();

        let resolved = resolve_drive(&registry, &TargetDrive::named("photos", "media"))
            .await
            .unwrap();
        assert_eq!(resolved.id, photos.id);
    }

    #[tokio::test]
    async fn test_unknown_drive() {
        let registry = MemoryDriveRegistry::new();
        let err = resolve_drive(&registry, &TargetDrive::chat()).await.unwrap_err();
        assert_eq!(err.code(), Some(ClientErrorCode::InvalidDrive));

        let err = registry.get_drive(&DriveId::generate()).await.unwrap_err();
        assert_eq!(err.code(), Some(ClientErrorCode::InvalidDrive));
    }

    #[tokio::test]
    async fn test_anonymous_drives() {
        let master = SymmetricKey::generate();
        let registry = MemoryDriveRegistry::new();
        registry
            .create_drive(&master, TargetDrive::named("public", "site"), "Public", false, true)
            .unwrap();
        registry
            .create_drive(&master, TargetDrive::named("private", "site"), "Private", false, false)
            .unwrap();

        let anonymous = registry.get_anonymous_drives().await.unwrap();
        assert_eq!(anonymous.len(), 1);
        assert_eq!(anonymous[0].name, "Public");
    }
}
