//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use keyward::{CallerContext, HostConfig, IdentityConnection, IdentityHost, MemoryDriveRegistry};
use keyward_core::{CircleId, DomainName, SymmetricKey};
use keyward_grants::{
    CircleDefinition, CreateCircleRequest, DriveGrantRequest, DrivePermission, PermissionSet,
    TargetDrive,
};
use keyward_peer::memory::MemoryKeyDirectory;
use keyward_store::MemoryStore;

/// A host over in-memory storage, drives and key directory.
pub type MemoryHost = IdentityHost<MemoryStore, MemoryDriveRegistry, MemoryKeyDirectory>;

/// The photos drive every fixture host has.
pub fn photos_drive() -> TargetDrive {
    TargetDrive::named("photos", "media")
}

/// An initialized host with chat, feed and photos drives.
pub struct TestHost {
    pub master: SymmetricKey,
    pub directory: Arc<MemoryKeyDirectory>,
    pub host: MemoryHost,
}

impl TestHost {
    /// Create a host with its own key directory.
    pub async fn new() -> Self {
        Self::with_directory(Arc::new(MemoryKeyDirectory::new())).await
    }

    /// Create a host resolving remote keys through `directory`.
    pub async fn with_directory(directory: Arc<MemoryKeyDirectory>) -> Self {
        let master = SymmetricKey::generate();
        let drives = MemoryDriveRegistry::new();
        for (target, name) in [
            (TargetDrive::chat(), "Chat"),
            (TargetDrive::feed(), "Feed"),
            (photos_drive(), "Photos"),
        ] {
            drives
                .create_drive(&master, target, name, false, false)
                .expect("create drive");
        }

        let host = IdentityHost::new(
            Arc::new(MemoryStore::new()),
            Arc::new(drives),
            directory.clone(),
            HostConfig::default(),
        );
        host.initialize(&CallerContext::owner(master.clone()))
            .await
            .expect("initialize host");

        Self {
            master,
            directory,
            host,
        }
    }

    /// A caller context for the owner.
    pub fn owner(&self) -> CallerContext {
        CallerContext::owner(self.master.clone())
    }

    /// Create a circle named `name` over the given drives and permission keys.
    pub async fn create_circle(
        &self,
        name: &str,
        drives: &[(TargetDrive, DrivePermission)],
        permission_keys: &[i32],
    ) -> CircleDefinition {
        self.host
            .circles()
            .create(CreateCircleRequest {
                id: CircleId::from_name(name),
                name: name.to_string(),
                description: String::new(),
                drive_grants: drives
                    .iter()
                    .map(|(drive, permission)| DriveGrantRequest::new(*drive, *permission))
                    .collect(),
                permissions: PermissionSet::from_keys(permission_keys.iter().copied()),
            })
            .await
            .expect("create circle")
    }

    /// Connect `domain` as a member of `circles`.
    pub async fn connect(&self, domain: &str, circles: &[CircleId]) -> IdentityConnection {
        let domain = DomainName::parse(domain).expect("valid domain");
        self.host
            .connect_identity(&self.owner(), &domain, circles)
            .await
            .expect("connect identity")
    }

    /// Publish this host's offline key under `domain` in the shared directory.
    pub async fn publish_offline_key(&self, domain: &DomainName) {
        let key = self
            .host
            .keys()
            .get_offline_public_key()
            .await
            .expect("offline key");
        self.directory.publish(domain.clone(), key).await;
    }
}

/// One host per domain, all publishing their offline keys to one directory.
pub async fn connected_hosts(domains: &[&str]) -> Vec<(DomainName, TestHost)> {
    let directory = Arc::new(MemoryKeyDirectory::new());
    let mut hosts = Vec::with_capacity(domains.len());
    for domain in domains {
        let domain = DomainName::parse(domain).expect("valid domain");
        let host = TestHost::with_directory(directory.clone()).await;
        host.publish_offline_key(&domain).await;
        hosts.push((domain, host));
    }
    hosts
}
