//! End-to-end flows through the identity host.

use std::sync::Arc;

use keyward::core::{CircleId, DomainName, SymmetricKey};
use keyward::grants::{
    CreateCircleRequest, DriveGrantRequest, DrivePermission, PermissionKey, PermissionSet,
    TargetDrive, SYSTEM_CIRCLE_ID,
};
use keyward::peer::memory::MemoryKeyDirectory;
use keyward::store::{MemoryStore, SqliteStore, Store};
use keyward::{
    CallerContext, ClientErrorCode, DriveResolver, ExchangeGrantRequest, HostConfig, IdentityHost,
    MemoryDriveRegistry,
};

type MemoryHost = IdentityHost<MemoryStore, MemoryDriveRegistry, MemoryKeyDirectory>;

fn photos() -> TargetDrive {
    TargetDrive::named("photos", "media")
}

fn drives(master: &SymmetricKey) -> MemoryDriveRegistry {
    let drives = MemoryDriveRegistry::new();
    drives.create_drive(master, TargetDrive::chat(), "Chat", false, false).unwrap();
    drives.create_drive(master, TargetDrive::feed(), "Feed", false, false).unwrap();
    drives.create_drive(master, photos(), "Photos", false, false).unwrap();
    drives
}

async fn host_over<S: Store>(store: Arc<S>, master: &SymmetricKey) -> IdentityHost<S, MemoryDriveRegistry, MemoryKeyDirectory> {
    let _ = tracing_subscriber::fmt::try_init();
    let host = IdentityHost::new(
        store,
        Arc::new(drives(master)),
        Arc::new(MemoryKeyDirectory::new()),
        HostConfig::default(),
    );
    host.initialize(&CallerContext::owner(master.clone())).await.unwrap();
    host
}

async fn memory_host(master: &SymmetricKey) -> MemoryHost {
    host_over(Arc::new(MemoryStore::new()), master).await
}

async fn create_friends(host: &MemoryHost) -> CircleId {
    host.circles()
        .create(CreateCircleRequest {
            id: CircleId::from_name("friends"),
            name: "Friends".into(),
            description: "Read my photos".into(),
            drive_grants: vec![DriveGrantRequest::new(photos(), DrivePermission::READ)],
            permissions: PermissionSet::from_keys([PermissionKey::READ_CONNECTIONS]),
        })
        .await
        .unwrap()
        .id
}

fn frodo() -> DomainName {
    DomainName::parse("frodo.example.com").unwrap()
}

#[tokio::test]
async fn test_circle_to_validated_storage_key() {
    let master = SymmetricKey::generate();
    let host = memory_host(&master).await;
    let owner = CallerContext::owner(master.clone());
    let friends = create_friends(&host).await;

    let connection = host.connect_identity(&owner, &frodo(), &[friends]).await.unwrap();
    let access = host
        .validate(&connection.token.to_authentication_token())
        .await
        .unwrap();

    assert_eq!(access.shared_secret, connection.token.shared_secret);

    let drive_id = host.drives().resolve_drive_id(&photos()).await.unwrap().unwrap();
    let drive = host.drives().get_drive(&drive_id).await.unwrap();
    let expected = drive.storage_key(&master).unwrap();
    assert_eq!(access.storage_key(&photos()).unwrap(), Some(expected));

    let grant = access.grant.as_ref().unwrap().grant();
    assert!(grant.permission_set.has_key(PermissionKey::READ_CONNECTIONS));
}

#[tokio::test]
async fn test_write_only_drive_carries_storage_key() {
    let master = SymmetricKey::generate();
    let host = memory_host(&master).await;
    let owner = CallerContext::owner(master.clone());

    let connection = host.connect_identity(&owner, &frodo(), &[]).await.unwrap();
    let access = host
        .validate(&connection.token.to_authentication_token())
        .await
        .unwrap();

    assert!(access.allows(&TargetDrive::chat(), DrivePermission::WRITE));
    assert!(!access.allows(&TargetDrive::chat(), DrivePermission::READ));

    let drive_id = host.drives().resolve_drive_id(&TargetDrive::chat()).await.unwrap().unwrap();
    let chat = host.drives().get_drive(&drive_id).await.unwrap();
    assert_eq!(
        access.storage_key(&TargetDrive::chat()).unwrap(),
        Some(chat.storage_key(&master).unwrap())
    );
}

#[tokio::test]
async fn test_write_only_app_grant_carries_storage_key() {
    let master = SymmetricKey::generate();
    let host = memory_host(&master).await;
    let owner = CallerContext::owner(master.clone());

    let request = ExchangeGrantRequest::new(
        vec![DriveGrantRequest::new(TargetDrive::chat(), DrivePermission::WRITE)],
        PermissionSet::new(),
    );
    let (grant, key_store_key) = host
        .exchange()
        .create_exchange_grant(&owner, &request)
        .await
        .unwrap();

    let chat = grant.drive_grant(&TargetDrive::chat()).unwrap();
    assert!(chat.storage_key(&key_store_key).unwrap().is_some());
}

#[tokio::test]
async fn test_disabled_circle_grants_nothing_on_connect() {
    let master = SymmetricKey::generate();
    let host = memory_host(&master).await;
    let owner = CallerContext::owner(master);
    let friends = create_friends(&host).await;
    host.circles().disable(&friends).await.unwrap();

    let connection = host.connect_identity(&owner, &frodo(), &[friends]).await.unwrap();
    let access = host
        .validate(&connection.token.to_authentication_token())
        .await
        .unwrap();

    assert!(!access.allows(&photos(), DrivePermission::READ));
    assert_eq!(access.storage_key(&photos()).unwrap(), None);
    let grant = access.grant.as_ref().unwrap().grant();
    assert!(!grant.permission_set.has_key(PermissionKey::READ_CONNECTIONS));
    // The system circle still applies.
    assert!(access.allows(&TargetDrive::chat(), DrivePermission::WRITE));
}

#[tokio::test]
async fn test_disabling_circle_narrows_existing_token() {
    let master = SymmetricKey::generate();
    let host = memory_host(&master).await;
    let owner = CallerContext::owner(master);
    let friends = create_friends(&host).await;

    let connection = host.connect_identity(&owner, &frodo(), &[friends]).await.unwrap();
    let token = connection.token.to_authentication_token();
    assert!(host.validate(&token).await.unwrap().allows(&photos(), DrivePermission::READ));

    host.circles().disable(&friends).await.unwrap();
    let access = host.validate(&token).await.unwrap();
    assert!(!access.allows(&photos(), DrivePermission::READ));
    assert_eq!(access.storage_key(&photos()).unwrap(), None);
    assert!(access.allows(&TargetDrive::feed(), DrivePermission::WRITE));

    host.circles().enable(&friends).await.unwrap();
    let access = host.validate(&token).await.unwrap();
    assert!(access.allows(&photos(), DrivePermission::READ));
    assert!(access.storage_key(&photos()).unwrap().is_some());
}

#[tokio::test]
async fn test_disabled_circle_narrows_youauth_token() {
    let master = SymmetricKey::generate();
    let host = memory_host(&master).await;
    let owner = CallerContext::owner(master);
    let friends = create_friends(&host).await;

    let issued = host
        .register_youauth_domain(&owner, &frodo(), &[friends])
        .await
        .unwrap();
    host.circles().disable(&friends).await.unwrap();

    let access = host
        .validate(&issued.token.to_authentication_token())
        .await
        .unwrap();
    assert!(!access.allows(&photos(), DrivePermission::READ));
}

#[tokio::test]
async fn test_disconnect_revokes_permanently() {
    let master = SymmetricKey::generate();
    let host = memory_host(&master).await;
    let owner = CallerContext::owner(master);
    let friends = create_friends(&host).await;

    let connection = host.connect_identity(&owner, &frodo(), &[friends]).await.unwrap();
    let token = connection.token.to_authentication_token();
    host.validate(&token).await.unwrap();

    host.disconnect_identity(&frodo(), &connection.grant_id).await.unwrap();

    for _ in 0..3 {
        assert!(host.validate(&token).await.unwrap_err().is_security());
    }
    assert!(host.membership().get_circles_by_domain(&frodo()).await.unwrap().is_empty());
    assert!(host.membership().get_circle_members(&friends).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_revoked_registration_fails_while_grant_lives() {
    let master = SymmetricKey::generate();
    let host = memory_host(&master).await;
    let owner = CallerContext::owner(master);

    let connection = host.connect_identity(&owner, &frodo(), &[]).await.unwrap();
    let second = host
        .exchange()
        .register_client(&owner, &connection.grant_id, keyward::grants::ClientTokenType::Other)
        .await
        .unwrap();

    host.exchange()
        .revoke_access_registration(&connection.token.id)
        .await
        .unwrap();

    assert!(host
        .validate(&connection.token.to_authentication_token())
        .await
        .unwrap_err()
        .is_security());
    host.validate(&second.to_authentication_token()).await.unwrap();
}

#[tokio::test]
async fn test_membership_recorded_for_every_circle() {
    let master = SymmetricKey::generate();
    let host = memory_host(&master).await;
    let owner = CallerContext::owner(master);
    let friends = create_friends(&host).await;

    let connection = host.connect_identity(&owner, &frodo(), &[friends]).await.unwrap();
    assert_eq!(connection.circle_grants.len(), 2);

    let mut circles: Vec<CircleId> = host
        .membership()
        .get_circles_by_domain(&frodo())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.circle_id)
        .collect();
    circles.sort();
    let mut expected = vec![friends, SYSTEM_CIRCLE_ID];
    expected.sort();
    assert_eq!(circles, expected);

    let err = host.membership().delete_circle(&friends).await.unwrap_err();
    assert_eq!(err.code(), Some(ClientErrorCode::CannotDeleteCircleWithMembers));
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let master = SymmetricKey::generate();
    let host = memory_host(&master).await;
    let owner = CallerContext::owner(master);

    host.initialize(&owner).await.unwrap();
    host.initialize(&owner).await.unwrap();

    let circles = host.circles().get_circles(true).await.unwrap();
    assert_eq!(circles.len(), 1);
    assert!(circles[0].is_system());
}

#[tokio::test]
async fn test_app_registration_requires_owner() {
    let master = SymmetricKey::generate();
    let host = memory_host(&master).await;
    let request = ExchangeGrantRequest::new(
        vec![DriveGrantRequest::new(photos(), DrivePermission::READ)],
        PermissionSet::new(),
    );

    let err = host
        .register_app(&CallerContext::system(), "com.example.app", "App", &request)
        .await
        .unwrap_err();
    assert!(err.is_security());
    assert!(host.exchange().list_grants().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_revoked_app_can_be_reinstated() {
    let master = SymmetricKey::generate();
    let host = memory_host(&master).await;
    let owner = CallerContext::owner(master);
    let request = ExchangeGrantRequest::new(
        vec![DriveGrantRequest::new(photos(), DrivePermission::READ_WRITE)],
        PermissionSet::new(),
    );

    let issued = host
        .register_app(&owner, "com.example.gallery", "Gallery", &request)
        .await
        .unwrap();
    let token = issued.token.to_authentication_token();

    host.exchange().revoke_grant(&issued.grant_id).await.unwrap();
    assert!(host.validate(&token).await.unwrap_err().is_security());

    host.exchange().reinstate_grant(&issued.grant_id).await.unwrap();
    let access = host.validate(&token).await.unwrap();
    assert!(access.allows(&photos(), DrivePermission::WRITE));
}

#[tokio::test]
async fn test_youauth_domain_not_a_member() {
    let master = SymmetricKey::generate();
    let host = memory_host(&master).await;
    let owner = CallerContext::owner(master);
    let friends = create_friends(&host).await;

    let issued = host
        .register_youauth_domain(&owner, &frodo(), &[friends])
        .await
        .unwrap();
    let access = host
        .validate(&issued.token.to_authentication_token())
        .await
        .unwrap();

    assert!(access.allows(&photos(), DrivePermission::READ));
    assert!(host.membership().get_circles_by_domain(&frodo()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sqlite_host_survives_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("keyward.db");
    let master = SymmetricKey::generate();
    let owner = CallerContext::owner(master.clone());

    let token = {
        let host = host_over(Arc::new(SqliteStore::open(&path)?), &master).await;
        let request = ExchangeGrantRequest::new(
            vec![DriveGrantRequest::new(TargetDrive::chat(), DrivePermission::READ)],
            PermissionSet::new(),
        );
        let issued = host.register_app(&owner, "com.example.chat", "Chat", &request).await?;
        issued.token.to_authentication_token()
    };

    let store = Arc::new(SqliteStore::open(&path)?);
    let host = IdentityHost::new(
        store,
        Arc::new(MemoryDriveRegistry::new()),
        Arc::new(MemoryKeyDirectory::new()),
        HostConfig::default(),
    );
    let access = host.validate(&token).await?;
    assert!(access.allows(&TargetDrive::chat(), DrivePermission::READ));
    assert!(access.storage_key(&TargetDrive::chat())?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_payload_between_hosts() {
    let directory = Arc::new(MemoryKeyDirectory::new());
    let sam_master = SymmetricKey::generate();
    let sam = IdentityHost::new(
        Arc::new(MemoryStore::new()),
        Arc::new(drives(&sam_master)),
        directory.clone(),
        HostConfig::default(),
    );
    sam.initialize(&CallerContext::owner(sam_master)).await.unwrap();

    let frodo_master = SymmetricKey::generate();
    let frodo_host = memory_host(&frodo_master).await;
    directory
        .publish(frodo(), frodo_host.keys().get_offline_public_key().await.unwrap())
        .await;

    let sealed = sam
        .keys()
        .encrypt_payload_for_recipient(&frodo(), b"the ring", None)
        .await
        .unwrap();
    let opened = frodo_host.keys().decrypt_payload(&sealed).await.unwrap();
    assert_eq!(opened.as_slice(), b"the ring");
}
