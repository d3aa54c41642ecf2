//! Proptest generators for property-based testing.

use proptest::prelude::*;

use keyward_core::{CircleId, DomainName, SymmetricKey, UnixTimeMillis};
use keyward_grants::{
    CircleDefinition, CreateCircleRequest, DriveGrantRequest, DrivePermission, PermissionKey,
    PermissionSet, TargetDrive,
};

/// Every permission key the host knows.
pub const ALL_PERMISSION_KEYS: &[i32] = &[
    PermissionKey::READ_CONNECTIONS,
    PermissionKey::READ_CONNECTION_REQUESTS,
    PermissionKey::READ_CIRCLE_MEMBERSHIP,
    PermissionKey::READ_WHO_I_FOLLOW,
    PermissionKey::READ_MY_FOLLOWERS,
    PermissionKey::MANAGE_FEED,
    PermissionKey::SEND_PUSH_NOTIFICATIONS,
    PermissionKey::USE_TRANSIT_READ,
    PermissionKey::USE_TRANSIT_WRITE,
    PermissionKey::PUBLISH_STATIC_CONTENT,
];

/// Generate a random symmetric key.
pub fn symmetric_key() -> impl Strategy<Value = SymmetricKey> {
    any::<[u8; 32]>().prop_map(SymmetricKey::from_bytes)
}

/// Generate any combination of drive permission flags.
pub fn drive_permission() -> impl Strategy<Value = DrivePermission> {
    (0u32..16).prop_map(DrivePermission)
}

/// Generate a target drive from a small alphabet, so collisions happen.
pub fn target_drive() -> impl Strategy<Value = TargetDrive> {
    (
        prop::sample::select(vec!["photos", "notes", "inbox"]),
        prop::sample::select(vec!["media", "text"]),
    )
        .prop_map(|(alias, kind)| TargetDrive::named(alias, kind))
}

/// Generate any known permission key.
pub fn permission_key() -> impl Strategy<Value = i32> {
    prop::sample::select(ALL_PERMISSION_KEYS.to_vec())
}

/// Generate a subset of the circle-eligible permission keys.
pub fn circle_permission_keys() -> impl Strategy<Value = Vec<i32>> {
    let eligible = PermissionKey::CIRCLE_ELIGIBLE.to_vec();
    let len = eligible.len();
    prop::sample::subsequence(eligible, 0..=len)
}

/// Generate a valid domain name.
pub fn domain_name() -> impl Strategy<Value = DomainName> {
    "[a-z][a-z0-9]{0,10}\\.(com|org|net|example)"
        .prop_map(|raw| DomainName::parse(&raw).expect("generated domain is valid"))
}

/// Parameters for generating a circle.
#[derive(Debug, Clone)]
pub struct CircleParams {
    pub name: String,
    pub drives: Vec<(TargetDrive, DrivePermission)>,
    pub permission_keys: Vec<i32>,
}

impl CircleParams {
    pub fn to_request(&self) -> CreateCircleRequest {
        CreateCircleRequest {
            id: CircleId::from_name(&self.name),
            name: self.name.clone(),
            description: String::new(),
            drive_grants: self
                .drives
                .iter()
                .map(|(drive, permission)| DriveGrantRequest::new(*drive, *permission))
                .collect(),
            permissions: PermissionSet::from_keys(self.permission_keys.iter().copied()),
        }
    }
}

impl Arbitrary for CircleParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            "[A-Z][a-z]{2,15}",
            prop::collection::vec((target_drive(), drive_permission()), 0..6),
            circle_permission_keys(),
        )
            .prop_map(|(name, drives, permission_keys)| CircleParams {
                name,
                drives,
                permission_keys,
            })
            .boxed()
    }
}

/// Build a circle definition from parameters.
pub fn circle_from_params(params: &CircleParams, now: UnixTimeMillis) -> CircleDefinition {
    CircleDefinition::from_request(params.to_request(), now)
}
