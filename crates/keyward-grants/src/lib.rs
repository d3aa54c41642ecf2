//! # Keyward Grants
//!
//! The grant data model and the key wrapping that flows through it.
//!
//! ## Overview
//!
//! An [`ExchangeGrant`] bundles a key-store key (sealed under the owner's
//! master key), a list of [`DriveGrant`]s (each drive's storage key sealed
//! under that key-store key) and a [`PermissionSet`]. External parties
//! never see the grant's key material directly: they hold a
//! [`ClientAccessToken`] whose half key, combined with the server-held
//! [`AccessRegistration`], unlocks a shared secret and, optionally, the
//! grant's key-store key.
//!
//! [`CircleDefinition`]s are reusable templates of drive grants and
//! permissions. Materialized for one member they become a [`CircleGrant`].
//!
//! ## Key Types
//!
//! - [`TargetDrive`] - Caller-facing drive id, compared by value
//! - [`DrivePermission`] - Read / Write / React / Comment bit flags
//! - [`DriveGrant`] - Access to one drive, optionally with its storage key
//! - [`ExchangeGrant`] - The atomic unit of delegated access
//! - [`AccessRegistration`] / [`ClientAccessToken`] - Split client credential
//! - [`CircleDefinition`] / [`CircleGrant`] / [`CircleMemberRecord`]
//! - [`StoredGrant`] - App / Identity / YouAuth grant records
//!
//! ## Usage
//!
//! ```rust
//! use keyward_core::SymmetricKey;
//! use keyward_grants::{
//!     AccessRegistration, ClientTokenType, DriveGrant, DrivePermission, ExchangeGrant,
//!     PermissionSet, StorageDrive, TargetDrive,
//! };
//!
//! let master = SymmetricKey::generate();
//! let drive = StorageDrive::create(TargetDrive::named("photos", "media"), "Photos", &master, false, false).unwrap();
//!
//! let key_store_key = SymmetricKey::generate();
//! let drive_grant = DriveGrant::create(&drive, DrivePermission::READ, &key_store_key, Some(&master)).unwrap();
//! let grant = ExchangeGrant::new(&key_store_key, Some(&master), vec![drive_grant], PermissionSet::new(), 0).unwrap();
//!
//! let (registration, token) =
//!     AccessRegistration::issue(None, Some(&key_store_key), ClientTokenType::Other, 0).unwrap();
//! let unlocked = registration.unlock(&token.access_token_half_key).unwrap();
//! assert_eq!(unlocked.shared_secret, token.shared_secret);
//! # let _ = grant;
//! ```

pub mod access;
pub mod circle;
pub mod drive;
pub mod error;
pub mod grant;
pub mod permission;
pub mod record;

pub use access::{
    AccessRegistration, ClientAccessToken, ClientAuthenticationToken, ClientTokenType,
    UnlockedAccess,
};
pub use circle::{
    merge_circle_grants, merge_drive_requests, CircleDefinition, CircleGrant, CircleGrantMap,
    CircleMemberRecord, CreateCircleRequest, SYSTEM_CIRCLE_ID,
};
pub use drive::{DriveGrant, DriveGrantRequest, PermissionedDrive, StorageDrive, TargetDrive};
pub use error::{GrantsError, Result};
pub use grant::ExchangeGrant;
pub use permission::{DrivePermission, PermissionKey, PermissionSet};
pub use record::StoredGrant;
