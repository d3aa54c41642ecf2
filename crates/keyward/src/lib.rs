//! # Keyward
//!
//! Capability issuance for a multi-tenant identity host: who may read or
//! write which drives, and the key material that makes it enforceable.
//!
//! ## Overview
//!
//! Access is delegated through exchange grants. A grant seals a key-store
//! key under the owner's master key and, for each drive it covers, seals
//! that drive's storage key under the key-store key. Outside parties hold
//! a client access token whose half key recombines with the server-held
//! registration; nothing on the server alone can open what the token
//! protects.
//!
//! - **Exchange grants**: creation, persistence, revocation
//! - **Client tokens**: issuance and validation of split credentials
//! - **Circles**: reusable grant templates, materialized per member
//! - **Key lists**: rotating offline encryption and signing keys
//! - **Recipients**: sealing payloads for remote identities' public keys
//!
//! ## Key Concepts
//!
//! - **Master key**: Held only by a logged-in owner ([`CallerContext`]).
//!   Without it grants carry permissions but no keys.
//! - **Revocation**: A revoked grant or registration never validates.
//! - **Security errors**: Carry no detail; the reason goes to the log only.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use keyward::{CallerContext, HostConfig, IdentityHost, MemoryDriveRegistry};
//! use keyward::core::{DomainName, SymmetricKey};
//! use keyward::grants::TargetDrive;
//! use keyward::peer::memory::MemoryKeyDirectory;
//! use keyward::store::SqliteStore;
//!
//! async fn example() {
//!     let master = SymmetricKey::generate();
//!     let owner = CallerContext::owner(master.clone());
//!
//!     let drives = MemoryDriveRegistry::new();
//!     drives.create_drive(&master, TargetDrive::chat(), "Chat", false, false).unwrap();
//!     drives.create_drive(&master, TargetDrive::feed(), "Feed", false, false).unwrap();
//!
//!     let host = IdentityHost::new(
//!         Arc::new(SqliteStore::open("keyward.db").unwrap()),
//!         Arc::new(drives),
//!         Arc::new(MemoryKeyDirectory::new()),
//!         HostConfig::default(),
//!     );
//!     host.initialize(&owner).await.unwrap();
//!
//!     let frodo = DomainName::parse("frodo.example.com").unwrap();
//!     let connection = host.connect_identity(&owner, &frodo, &[]).await.unwrap();
//!
//!     let access = host
//!         .validate(&connection.token.to_authentication_token())
//!         .await
//!         .unwrap();
//!     assert_eq!(access.shared_secret, connection.token.shared_secret);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `keyward::core` - Secrets, ids, key wrapping and key lists
//! - `keyward::store` - Storage abstraction and SQLite
//! - `keyward::grants` - Grant data model
//! - `keyward::peer` - Remote public-key resolution

pub mod circles;
pub mod config;
pub mod context;
pub mod drives;
pub mod error;
pub mod exchange;
pub mod host;
pub mod keys;
pub mod membership;

// Re-export component crates
pub use keyward_core as core;
pub use keyward_grants as grants;
pub use keyward_peer as peer;
pub use keyward_store as store;

pub use circles::CircleDefinitionService;
pub use config::HostConfig;
pub use context::{CallerContext, SecurityLevel};
pub use drives::{resolve_drive, DriveResolver, MemoryDriveRegistry};
pub use error::{ClientErrorCode, HostError, Result};
pub use exchange::{ExchangeGrantRequest, ExchangeGrantService, ValidatedAccess};
pub use host::{IdentityConnection, IdentityHost, IssuedAccess};
pub use keys::{PublicKeyService, OFFLINE_PRIVATE_KEY_ENCRYPTION_KEY};
pub use membership::CircleMembershipService;
