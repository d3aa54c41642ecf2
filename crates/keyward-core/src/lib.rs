//! # Keyward Core
//!
//! Pure primitives for keyward: sensitive secrets, key wrapping, and
//! rotating asymmetric key lists.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over key material.
//!
//! ## Key Types
//!
//! - [`Secret`] - Fixed-length secret, zeroed exactly once on wipe or drop
//! - [`XorSplitKey`] - Server half of a key split between server and client
//! - [`SymmetricEnvelope`] - A secret sealed under another secret (AEAD)
//! - [`RotatingKeyList`] - Newest-first key pairs with lazy rotation
//! - [`RecipientEncryptedPayload`] - Data sealed for a remote offline key
//!
//! ## Key Chain
//!
//! ```text
//! master key ──seal──▶ key-store key ──seal──▶ drive storage key
//!                            ▲
//!   access key-store key ────┘  (XOR split: server half + client half)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use keyward_core::{SymmetricEnvelope, SymmetricKey, XorSplitKey};
//!
//! let master = SymmetricKey::generate();
//! let key_store_key = SymmetricKey::generate();
//!
//! let wrapped = SymmetricEnvelope::seal(&key_store_key, &master).unwrap();
//! let opened: SymmetricKey = wrapped.open(&master).unwrap();
//! assert_eq!(opened, key_store_key);
//!
//! let (server_half, client_half) = XorSplitKey::split(&key_store_key);
//! assert_eq!(server_half.combine(&client_half), key_store_key);
//! ```

pub mod error;
pub mod keylist;
pub mod recipient;
pub mod secret;
pub mod types;
pub mod wrap;

pub use error::{CoreError, Result};
pub use keylist::{
    key_checksum, verify_signature, AsymmetricKeyRecord, KeyListConfig, KeyPurpose, KeySignature,
    RotatingKeyList,
};
pub use recipient::RecipientEncryptedPayload;
pub use secret::{Secret, SharedSecret, SymmetricKey};
pub use types::{
    now_millis, AccessRegistrationId, CircleId, DomainName, DriveAlias, DriveId, GrantId,
    KeyListId, MemberId, UnixTimeMillis,
};
pub use wrap::{EnvelopeFormat, SymmetricEnvelope, XorSplitKey};
