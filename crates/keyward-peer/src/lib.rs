//! # Keyward Peer
//!
//! Resolution of remote identities' public keys.
//!
//! ## Overview
//!
//! To seal a payload for another identity the host needs that identity's
//! current offline public key. Keys are fetched through a
//! [`PublicKeyTransport`] and kept in a [`RemoteKeyCache`] with expiry.
//! Every fetch is bounded by a deadline.
//!
//! ## Key Types
//!
//! - [`PublicKeyTransport`] - Outbound lookup of a remote's published key
//! - [`RemoteKeyCache`] - Serialized get-or-fetch cache with TTL
//! - [`RemotePublicKey`] - Published key, checksum and expiry
//! - [`memory::MemoryKeyDirectory`] - In-memory transport for tests

pub mod cache;
pub mod error;
pub mod messages;
pub mod transport;

pub use cache::{CacheConfig, RemoteKeyCache};
pub use error::{PeerError, Result};
pub use messages::RemotePublicKey;
pub use transport::{memory, PublicKeyTransport};
