//! # Keyward Store
//!
//! Persistence for keyward. Provides a trait-based key-value interface with
//! SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The host persists four kinds of entity (exchange grants, circle
//! definitions, access registrations, key lists) as CBOR blobs in
//! independent key spaces, plus a circle membership cache indexed both by
//! circle and by member.
//!
//! ## Key Types
//!
//! - [`KeyValueStore`] - get / upsert / delete / list per [`Category`]
//! - [`CircleMemberStore`] - membership cache rows by circle and by member
//! - [`Store`] - Both of the above; what the host is generic over
//! - [`StoreExt`] - Typed CBOR access on top of [`KeyValueStore`]
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use keyward_store::{Category, SqliteStore, StoreExt};
//!
//! async fn example() {
//!     let store = SqliteStore::open("keyward.db").unwrap();
//!
//!     store.put_value(Category::KeyList, b"offline", &vec![1u8, 2, 3]).await.unwrap();
//!     let value: Option<Vec<u8>> = store.get_value(Category::KeyList, b"offline").await.unwrap();
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    decode, encode, Category, CircleMemberStore, KeyValueStore, MemberRow, Store, StoreExt,
};
