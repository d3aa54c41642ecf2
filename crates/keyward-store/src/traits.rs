//! Store traits.
//!
//! Persistence is a plain key-value store partitioned by [`Category`],
//! plus a small two-way index for the circle membership cache. Values are
//! opaque bytes; [`StoreExt`] layers CBOR encoding on top.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use keyward_core::{CircleId, MemberId};

use crate::error::{Result, StoreError};

/// Entity category. Each category is an independent key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Category {
    ExchangeGrant = 1,
    CircleDefinition = 2,
    AccessRegistration = 3,
    KeyList = 4,
}

impl Category {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Category::ExchangeGrant),
            2 => Some(Category::CircleDefinition),
            3 => Some(Category::AccessRegistration),
            4 => Some(Category::KeyList),
            _ => None,
        }
    }
}

/// A row in the circle membership cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRow {
    pub circle_id: CircleId,
    pub member_id: MemberId,
    /// Encoded cached circle grant.
    pub data: Vec<u8>,
}

/// Key-value persistence, one key space per [`Category`].
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    async fn get(&self, category: Category, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Insert or replace a value.
    async fn upsert(&self, category: Category, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a value. Returns whether a value was present.
    async fn delete(&self, category: Category, key: &[u8]) -> Result<bool>;

    /// All `(key, value)` pairs in a category, ordered by key.
    async fn list(&self, category: Category) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// The circle membership cache, indexed both by circle and by member.
#[async_trait]
pub trait CircleMemberStore: Send + Sync {
    /// Insert or replace the row for `(circle_id, member_id)`.
    async fn upsert_member(&self, row: MemberRow) -> Result<()>;

    /// All members of a circle, ordered by member id.
    async fn get_by_circle(&self, circle_id: &CircleId) -> Result<Vec<MemberRow>>;

    /// All circles a member belongs to, ordered by circle id.
    async fn get_by_member(&self, member_id: &MemberId) -> Result<Vec<MemberRow>>;

    /// Remove a member from one circle. Returns whether a row was present.
    async fn delete_member(&self, circle_id: &CircleId, member_id: &MemberId) -> Result<bool>;

    /// Remove a member from every circle. Returns the number of rows removed.
    async fn delete_by_member(&self, member_id: &MemberId) -> Result<usize>;
}

/// Everything a host needs from persistence.
pub trait Store: KeyValueStore + CircleMemberStore {}

impl<S: KeyValueStore + CircleMemberStore + ?Sized> Store for S {}

/// Encode a value as CBOR.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Decode a CBOR value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Typed access on top of [`KeyValueStore`].
pub trait StoreExt: KeyValueStore {
    /// Get and decode a value.
    fn get_value<T: DeserializeOwned + Send>(
        &self,
        category: Category,
        key: &[u8],
    ) -> impl std::future::Future<Output = Result<Option<T>>> + Send;

    /// Encode and upsert a value.
    fn put_value<T: Serialize + Sync>(
        &self,
        category: Category,
        key: &[u8],
        value: &T,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Decode every value in a category.
    fn list_values<T: DeserializeOwned + Send>(
        &self,
        category: Category,
    ) -> impl std::future::Future<Output = Result<Vec<T>>> + Send;
}

impl<S: KeyValueStore + ?Sized> StoreExt for S {
    async fn get_value<T: DeserializeOwned + Send>(
        &self,
        category: Category,
        key: &[u8],
    ) -> Result<Option<T>> {
        match self.get(category, key).await? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_value<T: Serialize + Sync>(
        &self,
        category: Category,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let bytes = encode(value)?;
        self.upsert(category, key, &bytes).await
    }

    async fn list_values<T: DeserializeOwned + Send>(&self, category: Category) -> Result<Vec<T>> {
        let rows = self.list(category).await?;
        rows.iter().map(|(_, v)| decode(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for c in [
            Category::ExchangeGrant,
            Category::CircleDefinition,
            Category::AccessRegistration,
            Category::KeyList,
        ] {
            assert_eq!(Category::from_u8(c.as_u8()), Some(c));
        }
        assert_eq!(Category::from_u8(0), None);
    }

    #[test]
    fn test_encode_decode() {
        let value = vec![1u32, 2, 3];
        let bytes = encode(&value).unwrap();
        let back: Vec<u32> = decode(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result: Result<Vec<u32>> = decode(&[0xff, 0x00]);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
