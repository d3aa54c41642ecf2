//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use keyward_core::{CircleId, MemberId};

use crate::error::Result;
use crate::traits::{Category, CircleMemberStore, KeyValueStore, MemberRow};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Values keyed by (category, key).
    values: BTreeMap<(Category, Vec<u8>), Vec<u8>>,

    /// Membership rows keyed by (circle, member).
    members: BTreeMap<(CircleId, MemberId), Vec<u8>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                values: BTreeMap::new(),
                members: BTreeMap::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, category: Category, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.values.get(&(category, key.to_vec())).cloned())
    }

    async fn upsert(&self, category: Category, key: &[u8], value: &[u8]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.values.insert((category, key.to_vec()), value.to_vec());
        Ok(())
    }

    async fn delete(&self, category: Category, key: &[u8]) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        Ok(inner.values.remove(&(category, key.to_vec())).is_some())
    }

    async fn list(&self, category: Category) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .values
            .iter()
            .filter(|((c, _), _)| *c == category)
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[async_trait]
impl CircleMemberStore for MemoryStore {
    async fn upsert_member(&self, row: MemberRow) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.members.insert((row.circle_id, row.member_id), row.data);
        Ok(())
    }

    async fn get_by_circle(&self, circle_id: &CircleId) -> Result<Vec<MemberRow>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .members
            .iter()
            .filter(|((c, _), _)| c == circle_id)
            .map(|((c, m), data)| MemberRow {
                circle_id: *c,
                member_id: *m,
                data: data.clone(),
            })
            .collect())
    }

    async fn get_by_member(&self, member_id: &MemberId) -> Result<Vec<MemberRow>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .members
            .iter()
            .filter(|((_, m), _)| m == member_id)
            .map(|((c, m), data)| MemberRow {
                circle_id: *c,
                member_id: *m,
                data: data.clone(),
            })
            .collect())
    }

    async fn delete_member(&self, circle_id: &CircleId, member_id: &MemberId) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        Ok(inner.members.remove(&(*circle_id, *member_id)).is_some())
    }

    async fn delete_by_member(&self, member_id: &MemberId) -> Result<usize> {
        let mut inner = self.inner.write().unwrap();
        let before = inner.members.len();
        inner.members.retain(|(_, m), _| m != member_id);
        Ok(before - inner.members.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;

    #[tokio::test]
    async fn test_upsert_get_delete() {
        let store = MemoryStore::new();

        store.upsert(Category::ExchangeGrant, b"a", b"one").await.unwrap();
        assert_eq!(
            store.get(Category::ExchangeGrant, b"a").await.unwrap(),
            Some(b"one".to_vec())
        );

        // Replace
        store.upsert(Category::ExchangeGrant, b"a", b"two").await.unwrap();
        assert_eq!(
            store.get(Category::ExchangeGrant, b"a").await.unwrap(),
            Some(b"two".to_vec())
        );

        assert!(store.delete(Category::ExchangeGrant, b"a").await.unwrap());
        assert!(!store.delete(Category::ExchangeGrant, b"a").await.unwrap());
        assert!(store.get(Category::ExchangeGrant, b"a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_categories_are_isolated() {
        let store = MemoryStore::new();
        store.upsert(Category::ExchangeGrant, b"k", b"grant").await.unwrap();
        store.upsert(Category::KeyList, b"k", b"keys").await.unwrap();

        let grants = store.list(Category::ExchangeGrant).await.unwrap();
        assert_eq!(grants, vec![(b"k".to_vec(), b"grant".to_vec())]);
        assert!(store.list(Category::CircleDefinition).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_typed_values() {
        let store = MemoryStore::new();
        store
            .put_value(Category::CircleDefinition, b"x", &("name".to_string(), 7u32))
            .await
            .unwrap();

        let value: Option<(String, u32)> =
            store.get_value(Category::CircleDefinition, b"x").await.unwrap();
        assert_eq!(value, Some(("name".to_string(), 7)));
    }

    #[tokio::test]
    async fn test_membership_index() {
        let store = MemoryStore::new();
        let c1 = CircleId::from_bytes([1; 16]);
        let c2 = CircleId::from_bytes([2; 16]);
        let m1 = MemberId::from_bytes([0xa; 16]);
        let m2 = MemberId::from_bytes([0xb; 16]);

        for (c, m) in [(c1, m1), (c1, m2), (c2, m1)] {
            store
                .upsert_member(MemberRow {
                    circle_id: c,
                    member_id: m,
                    data: vec![],
                })
                .await
                .unwrap();
        }

        assert_eq!(store.get_by_circle(&c1).await.unwrap().len(), 2);
        assert_eq!(store.get_by_member(&m1).await.unwrap().len(), 2);

        assert_eq!(store.delete_by_member(&m1).await.unwrap(), 2);
        assert!(store.get_by_member(&m1).await.unwrap().is_empty());
        assert_eq!(store.get_by_circle(&c1).await.unwrap().len(), 1);

        assert!(store.delete_member(&c1, &m2).await.unwrap());
        assert!(store.get_by_circle(&c1).await.unwrap().is_empty());
    }
}
