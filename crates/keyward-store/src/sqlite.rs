//! SQLite implementation of the store traits.
//!
//! This is the persistent backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use keyward_core::{now_millis, CircleId, MemberId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Category, CircleMemberStore, KeyValueStore, MemberRow};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

fn blob_to_id<T: for<'a> TryFrom<&'a [u8]>>(bytes: &[u8], column: &str) -> Result<T> {
    T::try_from(bytes).map_err(|_| StoreError::InvalidData(format!("bad {} length", column)))
}

fn rows_to_members(rows: Vec<(Vec<u8>, Vec<u8>, Vec<u8>)>) -> Result<Vec<MemberRow>> {
    rows.into_iter()
        .map(|(circle, member, data)| {
            Ok(MemberRow {
                circle_id: blob_to_id::<CircleId>(&circle, "circle_id")?,
                member_id: blob_to_id::<MemberId>(&member, "member_id")?,
                data,
            })
        })
        .collect()
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, category: Category, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let key = key.to_vec();
        self.run(move |conn| {
            conn.query_row(
                "SELECT value FROM key_values WHERE category = ?1 AND key = ?2",
                params![category.as_u8(), key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn upsert(&self, category: Category, key: &[u8], value: &[u8]) -> Result<()> {
        let key = key.to_vec();
        let value = value.to_vec();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO key_values (category, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(category, key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![category.as_u8(), key, value, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, category: Category, key: &[u8]) -> Result<bool> {
        let key = key.to_vec();
        self.run(move |conn| {
            let n = conn.execute(
                "DELETE FROM key_values WHERE category = ?1 AND key = ?2",
                params![category.as_u8(), key],
            )?;
            Ok(n > 0)
        })
        .await
    }

    async fn list(&self, category: Category) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.run(move |conn| {
            let mut stmt =
                conn.prepare("SELECT key, value FROM key_values WHERE category = ?1 ORDER BY key")?;
            let rows = stmt
                .query_map(params![category.as_u8()], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl CircleMemberStore for SqliteStore {
    async fn upsert_member(&self, row: MemberRow) -> Result<()> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO circle_members (circle_id, member_id, data, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(circle_id, member_id) DO UPDATE SET
                     data = excluded.data,
                     updated_at = excluded.updated_at",
                params![
                    row.circle_id.as_bytes().as_slice(),
                    row.member_id.as_bytes().as_slice(),
                    row.data,
                    now_millis()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_by_circle(&self, circle_id: &CircleId) -> Result<Vec<MemberRow>> {
        let circle_id = *circle_id;
        let rows = self
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT circle_id, member_id, data FROM circle_members
                     WHERE circle_id = ?1 ORDER BY member_id",
                )?;
                let rows = stmt
                    .query_map(params![circle_id.as_bytes().as_slice()], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        rows_to_members(rows)
    }

    async fn get_by_member(&self, member_id: &MemberId) -> Result<Vec<MemberRow>> {
        let member_id = *member_id;
        let rows = self
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT circle_id, member_id, data FROM circle_members
                     WHERE member_id = ?1 ORDER BY circle_id",
                )?;
                let rows = stmt
                    .query_map(params![member_id.as_bytes().as_slice()], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        rows_to_members(rows)
    }

    async fn delete_member(&self, circle_id: &CircleId, member_id: &MemberId) -> Result<bool> {
        let circle_id = *circle_id;
        let member_id = *member_id;
        self.run(move |conn| {
            let n = conn.execute(
                "DELETE FROM circle_members WHERE circle_id = ?1 AND member_id = ?2",
                params![
                    circle_id.as_bytes().as_slice(),
                    member_id.as_bytes().as_slice()
                ],
            )?;
            Ok(n > 0)
        })
        .await
    }

    async fn delete_by_member(&self, member_id: &MemberId) -> Result<usize> {
        let member_id = *member_id;
        self.run(move |conn| {
            let n = conn.execute(
                "DELETE FROM circle_members WHERE member_id = ?1",
                params![member_id.as_bytes().as_slice()],
            )?;
            Ok(n)
        })
        .await
    }
}
