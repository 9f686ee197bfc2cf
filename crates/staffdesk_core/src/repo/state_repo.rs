//! Singleton application state (sign-in session) and collection revisions.

use super::{ensure_connection_ready, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

/// Storage key of the persisted sign-in session.
pub const SESSION_KEY: &str = "app_session";

/// Repository interface for keyed singleton values.
pub trait StateRepository {
    fn get_value(&self, key: &str) -> RepoResult<Option<String>>;
    fn put_value(&self, key: &str, value: &str) -> RepoResult<()>;
    /// Returns `false` when nothing was stored under `key`.
    fn remove_value(&self, key: &str) -> RepoResult<bool>;
}

pub struct SqliteStateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStateRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn new_unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl StateRepository for SqliteStateRepository<'_> {
    fn get_value(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put_value(&self, key: &str, value: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO app_state (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_value(&self, key: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM app_state WHERE key = ?1;", [key])?;
        Ok(changed > 0)
    }
}

/// Reads the write counter of every storage key touched so far.
pub fn load_revisions(conn: &Connection) -> RepoResult<BTreeMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT collection, revision FROM collection_revisions;")?;
    let mut rows = stmt.query([])?;
    let mut revisions = BTreeMap::new();
    while let Some(row) = rows.next()? {
        revisions.insert(row.get::<_, String>(0)?, row.get::<_, i64>(1)?);
    }
    Ok(revisions)
}
