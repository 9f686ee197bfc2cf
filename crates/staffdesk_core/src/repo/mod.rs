//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define collection-oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Every entity write is a per-record statement; collections are never
//!   rewritten as a whole.
//! - Reads never fail on a single undecodable document; it is skipped and
//!   reported through the integrity scan instead.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::Collection;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod document_repo;
pub mod state_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for document persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Serialization(serde_json::Error),
    /// A document with the same id already exists in the collection.
    DuplicateId {
        collection: Collection,
        id: String,
    },
    /// Concurrent writers kept changing the record during an update.
    Conflict {
        collection: Collection,
        id: String,
    },
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "document serialization failed: {err}"),
            Self::DuplicateId { collection, id } => write!(
                f,
                "document `{id}` already exists in `{}`",
                collection.storage_key()
            ),
            Self::Conflict { collection, id } => write!(
                f,
                "document `{id}` in `{}` changed concurrently; update abandoned",
                collection.storage_key()
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "document repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid document data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Rejects connections that have not been migrated by `db::open_db*`.
pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version = current_user_version(conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
