//! Store use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce validation and permission rules before persistence.
//! - Publish change notifications after successful writes.
//!
//! # Invariants
//! - Multi-record workflows run inside one immediate transaction.
//! - Notifications are published only after the transaction commits.

pub mod assignment_service;
pub mod auth_service;
pub mod calendar_service;
pub mod directory_service;
pub mod request_service;
pub mod schedule_service;
pub mod team_service;

use crate::model::{Collection, Entity};
use crate::repo::document_repo::SqliteDocumentRepository;
use crate::repo::RepoError;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for store use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Input is missing a required field or has a malformed value.
    Validation(String),
    /// Caller's role does not allow the operation.
    PermissionDenied(&'static str),
    /// Write would duplicate a unique value.
    Conflict(String),
    /// A record the operation depends on does not exist.
    NotFound {
        collection: Collection,
        id: String,
    },
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "{message}"),
            Self::PermissionDenied(message) => write!(f, "{message}"),
            Self::Conflict(message) => write!(f, "{message}"),
            Self::NotFound { collection, id } => {
                write!(f, "`{id}` not found in `{}`", collection.storage_key())
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::DuplicateId { collection, id } => Self::Conflict(format!(
                "`{id}` already exists in `{}`",
                collection.storage_key()
            )),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

pub(crate) fn documents<T: Entity>(conn: &Connection) -> SqliteDocumentRepository<'_, T> {
    SqliteDocumentRepository::new_unchecked(conn)
}

pub(crate) fn require(value: &str, field: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{field} is required")));
    }
    Ok(())
}

pub(crate) fn require_email(value: &str) -> ServiceResult<()> {
    require(value, "email")?;
    if !EMAIL_RE.is_match(value.trim()) {
        return Err(ServiceError::Validation(format!(
            "email `{}` is not a valid address",
            value.trim()
        )));
    }
    Ok(())
}

pub(crate) fn not_found<T: Entity>(id: &str) -> ServiceError {
    ServiceError::NotFound {
        collection: T::COLLECTION,
        id: id.to_string(),
    }
}
