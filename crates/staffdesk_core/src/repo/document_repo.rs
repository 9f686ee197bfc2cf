//! Collection repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over one collection of JSON entity documents.
//! - Apply partial updates as shallow merges with optimistic revision checks.
//!
//! # Invariants
//! - Documents are keyed by `(collection, id)`; `id` never changes on update.
//! - A blank `password` in a patch never replaces the stored password.
//! - List order is insertion order.

use super::{ensure_connection_ready, RepoError, RepoResult};
use crate::model::{Collection, Entity};
use log::warn;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::Serialize;
use serde_json::{Map, Value};
use std::marker::PhantomData;

const UPDATE_MAX_ATTEMPTS: usize = 3;
const PROTECTED_BLANK_FIELDS: &[&str] = &["password"];

/// JSON object of fields to merge over a stored document.
pub type DocumentPatch = Map<String, Value>;

/// Repository interface for one entity collection.
pub trait DocumentRepository<T: Entity> {
    /// Lists every decodable document in insertion order.
    fn list(&self) -> RepoResult<Vec<T>>;
    fn get(&self, id: &str) -> RepoResult<Option<T>>;
    /// Inserts a new document; fails with `DuplicateId` when the id is taken.
    fn insert(&self, entity: &T) -> RepoResult<()>;
    /// Inserts or fully replaces the document with the same id.
    fn upsert(&self, entity: &T) -> RepoResult<()>;
    /// Merges `patch` over the stored document. `None` when the id is unknown.
    fn update(&self, id: &str, patch: &DocumentPatch) -> RepoResult<Option<T>>;
    /// Removes one document. `false` when the id is unknown.
    fn delete(&self, id: &str) -> RepoResult<bool>;
    /// Exact match on one top-level string field.
    fn find_by_field(&self, field: &str, value: &str) -> RepoResult<Vec<T>>;
    /// Case-insensitive match on one top-level string field.
    fn find_by_field_ci(&self, field: &str, value: &str) -> RepoResult<Vec<T>>;
    fn count(&self) -> RepoResult<usize>;
}

/// One stored document that no longer decodes into its entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptDocument {
    pub collection: Collection,
    pub id: String,
    pub error: String,
}

/// SQLite-backed document repository for entity type `T`.
pub struct SqliteDocumentRepository<'conn, T> {
    conn: &'conn Connection,
    _entity: PhantomData<fn() -> T>,
}

impl<'conn, T: Entity> SqliteDocumentRepository<'conn, T> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self::new_unchecked(conn))
    }

    /// Skips the schema check; callers hold a connection already verified.
    pub(crate) fn new_unchecked(conn: &'conn Connection) -> Self {
        Self {
            conn,
            _entity: PhantomData,
        }
    }

    fn key() -> &'static str {
        T::COLLECTION.storage_key()
    }

    /// Lists documents that fail to decode as `T`.
    pub fn scan_corrupt(&self) -> RepoResult<Vec<CorruptDocument>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, body FROM documents WHERE collection = ?1 ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query([Self::key()])?;
        let mut corrupt = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let body: String = row.get(1)?;
            if let Err(err) = serde_json::from_str::<T>(&body) {
                corrupt.push(CorruptDocument {
                    collection: T::COLLECTION,
                    id,
                    error: err.to_string(),
                });
            }
        }
        Ok(corrupt)
    }

    fn query_documents(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> RepoResult<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let body: String = row.get(1)?;
            match serde_json::from_str::<T>(&body) {
                Ok(document) => documents.push(document),
                Err(err) => warn!(
                    "event=document_decode module=repo status=skipped collection={} id={} error={}",
                    Self::key(),
                    id,
                    err
                ),
            }
        }
        Ok(documents)
    }

    fn load_raw(&self, id: &str) -> RepoResult<Option<(Value, i64)>> {
        let row = self
            .conn
            .query_row(
                "SELECT body, revision FROM documents WHERE collection = ?1 AND id = ?2;",
                params![Self::key(), id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        match row {
            Some((body, revision)) => Ok(Some((serde_json::from_str(&body)?, revision))),
            None => Ok(None),
        }
    }
}

impl<T: Entity> DocumentRepository<T> for SqliteDocumentRepository<'_, T> {
    fn list(&self) -> RepoResult<Vec<T>> {
        self.query_documents(
            "SELECT id, body FROM documents WHERE collection = ?1 ORDER BY rowid ASC;",
            &[&Self::key()],
        )
    }

    fn get(&self, id: &str) -> RepoResult<Option<T>> {
        let documents = self.query_documents(
            "SELECT id, body FROM documents WHERE collection = ?1 AND id = ?2;",
            &[&Self::key(), &id],
        )?;
        Ok(documents.into_iter().next())
    }

    fn insert(&self, entity: &T) -> RepoResult<()> {
        let id = validated_id(entity)?;
        let body = serde_json::to_string(entity)?;
        let result = self.conn.execute(
            "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3);",
            params![Self::key(), id, body],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                Err(RepoError::DuplicateId {
                    collection: T::COLLECTION,
                    id: id.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn upsert(&self, entity: &T) -> RepoResult<()> {
        let id = validated_id(entity)?;
        let body = serde_json::to_string(entity)?;
        self.conn.execute(
            "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, id) DO UPDATE SET
                body = excluded.body,
                revision = documents.revision + 1,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![Self::key(), id, body],
        )?;
        Ok(())
    }

    fn update(&self, id: &str, patch: &DocumentPatch) -> RepoResult<Option<T>> {
        for _ in 0..UPDATE_MAX_ATTEMPTS {
            let Some((mut document, revision)) = self.load_raw(id)? else {
                return Ok(None);
            };

            merge_patch(&mut document, patch)?;
            let merged: T = serde_json::from_value(document)?;
            if patch.is_empty() {
                return Ok(Some(merged));
            }

            let body = serde_json::to_string(&merged)?;
            let changed = self.conn.execute(
                "UPDATE documents
                 SET
                    body = ?1,
                    revision = revision + 1,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE collection = ?2 AND id = ?3 AND revision = ?4;",
                params![body, Self::key(), id, revision],
            )?;
            if changed == 1 {
                return Ok(Some(merged));
            }

            warn!(
                "event=document_update module=repo status=retry collection={} id={} revision={}",
                Self::key(),
                id,
                revision
            );
        }

        Err(RepoError::Conflict {
            collection: T::COLLECTION,
            id: id.to_string(),
        })
    }

    fn delete(&self, id: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2;",
            params![Self::key(), id],
        )?;
        Ok(changed > 0)
    }

    fn find_by_field(&self, field: &str, value: &str) -> RepoResult<Vec<T>> {
        let path = field_path(field)?;
        self.query_documents(
            &format!(
                "SELECT id, body FROM documents
                 WHERE collection = ?1 AND json_extract(body, '{path}') = ?2
                 ORDER BY rowid ASC;"
            ),
            &[&Self::key(), &value],
        )
    }

    fn find_by_field_ci(&self, field: &str, value: &str) -> RepoResult<Vec<T>> {
        let path = field_path(field)?;
        self.query_documents(
            &format!(
                "SELECT id, body FROM documents
                 WHERE collection = ?1 AND lower(json_extract(body, '{path}')) = lower(?2)
                 ORDER BY rowid ASC;"
            ),
            &[&Self::key(), &value.trim()],
        )
    }

    fn count(&self) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1;",
            [Self::key()],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative document count {count}")))
    }
}

/// Serializes a typed patch struct into a document patch.
pub fn to_patch<P: Serialize>(patch: &P) -> RepoResult<DocumentPatch> {
    match serde_json::to_value(patch)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(DocumentPatch::new()),
        other => Err(RepoError::InvalidData(format!(
            "patch must serialize to an object, got `{other}`"
        ))),
    }
}

/// Shallow-merges `patch` into `document`.
///
/// `id` is immutable and blank protected fields keep their previous value.
pub fn merge_patch(document: &mut Value, patch: &DocumentPatch) -> RepoResult<()> {
    let Value::Object(target) = document else {
        return Err(RepoError::InvalidData(
            "stored document is not a JSON object".to_string(),
        ));
    };

    for (field, value) in patch {
        if field == "id" {
            continue;
        }
        if PROTECTED_BLANK_FIELDS.contains(&field.as_str())
            && value.as_str().is_some_and(|text| text.trim().is_empty())
        {
            continue;
        }
        target.insert(field.clone(), value.clone());
    }
    Ok(())
}

fn validated_id<T: Entity>(entity: &T) -> RepoResult<&str> {
    let id = entity.id();
    if id.trim().is_empty() {
        return Err(RepoError::InvalidData(format!(
            "document in `{}` has an empty id",
            T::COLLECTION.storage_key()
        )));
    }
    Ok(id)
}

fn field_path(field: &str) -> RepoResult<String> {
    let valid = !field.is_empty() && field.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid {
        return Err(RepoError::InvalidData(format!(
            "unsupported lookup field `{field}`"
        )));
    }
    Ok(format!("$.{field}"))
}

#[cfg(test)]
mod tests {
    use super::{field_path, merge_patch, DocumentPatch};
    use serde_json::{json, Value};

    fn patch(value: Value) -> DocumentPatch {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test patches are objects"),
        }
    }

    #[test]
    fn merge_keeps_password_when_patch_is_blank() {
        let mut document = json!({"id": "s1", "password": "old", "email": "a@x.com"});
        merge_patch(&mut document, &patch(json!({"password": "  ", "email": "b@x.com"}))).unwrap();
        assert_eq!(document["password"], "old");
        assert_eq!(document["email"], "b@x.com");

        merge_patch(&mut document, &patch(json!({"password": "new"}))).unwrap();
        assert_eq!(document["password"], "new");
    }

    #[test]
    fn merge_never_changes_id() {
        let mut document = json!({"id": "s1"});
        merge_patch(&mut document, &patch(json!({"id": "s2"}))).unwrap();
        assert_eq!(document["id"], "s1");
    }

    #[test]
    fn merge_rejects_non_object_documents() {
        let mut document = json!(["not", "an", "object"]);
        assert!(merge_patch(&mut document, &DocumentPatch::new()).is_err());
    }

    #[test]
    fn field_paths_only_accept_plain_names() {
        assert_eq!(field_path("stafferId").unwrap(), "$.stafferId");
        assert!(field_path("email') OR 1=1 --").is_err());
        assert!(field_path("").is_err());
    }
}
