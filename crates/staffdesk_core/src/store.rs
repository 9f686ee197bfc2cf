//! Store handle: connection ownership, transactions and change propagation.
//!
//! # Responsibility
//! - Open a migrated database from `StoreConfig` and seed defaults.
//! - Hand out use-case services bound to this handle.
//! - Publish local change notifications and detect writes from other handles.
//! - Import/export legacy collection snapshots and report corrupt documents.
//!
//! # Invariants
//! - One `Store` owns exactly one SQLite connection.
//! - `poll_external_changes` never misses a commit from another connection;
//!   it may over-report a local write that raced with an external one.

use crate::config::{ConfigError, StoreConfig};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::assignment::{Assignment, AssignmentInvitation};
use crate::model::calendar::CalendarEvent;
use crate::model::request::ClientRequest;
use crate::model::schedule::{ClientAvailability, ScheduleNote};
use crate::model::staffer::Staffer;
use crate::model::team::TeamMember;
use crate::model::user::User;
use crate::model::{Collection, Entity};
use crate::notify::{ChangeBus, ChangeEvent, ChangeOrigin};
use crate::repo::document_repo::{CorruptDocument, DocumentRepository, SqliteDocumentRepository};
use crate::repo::state_repo::{load_revisions, SqliteStateRepository};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use crate::seed;
use crate::service::assignment_service::AssignmentService;
use crate::service::auth_service::AuthService;
use crate::service::calendar_service::CalendarService;
use crate::service::directory_service::DirectoryService;
use crate::service::request_service::RequestService;
use crate::service::schedule_service::ScheduleService;
use crate::service::team_service::TeamService;
use crate::service::{documents, ServiceResult};
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug)]
pub enum OpenError {
    Config(ConfigError),
    Db(DbError),
    Repo(RepoError),
}

impl Display for OpenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OpenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ConfigError> for OpenError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for OpenError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for OpenError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Outcome of importing one legacy collection snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// Array elements that did not decode or had no identity.
    pub skipped: usize,
    /// The snapshot was not a JSON array and was ignored as a whole.
    pub discarded: bool,
}

#[derive(Debug, Default)]
struct SyncState {
    data_version: i64,
    revisions: BTreeMap<String, i64>,
}

pub struct Store {
    conn: Connection,
    config: StoreConfig,
    bus: Arc<ChangeBus>,
    sync: RefCell<SyncState>,
}

impl Store {
    /// Opens the database named by `config`, applies migrations and seeds
    /// defaults when enabled.
    pub fn open(config: StoreConfig) -> Result<Self, OpenError> {
        Self::open_with_bus(config, Arc::new(ChangeBus::new()))
    }

    /// Opens a store that publishes into an existing bus.
    pub fn open_with_bus(config: StoreConfig, bus: Arc<ChangeBus>) -> Result<Self, OpenError> {
        config.validate()?;
        let conn = match &config.database_path {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        Self::from_connection(conn, config, bus)
    }

    /// Fresh in-memory store without seed data.
    pub fn open_in_memory() -> Result<Self, OpenError> {
        Self::open(StoreConfig::in_memory())
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(
        conn: Connection,
        config: StoreConfig,
        bus: Arc<ChangeBus>,
    ) -> Result<Self, OpenError> {
        ensure_connection_ready(&conn)?;
        let store = Self {
            conn,
            config,
            bus,
            sync: RefCell::new(SyncState::default()),
        };
        if store.config.seed_defaults {
            let seeded = seed::seed_defaults(&store)?;
            if seeded.users > 0 || seeded.staffers > 0 {
                info!(
                    "event=store_seed module=store status=ok users={} staffers={}",
                    seeded.users, seeded.staffers
                );
            }
        }
        store.refresh_sync_state()?;
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn change_bus(&self) -> &Arc<ChangeBus> {
        &self.bus
    }

    pub fn directory(&self) -> DirectoryService<'_> {
        DirectoryService::new(self)
    }

    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self)
    }

    pub fn requests(&self) -> RequestService<'_> {
        RequestService::new(self)
    }

    pub fn assignments(&self) -> AssignmentService<'_> {
        AssignmentService::new(self)
    }

    pub fn teams(&self) -> TeamService<'_> {
        TeamService::new(self)
    }

    pub fn schedule(&self) -> ScheduleService<'_> {
        ScheduleService::new(self)
    }

    pub fn calendar(&self) -> CalendarService<'_> {
        CalendarService::new(self)
    }

    pub(crate) fn documents<T: Entity>(&self) -> SqliteDocumentRepository<'_, T> {
        documents(&self.conn)
    }

    pub(crate) fn state(&self) -> SqliteStateRepository<'_> {
        SqliteStateRepository::new_unchecked(&self.conn)
    }

    /// Runs `work` inside one immediate transaction; rolls back on error.
    pub(crate) fn transaction<R, F>(&self, work: F) -> ServiceResult<R>
    where
        F: FnOnce(&Connection) -> ServiceResult<R>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = work(&*tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Publishes a local change and records it as already seen.
    pub(crate) fn notify(&self, event: ChangeEvent) {
        self.bus.publish(event, ChangeOrigin::Local);
        if let Err(err) = self.absorb_local_write() {
            warn!(
                "event=change_track module=store status=error name={} error={}",
                event.as_str(),
                err
            );
        }
    }

    /// Publishes one `External` notification per storage key written by
    /// another connection since the previous poll, and returns them.
    pub fn poll_external_changes(&self) -> RepoResult<Vec<ChangeEvent>> {
        let data_version = self.data_version()?;
        if data_version == self.sync.borrow().data_version {
            return Ok(Vec::new());
        }

        let current = load_revisions(&self.conn)?;
        let mut changed = Vec::new();
        {
            let mut sync = self.sync.borrow_mut();
            for (key, revision) in &current {
                if sync.revisions.get(key) != Some(revision) {
                    if let Some(event) = ChangeEvent::for_storage_key(key) {
                        changed.push(event);
                    }
                }
            }
            sync.data_version = data_version;
            sync.revisions = current;
        }

        for event in &changed {
            self.bus.publish(*event, ChangeOrigin::External);
        }
        Ok(changed)
    }

    /// Number of stored documents per collection.
    pub fn collection_counts(&self) -> RepoResult<BTreeMap<Collection, usize>> {
        let mut counts = BTreeMap::new();
        counts.insert(Collection::Users, self.documents::<User>().count()?);
        counts.insert(Collection::Staffers, self.documents::<Staffer>().count()?);
        counts.insert(Collection::Requests, self.documents::<ClientRequest>().count()?);
        counts.insert(Collection::Assignments, self.documents::<Assignment>().count()?);
        counts.insert(Collection::Teams, self.documents::<TeamMember>().count()?);
        counts.insert(
            Collection::Invitations,
            self.documents::<AssignmentInvitation>().count()?,
        );
        counts.insert(
            Collection::ScheduleNotes,
            self.documents::<ScheduleNote>().count()?,
        );
        counts.insert(
            Collection::ClientAvailability,
            self.documents::<ClientAvailability>().count()?,
        );
        counts.insert(
            Collection::CalendarEvents,
            self.documents::<CalendarEvent>().count()?,
        );
        Ok(counts)
    }

    /// Documents that no longer decode, across every collection.
    ///
    /// Corrupt documents are kept on disk untouched; reads skip them.
    pub fn integrity_report(&self) -> RepoResult<Vec<CorruptDocument>> {
        let mut corrupt = Vec::new();
        corrupt.extend(self.documents::<User>().scan_corrupt()?);
        corrupt.extend(self.documents::<Staffer>().scan_corrupt()?);
        corrupt.extend(self.documents::<ClientRequest>().scan_corrupt()?);
        corrupt.extend(self.documents::<Assignment>().scan_corrupt()?);
        corrupt.extend(self.documents::<TeamMember>().scan_corrupt()?);
        corrupt.extend(self.documents::<AssignmentInvitation>().scan_corrupt()?);
        corrupt.extend(self.documents::<ScheduleNote>().scan_corrupt()?);
        corrupt.extend(self.documents::<ClientAvailability>().scan_corrupt()?);
        corrupt.extend(self.documents::<CalendarEvent>().scan_corrupt()?);
        Ok(corrupt)
    }

    /// Imports a legacy JSON array snapshot stored under `collection`'s key.
    ///
    /// Elements upsert by identity. A snapshot that is not a JSON array is
    /// reported as discarded and nothing is written.
    pub fn import_legacy(&self, collection: Collection, raw: &str) -> ServiceResult<ImportReport> {
        let report = match collection {
            Collection::Users => self.import_documents::<User>(raw)?,
            Collection::Staffers => self.import_documents::<Staffer>(raw)?,
            Collection::Requests => self.import_documents::<ClientRequest>(raw)?,
            Collection::Assignments => self.import_documents::<Assignment>(raw)?,
            Collection::Teams => self.import_documents::<TeamMember>(raw)?,
            Collection::Invitations => self.import_documents::<AssignmentInvitation>(raw)?,
            Collection::ScheduleNotes => self.import_documents::<ScheduleNote>(raw)?,
            Collection::ClientAvailability => self.import_documents::<ClientAvailability>(raw)?,
            Collection::CalendarEvents => self.import_documents::<CalendarEvent>(raw)?,
        };

        info!(
            "event=legacy_import module=store status={} collection={} imported={} skipped={}",
            if report.discarded { "discarded" } else { "ok" },
            collection.storage_key(),
            report.imported,
            report.skipped
        );
        if report.imported > 0 {
            self.notify(ChangeEvent::for_collection(collection));
        }
        Ok(report)
    }

    /// Serializes a whole collection as a JSON array in insertion order.
    pub fn export_collection(&self, collection: Collection) -> RepoResult<String> {
        match collection {
            Collection::Users => self.export_documents::<User>(),
            Collection::Staffers => self.export_documents::<Staffer>(),
            Collection::Requests => self.export_documents::<ClientRequest>(),
            Collection::Assignments => self.export_documents::<Assignment>(),
            Collection::Teams => self.export_documents::<TeamMember>(),
            Collection::Invitations => self.export_documents::<AssignmentInvitation>(),
            Collection::ScheduleNotes => self.export_documents::<ScheduleNote>(),
            Collection::ClientAvailability => self.export_documents::<ClientAvailability>(),
            Collection::CalendarEvents => self.export_documents::<CalendarEvent>(),
        }
    }

    fn import_documents<T: Entity>(&self, raw: &str) -> ServiceResult<ImportReport> {
        let elements = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(elements)) => elements,
            _ => {
                return Ok(ImportReport {
                    discarded: true,
                    ..ImportReport::default()
                })
            }
        };

        self.transaction(|conn| {
            let repo = documents::<T>(conn);
            let mut report = ImportReport::default();
            for element in elements {
                match serde_json::from_value::<T>(element) {
                    Ok(document) if !document.id().trim().is_empty() => {
                        repo.upsert(&document)?;
                        report.imported += 1;
                    }
                    _ => report.skipped += 1,
                }
            }
            Ok(report)
        })
    }

    fn export_documents<T: Entity>(&self) -> RepoResult<String> {
        let documents = self.documents::<T>().list()?;
        Ok(serde_json::to_string(&documents)?)
    }

    fn data_version(&self) -> RepoResult<i64> {
        Ok(self
            .conn
            .query_row("PRAGMA data_version;", [], |row| row.get(0))?)
    }

    fn refresh_sync_state(&self) -> RepoResult<()> {
        let data_version = self.data_version()?;
        let revisions = load_revisions(&self.conn)?;
        let mut sync = self.sync.borrow_mut();
        sync.data_version = data_version;
        sync.revisions = revisions;
        Ok(())
    }

    fn absorb_local_write(&self) -> RepoResult<()> {
        // An unchanged data_version means nobody else committed since the
        // last snapshot, so every revision bump is ours.
        if self.data_version()? != self.sync.borrow().data_version {
            return Ok(());
        }
        let revisions = load_revisions(&self.conn)?;
        self.sync.borrow_mut().revisions = revisions;
        Ok(())
    }
}
