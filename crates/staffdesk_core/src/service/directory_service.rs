//! Staffer and user directory service.
//!
//! # Responsibility
//! - Provide CRUD over staffers and login users.
//! - Keep login users in step with staffers through explicit reconciliation.
//! - Build the identity graph used for recipient matching.
//!
//! # Invariants
//! - Reading staffers or users never writes.
//! - Staffer emails are unique, compared case-insensitively.
//! - `reconcile_accounts` is idempotent.

use crate::identity::IdentityGraph;
use crate::model::staffer::{NewStaffer, Section, Staffer, StafferPatch};
use crate::model::team::TeamMember;
use crate::model::user::{Role, User, UserPatch};
use crate::model::{is_blank, new_id, now_iso};
use crate::notify::ChangeEvent;
use crate::repo::document_repo::{to_patch, DocumentPatch, DocumentRepository};
use crate::repo::RepoResult;
use crate::service::{documents, require, require_email, ServiceError, ServiceResult};
use crate::store::Store;
use log::info;
use rusqlite::Connection;
use serde_json::Value;

/// Writes performed by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Ids of users created for staffers that had no account.
    pub created_users: Vec<String>,
    /// Users whose missing position was filled from their staffer record.
    pub backfilled_positions: usize,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.created_users.is_empty() && self.backfilled_positions == 0
    }
}

/// Input for creating a login user directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    pub position: Option<String>,
    pub avatar: Option<String>,
}

pub struct DirectoryService<'s> {
    store: &'s Store,
}

impl<'s> DirectoryService<'s> {
    pub(crate) fn new(store: &'s Store) -> Self {
        Self { store }
    }

    pub fn list_users(&self) -> RepoResult<Vec<User>> {
        self.store.documents::<User>().list()
    }

    pub fn get_user(&self, id: &str) -> RepoResult<Option<User>> {
        self.store.documents::<User>().get(id)
    }

    pub fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        find_user_by_email(self.store.connection(), email)
    }

    /// Creates a login user. Emails must be unique across users.
    pub fn create_user(&self, input: NewUser) -> ServiceResult<User> {
        require_email(&input.email)?;
        require(&input.password, "password")?;
        require(&input.name, "name")?;

        let user = self.store.transaction(|conn| {
            if find_user_by_email(conn, &input.email)?.is_some() {
                return Err(ServiceError::Conflict(
                    "a user with this email already exists".to_string(),
                ));
            }
            let user = User {
                id: new_id(),
                email: input.email.trim().to_string(),
                password: input.password,
                role: input.role,
                name: input.name.trim().to_string(),
                position: input.position,
                avatar: input.avatar,
                created_at: Some(now_iso()),
                updated_at: None,
            };
            documents::<User>(conn).insert(&user)?;
            Ok(user)
        })?;

        info!(
            "event=user_create module=directory status=ok id={} role={}",
            user.id,
            user.role.as_str()
        );
        self.store.notify(ChangeEvent::UsersUpdated);
        Ok(user)
    }

    pub fn delete_user(&self, id: &str) -> RepoResult<bool> {
        let removed = self.store.documents::<User>().delete(id)?;
        if removed {
            self.store.notify(ChangeEvent::UsersUpdated);
        }
        Ok(removed)
    }

    pub fn list_staffers(&self) -> RepoResult<Vec<Staffer>> {
        self.store.documents::<Staffer>().list()
    }

    pub fn get_staffer(&self, id: &str) -> RepoResult<Option<Staffer>> {
        self.store.documents::<Staffer>().get(id)
    }

    pub fn find_staffer_by_email(&self, email: &str) -> RepoResult<Option<Staffer>> {
        find_staffer_by_email(self.store.connection(), email)
    }

    pub fn staffers_in_section(&self, section: Section) -> RepoResult<Vec<Staffer>> {
        self.store
            .documents::<Staffer>()
            .find_by_field("section", section.as_str())
    }

    /// Creates a staffer and its login account.
    ///
    /// # Errors
    /// - `Validation` when email, password, first or last name is missing.
    /// - `Conflict` when another staffer already uses the email.
    pub fn create_staffer(&self, input: NewStaffer) -> ServiceResult<Staffer> {
        require_email(&input.email)?;
        require(&input.password, "password")?;
        require(&input.first_name, "first name")?;
        require(&input.last_name, "last name")?;

        let (staffer, report) = self.store.transaction(|conn| {
            if find_staffer_by_email(conn, &input.email)?.is_some() {
                return Err(ServiceError::Conflict(
                    "a staffer with this email already exists".to_string(),
                ));
            }
            let now = now_iso();
            let staffer = Staffer {
                id: new_id(),
                first_name: input.first_name.trim().to_string(),
                last_name: input.last_name.trim().to_string(),
                email: input.email.trim().to_string(),
                password: input.password,
                position: input.position.trim().to_string(),
                section: input.section,
                role: input.role,
                avatar: input.avatar,
                created_at: Some(now.clone()),
                updated_at: Some(now),
            };
            documents::<Staffer>(conn).insert(&staffer)?;
            let report = reconcile_accounts_on(conn)?;
            Ok((staffer, report))
        })?;

        info!(
            "event=staffer_create module=directory status=ok id={} section={} users_created={}",
            staffer.id,
            staffer.section.as_str(),
            report.created_users.len()
        );
        self.store.notify(ChangeEvent::StafferUpdated);
        if !report.is_empty() {
            self.store.notify(ChangeEvent::UsersUpdated);
        }
        Ok(staffer)
    }

    /// Merges `patch` over a staffer and mirrors the change onto its user.
    ///
    /// Returns `Ok(None)` when no staffer has `id`. A blank password keeps
    /// the stored one.
    pub fn update_staffer(&self, id: &str, patch: &StafferPatch) -> ServiceResult<Option<Staffer>> {
        if let Some(email) = &patch.email {
            require_email(email)?;
        }

        let outcome = self.store.transaction(|conn| {
            let staffers = documents::<Staffer>(conn);
            let Some(previous) = staffers.get(id)? else {
                return Ok(None);
            };

            if let Some(email) = &patch.email {
                let taken = find_staffer_by_email(conn, email)?
                    .is_some_and(|other| other.id != previous.id);
                if taken {
                    return Err(ServiceError::Conflict(
                        "a staffer with this email already exists".to_string(),
                    ));
                }

                let own_user = find_user_by_email(conn, &previous.email)?.map(|user| user.id);
                let claimed = find_user_by_email(conn, email)?
                    .is_some_and(|user| Some(&user.id) != own_user.as_ref());
                if claimed {
                    return Err(ServiceError::Conflict(
                        "a user with this email already exists".to_string(),
                    ));
                }
            }

            let mut changes = to_patch(patch)?;
            if changes.is_empty() {
                return Ok(Some((previous, false)));
            }
            changes.insert("updatedAt".to_string(), Value::String(now_iso()));
            let Some(updated) = staffers.update(id, &changes)? else {
                return Ok(None);
            };

            let users_changed = sync_user_with_staffer(conn, &previous, &updated, patch)?;
            Ok(Some((updated, users_changed)))
        })?;

        let Some((staffer, users_changed)) = outcome else {
            return Ok(None);
        };
        self.store.notify(ChangeEvent::StafferUpdated);
        if users_changed {
            self.store.notify(ChangeEvent::UsersUpdated);
        }
        Ok(Some(staffer))
    }

    /// Deletes a staffer and the team memberships that point at it.
    ///
    /// The staffer's login user is kept.
    pub fn delete_staffer(&self, id: &str) -> ServiceResult<bool> {
        let (removed, memberships) = self.store.transaction(|conn| {
            if !documents::<Staffer>(conn).delete(id)? {
                return Ok((false, 0));
            }
            let teams = documents::<TeamMember>(conn);
            let mut memberships = 0;
            for member in teams.find_by_field("stafferId", id)? {
                if teams.delete(&member.id)? {
                    memberships += 1;
                }
            }
            Ok((true, memberships))
        })?;

        if removed {
            self.store.notify(ChangeEvent::StafferUpdated);
        }
        if memberships > 0 {
            self.store.notify(ChangeEvent::TeamUpdated);
        }
        Ok(removed)
    }

    /// Creates missing login users for staffers and back-fills user positions.
    pub fn reconcile_accounts(&self) -> ServiceResult<ReconcileReport> {
        let report = self
            .store
            .transaction(|conn| Ok(reconcile_accounts_on(conn)?))?;
        if !report.is_empty() {
            self.store.notify(ChangeEvent::UsersUpdated);
        }
        Ok(report)
    }

    pub fn identity_graph(&self) -> RepoResult<IdentityGraph> {
        identity_graph_on(self.store.connection())
    }

    /// Staffer reachable from `identifier` (id or email) through the identity graph.
    pub fn resolve_staffer(&self, identifier: &str) -> RepoResult<Option<Staffer>> {
        resolve_staffer_on(self.store.connection(), identifier)
    }
}

/// Reconciliation pass over an open connection or transaction.
pub(crate) fn reconcile_accounts_on(conn: &Connection) -> RepoResult<ReconcileReport> {
    let staffers = documents::<Staffer>(conn).list()?;
    let users = documents::<User>(conn);
    let mut report = ReconcileReport::default();

    for staffer in &staffers {
        if is_blank(&staffer.email) || find_user_by_email(conn, &staffer.email)?.is_some() {
            continue;
        }
        let user = user_for_staffer(staffer);
        users.insert(&user)?;
        report.created_users.push(user.id);
    }

    for user in users.list()? {
        if user.position.as_deref().is_some_and(|position| !is_blank(position)) {
            continue;
        }
        let Some(staffer) = find_staffer_by_email(conn, &user.email)? else {
            continue;
        };
        if is_blank(&staffer.position) {
            continue;
        }
        let mut patch = DocumentPatch::new();
        patch.insert("position".to_string(), Value::String(staffer.position.clone()));
        if users.update(&user.id, &patch)?.is_some() {
            report.backfilled_positions += 1;
        }
    }

    if !report.is_empty() {
        info!(
            "event=accounts_reconcile module=directory status=ok users_created={} positions_backfilled={}",
            report.created_users.len(),
            report.backfilled_positions
        );
    }
    Ok(report)
}

/// Builds the login user materialized for a staffer.
pub(crate) fn user_for_staffer(staffer: &Staffer) -> User {
    User {
        id: new_id(),
        email: staffer.email.clone(),
        password: staffer.password.clone(),
        role: staffer.effective_role(),
        name: staffer.full_name(),
        position: Some(staffer.position.clone()).filter(|position| !is_blank(position)),
        avatar: staffer.avatar.clone(),
        created_at: Some(now_iso()),
        updated_at: None,
    }
}

pub(crate) fn find_user_by_email(conn: &Connection, email: &str) -> RepoResult<Option<User>> {
    if is_blank(email) {
        return Ok(None);
    }
    Ok(documents::<User>(conn)
        .find_by_field_ci("email", email)?
        .into_iter()
        .next())
}

pub(crate) fn find_staffer_by_email(conn: &Connection, email: &str) -> RepoResult<Option<Staffer>> {
    if is_blank(email) {
        return Ok(None);
    }
    Ok(documents::<Staffer>(conn)
        .find_by_field_ci("email", email)?
        .into_iter()
        .next())
}

pub(crate) fn identity_graph_on(conn: &Connection) -> RepoResult<IdentityGraph> {
    let staffers = documents::<Staffer>(conn).list()?;
    let users = documents::<User>(conn).list()?;
    Ok(IdentityGraph::from_records(&staffers, &users))
}

pub(crate) fn resolve_staffer_on(conn: &Connection, identifier: &str) -> RepoResult<Option<Staffer>> {
    let staffers = documents::<Staffer>(conn).list()?;
    let users = documents::<User>(conn).list()?;
    let graph = IdentityGraph::from_records(&staffers, &users);
    Ok(graph.resolve_staffer(identifier, &staffers).cloned())
}

fn sync_user_with_staffer(
    conn: &Connection,
    previous: &Staffer,
    updated: &Staffer,
    patch: &StafferPatch,
) -> RepoResult<bool> {
    let Some(user) = find_user_by_email(conn, &previous.email)? else {
        let report = reconcile_accounts_on(conn)?;
        return Ok(!report.is_empty());
    };

    let user_patch = UserPatch {
        name: Some(updated.full_name()),
        email: Some(updated.email.clone()),
        password: patch.password.clone(),
        position: Some(updated.position.clone()),
        avatar: updated.avatar.clone(),
    };
    let mut changes = to_patch(&user_patch)?;
    changes.insert(
        "role".to_string(),
        Value::String(updated.effective_role().as_str().to_string()),
    );
    changes.insert("updatedAt".to_string(), Value::String(now_iso()));
    Ok(documents::<User>(conn).update(&user.id, &changes)?.is_some())
}
