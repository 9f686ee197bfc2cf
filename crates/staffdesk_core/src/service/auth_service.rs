//! Password sign-in and session persistence.
//!
//! # Responsibility
//! - Authenticate against users, falling back to staffer records.
//! - Persist the signed-in user (without password) under `app_session`.
//!
//! # Invariants
//! - A staffer whose credentials match always ends up with a user record.
//! - A stored user password that drifted from the staffer password is
//!   repaired on a successful staffer match.
//! - Expired sessions are cleared on read.

use crate::model::staffer::{Staffer, StafferPatch};
use crate::model::user::{Session, SessionUser, User, UserPatch};
use crate::model::{now_epoch_ms, now_iso};
use crate::notify::ChangeEvent;
use crate::repo::document_repo::{to_patch, DocumentPatch, DocumentRepository};
use crate::repo::state_repo::{StateRepository, SESSION_KEY};
use crate::repo::RepoError;
use crate::service::directory_service::{find_staffer_by_email, find_user_by_email, user_for_staffer};
use crate::service::{documents, require_email, ServiceError, ServiceResult};
use crate::store::Store;
use log::{info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum AuthError {
    /// Unknown email or wrong password. Deliberately does not say which.
    InvalidCredentials,
    Repo(RepoError),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid email or password"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCredentials => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for AuthError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ServiceError> for AuthError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Repo(err) => Self::Repo(err),
            _ => Self::InvalidCredentials,
        }
    }
}

/// Which record satisfied a sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignInPath {
    User,
    StafferMaterialized,
    StafferRepaired,
}

impl SignInPath {
    fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::StafferMaterialized => "staffer_materialized",
            Self::StafferRepaired => "staffer_repaired",
        }
    }
}

pub struct AuthService<'s> {
    store: &'s Store,
}

impl<'s> AuthService<'s> {
    pub(crate) fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Signs in with plaintext credentials and persists a fresh session.
    pub fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let outcome = self.store.transaction(|conn| {
            let user = find_user_by_email(conn, email)?;
            if let Some(user) = &user {
                if user.password == password {
                    return Ok(Some((user.clone(), SignInPath::User)));
                }
            }

            let Some(staffer) = find_staffer_by_email(conn, email)? else {
                return Ok(None);
            };
            if staffer.password != password {
                return Ok(None);
            }

            let users = documents::<User>(conn);
            match user {
                None => {
                    let created = user_for_staffer(&staffer);
                    users.insert(&created)?;
                    Ok(Some((created, SignInPath::StafferMaterialized)))
                }
                Some(existing) => {
                    let mut patch = DocumentPatch::new();
                    patch.insert("password".to_string(), Value::String(staffer.password.clone()));
                    patch.insert("updatedAt".to_string(), Value::String(now_iso()));
                    let repaired = users
                        .update(&existing.id, &patch)?
                        .unwrap_or(existing);
                    Ok(Some((repaired, SignInPath::StafferRepaired)))
                }
            }
        })?;

        let Some((user, path)) = outcome else {
            warn!("event=sign_in module=auth status=rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let session = Session {
            user: SessionUser::from(&user),
            expires_at: now_epoch_ms() + self.store.config().session_ttl_ms(),
        };
        self.write_session(&session)?;

        info!(
            "event=sign_in module=auth status=ok user_id={} role={} path={}",
            user.id,
            user.role.as_str(),
            path.as_str()
        );
        if path != SignInPath::User {
            self.store.notify(ChangeEvent::UsersUpdated);
        }
        self.store.notify(ChangeEvent::SessionUpdated);
        Ok(session)
    }

    /// Active session, or `None` when absent, unreadable or expired.
    pub fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let state = self.store.state();
        let Some(raw) = state.get_value(SESSION_KEY)? else {
            return Ok(None);
        };

        let session = match serde_json::from_str::<Session>(&raw) {
            Ok(session) => session,
            Err(err) => {
                warn!(
                    "event=session_read module=auth status=discarded error={}",
                    err
                );
                state.remove_value(SESSION_KEY)?;
                return Ok(None);
            }
        };

        if session.is_expired_at(now_epoch_ms()) {
            state.remove_value(SESSION_KEY)?;
            self.store.notify(ChangeEvent::SessionUpdated);
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Clears the session. Returns `false` when nobody was signed in.
    pub fn sign_out(&self) -> Result<bool, AuthError> {
        let removed = self.store.state().remove_value(SESSION_KEY)?;
        if removed {
            self.store.notify(ChangeEvent::SessionUpdated);
        }
        Ok(removed)
    }

    /// Updates a user's own profile fields and mirrors them onto the
    /// staffer that shares the user's previous email.
    ///
    /// Refreshes the persisted session when it belongs to the same user.
    /// Returns `Ok(None)` when no user has `user_id`.
    pub fn update_profile(&self, user_id: &str, patch: &UserPatch) -> ServiceResult<Option<User>> {
        if let Some(email) = &patch.email {
            require_email(email)?;
        }

        let outcome = self.store.transaction(|conn| {
            let users = documents::<User>(conn);
            let Some(previous) = users.get(user_id)? else {
                return Ok(None);
            };
            let linked = find_staffer_by_email(conn, &previous.email)?;

            if let Some(email) = &patch.email {
                let taken_by_user = find_user_by_email(conn, email)?
                    .is_some_and(|other| other.id != previous.id);
                let taken_by_staffer = find_staffer_by_email(conn, email)?.is_some_and(|other| {
                    linked.as_ref().map(|staffer| &staffer.id) != Some(&other.id)
                });
                if taken_by_user || taken_by_staffer {
                    return Err(ServiceError::Conflict(
                        "a user with this email already exists".to_string(),
                    ));
                }
            }

            let mut changes = to_patch(patch)?;
            if changes.is_empty() {
                return Ok(Some((previous, false)));
            }
            let now = now_iso();
            changes.insert("updatedAt".to_string(), Value::String(now.clone()));
            let Some(user) = users.update(user_id, &changes)? else {
                return Ok(None);
            };

            let Some(staffer) = linked else {
                return Ok(Some((user, false)));
            };
            let mut mirrored = to_patch(&staffer_patch_for(patch))?;
            if mirrored.is_empty() {
                return Ok(Some((user, false)));
            }
            mirrored.insert("updatedAt".to_string(), Value::String(now));
            let staffer_changed = documents::<Staffer>(conn)
                .update(&staffer.id, &mirrored)?
                .is_some();
            Ok(Some((user, staffer_changed)))
        })?;

        let Some((user, staffer_changed)) = outcome else {
            return Ok(None);
        };

        let session = self
            .current_session()
            .map_err(|err| match err {
                AuthError::Repo(err) => ServiceError::Repo(err),
                AuthError::InvalidCredentials => {
                    ServiceError::Validation("session could not be read".to_string())
                }
            })?;
        if let Some(mut session) = session.filter(|session| session.user.id == user.id) {
            session.user = SessionUser::from(&user);
            self.write_session(&session)?;
            self.store.notify(ChangeEvent::SessionUpdated);
        }

        self.store.notify(ChangeEvent::UsersUpdated);
        if staffer_changed {
            self.store.notify(ChangeEvent::StafferUpdated);
        }
        self.store.notify(ChangeEvent::ProfileUpdated);
        Ok(Some(user))
    }

    fn write_session(&self, session: &Session) -> Result<(), RepoError> {
        let raw = serde_json::to_string(session)?;
        self.store.state().put_value(SESSION_KEY, &raw)
    }
}

/// Staffer fields carried by a profile patch. A display name splits into
/// first name and the remainder as last name.
fn staffer_patch_for(patch: &UserPatch) -> StafferPatch {
    let (first_name, last_name) = match patch.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => match name.split_once(char::is_whitespace) {
            Some((first, rest)) => (Some(first.to_string()), Some(rest.trim().to_string())),
            None => (Some(name.to_string()), None),
        },
        _ => (None, None),
    };
    StafferPatch {
        first_name,
        last_name,
        email: patch.email.clone(),
        password: patch.password.clone(),
        position: patch.position.clone(),
        avatar: patch.avatar.clone(),
        ..StafferPatch::default()
    }
}
