//! Login accounts, roles and sessions.
//!
//! # Invariants
//! - `User` is the authoritative login record; a Staffer may exist without one
//!   until accounts are reconciled or the staffer signs in.
//! - Sessions never carry a password.

use super::{Collection, Entity};
use serde::{Deserialize, Serialize};

/// Executive position titles that grant management rights.
pub const EXECUTIVE_TITLES: &[&str] = &[
    "editor-in-chief",
    "associate editor",
    "managing editor",
    "executive secretary",
];

/// Ordered position predicates; first match wins.
const POSITION_ROLE_RULES: &[(&[&str], Role)] = &[
    (&["editor-in-chief"], Role::Admin),
    (
        &["associate editor", "managing editor", "executive secretary"],
        Role::Staffer,
    ),
    (&["section head"], Role::SectionHead),
    (&["regular staff"], Role::RegularStaff),
    (&["client"], Role::Client),
];

/// Account role controlling what a user may do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    #[default]
    Staffer,
    Client,
    SectionHead,
    RegularStaff,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staffer => "staffer",
            Self::Client => "client",
            Self::SectionHead => "section-head",
            Self::RegularStaff => "regular-staff",
        }
    }

    /// Derives a role from a free-text position title.
    ///
    /// Case-insensitive substring match against the ordered rule list; titles
    /// matching nothing map to `Staffer`.
    pub fn from_position(position: &str) -> Self {
        let position = position.to_lowercase();
        POSITION_ROLE_RULES
            .iter()
            .find(|(needles, _)| needles.iter().any(|needle| position.contains(needle)))
            .map_or(Self::Staffer, |(_, role)| *role)
    }
}

/// Returns whether a position title names an executive office.
pub fn is_executive_position(position: &str) -> bool {
    let position = position.to_lowercase();
    EXECUTIVE_TITLES
        .iter()
        .any(|title| position.contains(title))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Stored and compared in plaintext.
    pub password: String,
    pub role: Role,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Entity for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Partial update for a user profile. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// User projection without credentials, as held by a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl SessionUser {
    /// Whether this user may approve or reject requests and assignments.
    pub fn can_manage(&self) -> bool {
        self.role == Role::Admin
            || self
                .position
                .as_deref()
                .is_some_and(is_executive_position)
    }
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            name: user.name.clone(),
            position: user.position.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// Persisted sign-in state stored under `app_session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: SessionUser,
    /// Unix epoch milliseconds.
    pub expires_at: i64,
}

impl Session {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }
}
