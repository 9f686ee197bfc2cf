//! Staffer person records.

use super::user::Role;
use super::{Collection, Entity};
use serde::{Deserialize, Serialize};

/// Coarse organizational grouping of a staffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    #[default]
    Executives,
    Scribes,
    Creatives,
    Managerial,
    Clients,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executives => "executives",
            Self::Scribes => "scribes",
            Self::Creatives => "creatives",
            Self::Managerial => "managerial",
            Self::Clients => "clients",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Staffer {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    /// Free-text title; only a fallback source for the account role.
    pub position: String,
    pub section: Section,
    /// Explicit account role. Takes precedence over the position title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Staffer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Role the staffer's login account should carry.
    pub fn effective_role(&self) -> Role {
        self.role
            .unwrap_or_else(|| Role::from_position(&self.position))
    }
}

impl Entity for Staffer {
    const COLLECTION: Collection = Collection::Staffers;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Input for creating a staffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewStaffer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub position: String,
    pub section: Section,
    pub role: Option<Role>,
    pub avatar: Option<String>,
}

/// Partial update for a staffer. `None` leaves the field untouched.
///
/// A blank `password` is ignored on merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StafferPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}
