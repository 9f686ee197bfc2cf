//! Assignments and their invitations.
//!
//! # Invariants
//! - An assignment links a staffer to either a client request (`request_id`)
//!   or a free-standing task described by the `task_*` fields.
//! - Recipient matching considers `assigned_to`, `assigned_to_id` and
//!   `assigned_to_email`; any of them may hold an id or an email.

use super::staffer::Section;
use super::{normalize_identifier, Collection, Entity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Assignment {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub assigned_to: String,
    pub assigned_to_id: String,
    pub assigned_to_email: String,
    pub assigned_to_name: String,
    pub section: Section,
    pub assigned_by: String,
    pub assigned_by_email: String,
    pub status: AssignmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_for_rejection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Assignment {
    /// Normalized, non-empty recipient identifiers carried by this assignment.
    pub fn recipient_keys(&self) -> impl Iterator<Item = String> + '_ {
        [
            self.assigned_to.as_str(),
            self.assigned_to_id.as_str(),
            self.assigned_to_email.as_str(),
        ]
        .into_iter()
        .map(normalize_identifier)
        .filter(|key| !key.is_empty())
    }
}

impl Entity for Assignment {
    const COLLECTION: Collection = Collection::Assignments;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Input for creating an assignment.
///
/// `assignee` may be a staffer id or email; it is resolved to a staffer
/// before the assignment is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAssignment {
    pub assignee: String,
    pub request_id: Option<String>,
    pub task_title: Option<String>,
    pub task_date: Option<String>,
    pub task_time: Option<String>,
    pub task_location: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssignmentInvitation {
    pub id: String,
    pub assignment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub invited_to: String,
    pub invited_by: String,
    pub status: InvitationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<String>,
}

impl Entity for AssignmentInvitation {
    const COLLECTION: Collection = Collection::Invitations;

    fn id(&self) -> &str {
        &self.id
    }
}
