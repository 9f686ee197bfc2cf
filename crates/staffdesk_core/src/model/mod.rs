//! Entity document model for the staff desk store.
//!
//! # Responsibility
//! - Define every persisted entity with the camelCase field names consumers read.
//! - Bind each entity type to its storage collection.
//!
//! # Invariants
//! - Every entity exposes one stable string identity within its collection.
//! - Documents deserialize leniently: missing optional fields take defaults.

pub mod assignment;
pub mod calendar;
pub mod request;
pub mod schedule;
pub mod staffer;
pub mod team;
pub mod user;

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Storage collections, one per entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Users,
    Staffers,
    Requests,
    Assignments,
    Teams,
    Invitations,
    ScheduleNotes,
    ClientAvailability,
    CalendarEvents,
}

impl Collection {
    pub const ALL: [Collection; 9] = [
        Self::Users,
        Self::Staffers,
        Self::Requests,
        Self::Assignments,
        Self::Teams,
        Self::Invitations,
        Self::ScheduleNotes,
        Self::ClientAvailability,
        Self::CalendarEvents,
    ];

    /// Storage key used for the collection, shared with the legacy browser layout.
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Users => "app_users",
            Self::Staffers => "app_staffers",
            Self::Requests => "app_requests",
            Self::Assignments => "app_assignments",
            Self::Teams => "app_teams",
            Self::Invitations => "app_invitations",
            Self::ScheduleNotes => "app_schedule_notes",
            Self::ClientAvailability => "client_availability",
            Self::CalendarEvents => "events",
        }
    }

    /// Parses a storage key back into a collection.
    pub fn from_storage_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|collection| collection.storage_key() == key.trim())
    }
}

/// A document stored in one collection.
pub trait Entity: Serialize + DeserializeOwned + Clone {
    const COLLECTION: Collection;

    /// Identity of the document inside its collection.
    fn id(&self) -> &str;
}

/// Generates a new surrogate id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time as an ISO-8601 UTC string with millisecond precision.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Lowercases and trims an identifier for comparison.
pub fn normalize_identifier(value: &str) -> String {
    value.trim().to_lowercase()
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
