//! Calendar events.
//!
//! # Invariants
//! - `start`/`end` are ISO dates (`YYYY-MM-DD`) or datetimes.
//! - `end`, when set, is not earlier than `start`.
//! - `assignment_id` is a weak back-reference and may be stale.

use super::{Collection, Entity};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    pub all_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staffer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    /// Marks events mirrored from an assignment task.
    pub task: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl CalendarEvent {
    /// Calendar day of `start`, when it parses.
    pub fn start_date(&self) -> Option<NaiveDate> {
        parse_calendar_instant(&self.start).map(|instant| instant.date())
    }
}

impl Entity for CalendarEvent {
    const COLLECTION: Collection = Collection::CalendarEvents;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Input for creating a calendar event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCalendarEvent {
    pub title: String,
    pub start: String,
    pub end: Option<String>,
    pub all_day: bool,
    pub staffer_id: Option<String>,
    pub assignment_id: Option<String>,
    pub task: bool,
}

/// Partial update for a calendar event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
}

/// Parses an ISO date or datetime. Dates map to midnight.
pub fn parse_calendar_instant(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(with_offset.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
}

#[cfg(test)]
mod tests {
    use super::parse_calendar_instant;

    #[test]
    fn accepts_dates_and_datetimes() {
        assert!(parse_calendar_instant("2024-05-01").is_some());
        assert!(parse_calendar_instant("2024-05-01T09:30").is_some());
        assert!(parse_calendar_instant("2024-05-01T09:30:15").is_some());
        assert!(parse_calendar_instant("2024-05-01T09:30:15.250Z").is_some());
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(parse_calendar_instant("").is_none());
        assert!(parse_calendar_instant("May 1st").is_none());
        assert!(parse_calendar_instant("2024-13-01").is_none());
    }
}
