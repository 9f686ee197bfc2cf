//! Schedule notes and client availability.
//!
//! # Invariants
//! - A schedule note is unique per `(staffer_id, day, time_slot, semester)`.
//! - Client availability is unique per `date` and uses it as its identity.

use super::{Collection, Entity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const AVAILABILITY_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Semester {
    #[default]
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "2nd")]
    Second,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleNote {
    pub id: String,
    pub staffer_id: String,
    pub day: String,
    pub time_slot: String,
    pub notes: String,
    pub semester: Semester,
    pub added_by: String,
    pub added_by_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ScheduleNote {
    /// Whether this note occupies the given composite slot.
    pub fn occupies(&self, slot: &ScheduleSlot) -> bool {
        self.staffer_id == slot.staffer_id
            && self.day.eq_ignore_ascii_case(&slot.day)
            && self.time_slot == slot.time_slot
            && self.semester == slot.semester
    }
}

impl Entity for ScheduleNote {
    const COLLECTION: Collection = Collection::ScheduleNotes;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Composite natural key of a schedule note.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduleSlot {
    pub staffer_id: String,
    pub day: String,
    pub time_slot: String,
    pub semester: Semester,
}

impl ScheduleSlot {
    /// The slot with surrounding whitespace stripped from its key parts.
    pub fn trimmed(&self) -> Self {
        Self {
            staffer_id: self.staffer_id.trim().to_string(),
            day: self.day.trim().to_string(),
            time_slot: self.time_slot.trim().to_string(),
            semester: self.semester,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientAvailability {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub available: bool,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Entity for ClientAvailability {
    const COLLECTION: Collection = Collection::ClientAvailability;

    fn id(&self) -> &str {
        &self.date
    }
}

/// Parses an availability date, accepting only `YYYY-MM-DD`.
pub fn parse_availability_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, AVAILABILITY_DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::{parse_availability_date, ScheduleNote, ScheduleSlot, Semester};

    #[test]
    fn semester_uses_ordinal_labels() {
        assert_eq!(serde_json::to_string(&Semester::Second).unwrap(), "\"2nd\"");
    }

    #[test]
    fn availability_date_requires_iso_day() {
        assert!(parse_availability_date("2024-03-05").is_some());
        assert!(parse_availability_date("2024-3-5").is_none());
        assert!(parse_availability_date("2024-02-30").is_none());
        assert!(parse_availability_date("03/05/2024").is_none());
    }

    #[test]
    fn occupancy_ignores_day_case() {
        let note = ScheduleNote {
            staffer_id: "s1".to_string(),
            day: "Monday".to_string(),
            time_slot: "07:00AM-07:30AM".to_string(),
            ..ScheduleNote::default()
        };
        let slot = ScheduleSlot {
            staffer_id: "s1".to_string(),
            day: "monday".to_string(),
            time_slot: "07:00AM-07:30AM".to_string(),
            semester: Semester::First,
        };
        assert!(note.occupies(&slot));
    }
}
