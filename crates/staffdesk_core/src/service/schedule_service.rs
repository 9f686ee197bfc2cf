//! Weekly schedule notes and client availability.
//!
//! # Invariants
//! - Saving a note for an occupied `(staffer, day, time slot, semester)`
//!   replaces that note's text instead of adding a second record.
//! - Availability dates are strict `YYYY-MM-DD`; one record per date.

use crate::model::schedule::{
    parse_availability_date, ClientAvailability, ScheduleNote, ScheduleSlot, Semester,
};
use crate::model::user::SessionUser;
use crate::model::{new_id, now_iso};
use crate::notify::ChangeEvent;
use crate::repo::document_repo::{DocumentPatch, DocumentRepository};
use crate::repo::RepoResult;
use crate::service::{documents, require, ServiceError, ServiceResult};
use crate::store::Store;
use log::info;
use serde_json::Value;

pub struct ScheduleService<'s> {
    store: &'s Store,
}

impl<'s> ScheduleService<'s> {
    pub(crate) fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Inserts or replaces the note occupying `slot`.
    pub fn save_schedule_note(
        &self,
        slot: ScheduleSlot,
        notes: &str,
        author: &SessionUser,
    ) -> ServiceResult<ScheduleNote> {
        let slot = slot.trimmed();
        require(&slot.staffer_id, "staffer id")?;
        require(&slot.day, "day")?;
        require(&slot.time_slot, "time slot")?;

        let note = self.store.transaction(|conn| {
            let repo = documents::<ScheduleNote>(conn);
            let existing = repo
                .find_by_field("stafferId", &slot.staffer_id)?
                .into_iter()
                .find(|note| note.occupies(&slot));
            let now = now_iso();

            if let Some(existing) = existing {
                let mut changes = DocumentPatch::new();
                changes.insert("notes".to_string(), Value::from(notes));
                changes.insert("addedBy".to_string(), Value::from(author.email.clone()));
                changes.insert("addedByName".to_string(), Value::from(author.name.clone()));
                changes.insert("updatedAt".to_string(), Value::from(now));
                let updated = repo.update(&existing.id, &changes)?.unwrap_or(existing);
                return Ok(updated);
            }

            let note = ScheduleNote {
                id: new_id(),
                staffer_id: slot.staffer_id.clone(),
                day: slot.day.clone(),
                time_slot: slot.time_slot.clone(),
                notes: notes.to_string(),
                semester: slot.semester,
                added_by: author.email.clone(),
                added_by_name: author.name.clone(),
                created_at: Some(now.clone()),
                updated_at: Some(now),
            };
            repo.insert(&note)?;
            Ok(note)
        })?;

        info!(
            "event=schedule_note_save module=schedule status=ok id={} staffer_id={}",
            note.id, note.staffer_id
        );
        self.store.notify(ChangeEvent::ScheduleNoteUpdated);
        Ok(note)
    }

    pub fn delete_schedule_note(&self, id: &str) -> RepoResult<bool> {
        let removed = self.store.documents::<ScheduleNote>().delete(id)?;
        if removed {
            self.store.notify(ChangeEvent::ScheduleNoteUpdated);
        }
        Ok(removed)
    }

    pub fn list_schedule_notes(&self) -> RepoResult<Vec<ScheduleNote>> {
        self.store.documents::<ScheduleNote>().list()
    }

    pub fn schedule_for(&self, staffer_id: &str, semester: Semester) -> RepoResult<Vec<ScheduleNote>> {
        Ok(self
            .store
            .documents::<ScheduleNote>()
            .find_by_field("stafferId", staffer_id)?
            .into_iter()
            .filter(|note| note.semester == semester)
            .collect())
    }

    /// Records whether the client desk is available on `date`.
    pub fn set_availability(
        &self,
        date: &str,
        available: bool,
        notes: &str,
    ) -> ServiceResult<ClientAvailability> {
        if parse_availability_date(date).is_none() {
            return Err(ServiceError::Validation(format!(
                "date `{}` must be formatted YYYY-MM-DD",
                date.trim()
            )));
        }
        let record = ClientAvailability {
            date: date.trim().to_string(),
            available,
            notes: notes.to_string(),
            updated_at: Some(now_iso()),
        };
        self.store.documents::<ClientAvailability>().upsert(&record)?;

        info!(
            "event=availability_set module=schedule status=ok date={} available={}",
            record.date, record.available
        );
        self.store.notify(ChangeEvent::ClientAvailabilityUpdated);
        Ok(record)
    }

    /// Every availability record, earliest date first.
    pub fn availability(&self) -> RepoResult<Vec<ClientAvailability>> {
        let mut records = self.store.documents::<ClientAvailability>().list()?;
        records.sort_by(|left, right| left.date.cmp(&right.date));
        Ok(records)
    }

    pub fn availability_on(&self, date: &str) -> RepoResult<Option<ClientAvailability>> {
        self.store.documents::<ClientAvailability>().get(date.trim())
    }

    pub fn clear_availability(&self, date: &str) -> RepoResult<bool> {
        let removed = self
            .store
            .documents::<ClientAvailability>()
            .delete(date.trim())?;
        if removed {
            self.store.notify(ChangeEvent::ClientAvailabilityUpdated);
        }
        Ok(removed)
    }
}
