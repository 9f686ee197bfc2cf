//! Calendar events and their weak links to assignments.
//!
//! # Responsibility
//! - Validate and store calendar events.
//! - Mirror assignment tasks onto the calendar.
//! - Clean up the linked assignment when a task event is deleted.
//!
//! # Invariants
//! - `end`, when present, is not earlier than `start`.
//! - A missing `assignment_id` link is re-derived from title, start date and
//!   staffer before giving up on cleanup.

use crate::model::assignment::Assignment;
use crate::model::calendar::{
    parse_calendar_instant, CalendarEvent, CalendarEventPatch, NewCalendarEvent,
};
use crate::model::{is_blank, new_id, now_iso};
use crate::notify::ChangeEvent;
use crate::repo::document_repo::{to_patch, DocumentRepository};
use crate::repo::RepoResult;
use crate::service::assignment_service::delete_invitations_for;
use crate::service::{documents, not_found, require, ServiceError, ServiceResult};
use crate::store::Store;
use log::info;
use rusqlite::Connection;
use serde_json::Value;

/// Outcome of deleting a calendar event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDeletion {
    pub event_removed: bool,
    /// Id of the assignment removed along with the event.
    pub assignment_removed: Option<String>,
}

pub struct CalendarService<'s> {
    store: &'s Store,
}

impl<'s> CalendarService<'s> {
    pub(crate) fn new(store: &'s Store) -> Self {
        Self { store }
    }

    pub fn create_event(&self, input: NewCalendarEvent) -> ServiceResult<CalendarEvent> {
        let event = CalendarEvent {
            id: new_id(),
            title: input.title.trim().to_string(),
            start: input.start.trim().to_string(),
            end: input.end.filter(|end| !is_blank(end)),
            all_day: input.all_day,
            staffer_id: input.staffer_id.filter(|id| !is_blank(id)),
            assignment_id: input.assignment_id.filter(|id| !is_blank(id)),
            task: input.task,
            created_at: Some(now_iso()),
        };
        validate_event(&event)?;
        self.store.documents::<CalendarEvent>().insert(&event)?;

        info!(
            "event=calendar_create module=calendar status=ok id={} task={}",
            event.id, event.task
        );
        self.store.notify(ChangeEvent::EventsUpdated);
        Ok(event)
    }

    /// Applies `patch` after validating the merged result.
    pub fn update_event(
        &self,
        id: &str,
        patch: &CalendarEventPatch,
    ) -> ServiceResult<Option<CalendarEvent>> {
        let events = self.store.documents::<CalendarEvent>();
        let Some(mut preview) = events.get(id)? else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            preview.title = title.clone();
        }
        if let Some(start) = &patch.start {
            preview.start = start.clone();
        }
        if let Some(end) = &patch.end {
            preview.end = Some(end.clone()).filter(|end| !is_blank(end));
        }
        validate_event(&preview)?;

        let mut changes = to_patch(patch)?;
        if preview.end.is_none() && patch.end.is_some() {
            changes.insert("end".to_string(), Value::Null);
        }
        let updated = events.update(id, &changes)?;
        if updated.is_some() {
            self.store.notify(ChangeEvent::EventsUpdated);
        }
        Ok(updated)
    }

    /// Deletes an event and, for task events, the assignment behind it.
    pub fn delete_event(&self, id: &str) -> ServiceResult<EventDeletion> {
        let (deletion, invitations) = self.store.transaction(|conn| {
            let events = documents::<CalendarEvent>(conn);
            let Some(event) = events.get(id)? else {
                return Ok((EventDeletion::default(), 0));
            };
            events.delete(id)?;

            let mut deletion = EventDeletion {
                event_removed: true,
                assignment_removed: None,
            };
            let mut invitations = 0;
            if let Some(assignment) = linked_assignment(conn, &event)? {
                if documents::<Assignment>(conn).delete(&assignment.id)? {
                    invitations = delete_invitations_for(conn, &assignment.id)?;
                    deletion.assignment_removed = Some(assignment.id);
                }
            }
            Ok((deletion, invitations))
        })?;

        if !deletion.event_removed {
            return Ok(deletion);
        }
        info!(
            "event=calendar_delete module=calendar status=ok id={id} assignment_removed={}",
            deletion.assignment_removed.is_some()
        );
        self.store.notify(ChangeEvent::EventsUpdated);
        if deletion.assignment_removed.is_some() {
            self.store.notify(ChangeEvent::AssignmentUpdated);
        }
        if invitations > 0 {
            self.store.notify(ChangeEvent::InvitationUpdated);
        }
        Ok(deletion)
    }

    pub fn list_events(&self) -> RepoResult<Vec<CalendarEvent>> {
        self.store.documents::<CalendarEvent>().list()
    }

    pub fn events_for_staffer(&self, staffer_id: &str) -> RepoResult<Vec<CalendarEvent>> {
        self.store
            .documents::<CalendarEvent>()
            .find_by_field("stafferId", staffer_id)
    }

    /// Clears `assignment_id` on events whose assignment no longer exists.
    /// Returns how many events were touched.
    pub fn prune_stale_event_links(&self) -> ServiceResult<usize> {
        let pruned = self.store.transaction(|conn| {
            let events = documents::<CalendarEvent>(conn);
            let assignments = documents::<Assignment>(conn);
            let mut pruned = 0;
            for event in events.list()? {
                let Some(assignment_id) = &event.assignment_id else {
                    continue;
                };
                if assignments.get(assignment_id)?.is_some() {
                    continue;
                }
                let mut relinked = event.clone();
                relinked.assignment_id = None;
                events.upsert(&relinked)?;
                pruned += 1;
            }
            Ok(pruned)
        })?;

        if pruned > 0 {
            info!("event=calendar_prune module=calendar status=ok pruned={pruned}");
            self.store.notify(ChangeEvent::EventsUpdated);
        }
        Ok(pruned)
    }

    /// Mirrors an assignment's task onto the calendar as a task event.
    pub fn schedule_assignment(&self, assignment_id: &str) -> ServiceResult<CalendarEvent> {
        let assignment = self
            .store
            .documents::<Assignment>()
            .get(assignment_id)?
            .ok_or_else(|| not_found::<Assignment>(assignment_id))?;

        let title = assignment
            .task_title
            .clone()
            .filter(|title| !is_blank(title))
            .ok_or_else(|| ServiceError::Validation("assignment has no task title".to_string()))?;
        let date = assignment
            .task_date
            .clone()
            .filter(|date| !is_blank(date))
            .ok_or_else(|| ServiceError::Validation("assignment has no task date".to_string()))?;

        self.create_event(NewCalendarEvent {
            title,
            start: date,
            end: None,
            all_day: true,
            staffer_id: Some(assignment.assigned_to_id.clone()),
            assignment_id: Some(assignment.id.clone()),
            task: true,
        })
    }
}

fn validate_event(event: &CalendarEvent) -> ServiceResult<()> {
    require(&event.title, "title")?;
    let start = parse_calendar_instant(&event.start).ok_or_else(|| {
        ServiceError::Validation(format!("start `{}` is not a date or datetime", event.start))
    })?;
    if let Some(end) = &event.end {
        let end = parse_calendar_instant(end).ok_or_else(|| {
            ServiceError::Validation(format!("end `{end}` is not a date or datetime"))
        })?;
        if end < start {
            return Err(ServiceError::Validation(
                "end must not be earlier than start".to_string(),
            ));
        }
    }
    Ok(())
}

/// Assignment behind a task event: the direct link first, then a match on
/// title, task date and staffer.
fn linked_assignment(conn: &Connection, event: &CalendarEvent) -> RepoResult<Option<Assignment>> {
    let assignments = documents::<Assignment>(conn);
    if let Some(assignment_id) = &event.assignment_id {
        if let Some(assignment) = assignments.get(assignment_id)? {
            return Ok(Some(assignment));
        }
    }
    if !event.task {
        return Ok(None);
    }

    let Some(start_date) = event.start_date() else {
        return Ok(None);
    };
    let Some(staffer_id) = event.staffer_id.as_deref() else {
        return Ok(None);
    };
    Ok(assignments
        .find_by_field("assignedToId", staffer_id)?
        .into_iter()
        .find(|assignment| {
            assignment.task_title.as_deref() == Some(event.title.as_str())
                && assignment
                    .task_date
                    .as_deref()
                    .and_then(parse_calendar_instant)
                    .map(|instant| instant.date())
                    == Some(start_date)
        }))
}
