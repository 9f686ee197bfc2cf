//! In-process change notification.
//!
//! # Responsibility
//! - Let independently mounted consumers re-fetch after a store mutation.
//! - Carry changes observed from other store handles on the same database.
//!
//! # Invariants
//! - Every mutation publishes exactly one notification per affected event
//!   name, synchronously, with no debouncing.
//! - Subscribers run outside the registry lock and may subscribe or
//!   unsubscribe from inside a callback.

use crate::model::Collection;
use crate::repo::state_repo::SESSION_KEY;
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Named change signal consumers listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    UsersUpdated,
    StafferUpdated,
    RequestUpdated,
    AssignmentUpdated,
    TeamUpdated,
    InvitationUpdated,
    ScheduleNoteUpdated,
    ClientAvailabilityUpdated,
    EventsUpdated,
    SessionUpdated,
    ProfileUpdated,
}

impl ChangeEvent {
    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UsersUpdated => "usersUpdated",
            Self::StafferUpdated => "stafferUpdated",
            Self::RequestUpdated => "requestUpdated",
            Self::AssignmentUpdated => "assignmentUpdated",
            Self::TeamUpdated => "teamUpdated",
            Self::InvitationUpdated => "invitationUpdated",
            Self::ScheduleNoteUpdated => "scheduleNoteUpdated",
            Self::ClientAvailabilityUpdated => "clientAvailabilityUpdated",
            Self::EventsUpdated => "eventsUpdated",
            Self::SessionUpdated => "sessionUpdated",
            Self::ProfileUpdated => "profileUpdated",
        }
    }

    pub fn for_collection(collection: Collection) -> Self {
        match collection {
            Collection::Users => Self::UsersUpdated,
            Collection::Staffers => Self::StafferUpdated,
            Collection::Requests => Self::RequestUpdated,
            Collection::Assignments => Self::AssignmentUpdated,
            Collection::Teams => Self::TeamUpdated,
            Collection::Invitations => Self::InvitationUpdated,
            Collection::ScheduleNotes => Self::ScheduleNoteUpdated,
            Collection::ClientAvailability => Self::ClientAvailabilityUpdated,
            Collection::CalendarEvents => Self::EventsUpdated,
        }
    }

    /// Maps a raw storage key to its event.
    pub fn for_storage_key(key: &str) -> Option<Self> {
        if key == SESSION_KEY {
            return Some(Self::SessionUpdated);
        }
        Collection::from_storage_key(key).map(Self::for_collection)
    }
}

/// Where a change originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Written through this store handle.
    Local,
    /// Observed from another handle sharing the database.
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotification {
    pub event: ChangeEvent,
    pub origin: ChangeOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&ChangeNotification) + Send + Sync>;

/// Same-process publish/subscribe registry.
#[derive(Default)]
pub struct ChangeBus {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback invoked for every published notification.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ChangeNotification) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Removes a callback. Returns `false` when it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(current, _)| *current != id);
        listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    pub fn publish(&self, event: ChangeEvent, origin: ChangeOrigin) {
        let snapshot: Vec<Listener> = self
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        debug!(
            "event=change_publish module=notify status=ok name={} origin={:?} listeners={}",
            event.as_str(),
            origin,
            snapshot.len()
        );

        let notification = ChangeNotification { event, origin };
        for listener in snapshot {
            listener(&notification);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        // A panicking listener never runs under this lock, so a poisoned
        // guard still holds a consistent list.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
