//! Core storage and workflow logic for StaffDesk.
//! This crate is the single source of truth for entity invariants.

pub mod config;
pub mod db;
pub mod identity;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod seed;
pub mod service;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use identity::IdentityGraph;
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::assignment::{
    Assignment, AssignmentInvitation, AssignmentStatus, InvitationStatus, NewAssignment,
};
pub use model::calendar::{CalendarEvent, CalendarEventPatch, NewCalendarEvent};
pub use model::request::{ClientRequest, ClientRequestPatch, NewClientRequest, RequestStatus};
pub use model::schedule::{ClientAvailability, ScheduleNote, ScheduleSlot, Semester};
pub use model::staffer::{NewStaffer, Section, Staffer, StafferPatch};
pub use model::team::TeamMember;
pub use model::user::{Role, Session, SessionUser, User, UserPatch};
pub use model::{Collection, Entity};
pub use notify::{ChangeBus, ChangeEvent, ChangeNotification, ChangeOrigin, SubscriptionId};
pub use repo::document_repo::{CorruptDocument, DocumentRepository, SqliteDocumentRepository};
pub use repo::{RepoError, RepoResult};
pub use service::auth_service::AuthError;
pub use service::calendar_service::EventDeletion;
pub use service::directory_service::{NewUser, ReconcileReport};
pub use service::{ServiceError, ServiceResult};
pub use store::{ImportReport, OpenError, Store};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
