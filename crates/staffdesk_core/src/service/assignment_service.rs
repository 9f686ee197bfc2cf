//! Assignment lifecycle and assignment invitations.
//!
//! # Responsibility
//! - Create assignments for staffers resolved through the identity graph.
//! - Gate approval and rejection behind the management check.
//! - Track invitations separately from assignment status.
//!
//! # Invariants
//! - A stored assignment always names a known staffer by id, email and name.
//! - A denied approval or rejection leaves the assignment untouched.
//! - Deleting an assignment deletes its invitations in the same transaction.

use crate::model::assignment::{
    Assignment, AssignmentInvitation, AssignmentStatus, InvitationStatus, NewAssignment,
};
use crate::model::request::ClientRequest;
use crate::model::staffer::Staffer;
use crate::model::user::SessionUser;
use crate::model::{is_blank, new_id, now_iso};
use crate::notify::ChangeEvent;
use crate::repo::document_repo::{DocumentPatch, DocumentRepository};
use crate::repo::RepoResult;
use crate::service::directory_service::{identity_graph_on, resolve_staffer_on};
use crate::service::{documents, not_found, require, ServiceError, ServiceResult};
use crate::store::Store;
use log::{info, warn};
use rusqlite::Connection;
use serde_json::Value;

pub const APPROVE_PERMISSION_MESSAGE: &str = "You do not have permission to approve assignments";
pub const REJECT_PERMISSION_MESSAGE: &str = "You do not have permission to reject assignments";
pub const COMPLETE_PERMISSION_MESSAGE: &str =
    "Only the assignee or a manager can complete this assignment";
pub const RESPOND_PERMISSION_MESSAGE: &str = "Only the invited staffer can respond to this invitation";

pub struct AssignmentService<'s> {
    store: &'s Store,
}

impl<'s> AssignmentService<'s> {
    pub(crate) fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Creates a pending assignment.
    ///
    /// # Errors
    /// - `Validation` when the assignee is blank, or when neither a request
    ///   id nor a task title is given.
    /// - `NotFound` when the assignee or the referenced request is unknown.
    pub fn create_assignment(
        &self,
        input: NewAssignment,
        actor: &SessionUser,
    ) -> ServiceResult<Assignment> {
        let assignment = self
            .store
            .transaction(|conn| insert_assignment(conn, input, actor))?;

        info!(
            "event=assignment_create module=assignments status=ok id={} section={}",
            assignment.id,
            assignment.section.as_str()
        );
        self.store.notify(ChangeEvent::AssignmentUpdated);
        Ok(assignment)
    }

    /// Assigns a client request and invites the assignee in one transaction.
    pub fn assign_request(
        &self,
        request_id: &str,
        assignee: &str,
        actor: &SessionUser,
    ) -> ServiceResult<(Assignment, AssignmentInvitation)> {
        require(request_id, "request id")?;
        let (assignment, invitation) = self.store.transaction(|conn| {
            let input = NewAssignment {
                assignee: assignee.to_string(),
                request_id: Some(request_id.to_string()),
                ..NewAssignment::default()
            };
            let assignment = insert_assignment(conn, input, actor)?;
            let invitation = AssignmentInvitation {
                id: new_id(),
                assignment_id: assignment.id.clone(),
                request_id: assignment.request_id.clone(),
                invited_to: assignment.assigned_to_id.clone(),
                invited_by: actor.email.clone(),
                status: InvitationStatus::Pending,
                created_at: Some(now_iso()),
                responded_at: None,
            };
            documents::<AssignmentInvitation>(conn).insert(&invitation)?;
            Ok((assignment, invitation))
        })?;

        info!(
            "event=request_assign module=assignments status=ok assignment_id={} invitation_id={}",
            assignment.id, invitation.id
        );
        self.store.notify(ChangeEvent::AssignmentUpdated);
        self.store.notify(ChangeEvent::InvitationUpdated);
        Ok((assignment, invitation))
    }

    pub fn list_assignments(&self) -> RepoResult<Vec<Assignment>> {
        self.store.documents::<Assignment>().list()
    }

    pub fn get_assignment(&self, id: &str) -> RepoResult<Option<Assignment>> {
        self.store.documents::<Assignment>().get(id)
    }

    /// Assignments addressed to any alias of `identifier`.
    pub fn assignments_for(&self, identifier: &str) -> RepoResult<Vec<Assignment>> {
        let conn = self.store.connection();
        let graph = identity_graph_on(conn)?;
        let assignments = documents::<Assignment>(conn).list()?;
        Ok(graph
            .assignments_for(identifier, &assignments)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn assignments_for_request(&self, request_id: &str) -> RepoResult<Vec<Assignment>> {
        self.store
            .documents::<Assignment>()
            .find_by_field("requestId", request_id)
    }

    pub fn approve_assignment(
        &self,
        id: &str,
        actor: &SessionUser,
    ) -> ServiceResult<Option<Assignment>> {
        if !actor.can_manage() {
            warn!("event=assignment_approve module=assignments status=denied id={id}");
            return Err(ServiceError::PermissionDenied(APPROVE_PERMISSION_MESSAGE));
        }
        let now = now_iso();
        let mut changes = DocumentPatch::new();
        changes.insert("status".to_string(), Value::from("approved"));
        changes.insert("approvedBy".to_string(), Value::from(actor.email.clone()));
        changes.insert("approvedAt".to_string(), Value::from(now.clone()));
        changes.insert("updatedAt".to_string(), Value::from(now));
        self.apply_status(id, &changes, AssignmentStatus::Approved)
    }

    pub fn reject_assignment(
        &self,
        id: &str,
        actor: &SessionUser,
        reason: &str,
    ) -> ServiceResult<Option<Assignment>> {
        if !actor.can_manage() {
            warn!("event=assignment_reject module=assignments status=denied id={id}");
            return Err(ServiceError::PermissionDenied(REJECT_PERMISSION_MESSAGE));
        }
        require(reason, "reason for rejection")?;
        let now = now_iso();
        let mut changes = DocumentPatch::new();
        changes.insert("status".to_string(), Value::from("rejected"));
        changes.insert("rejectedBy".to_string(), Value::from(actor.email.clone()));
        changes.insert("rejectedAt".to_string(), Value::from(now.clone()));
        changes.insert("reasonForRejection".to_string(), Value::from(reason.trim()));
        changes.insert("updatedAt".to_string(), Value::from(now));
        self.apply_status(id, &changes, AssignmentStatus::Rejected)
    }

    /// Marks an assignment completed. Allowed for the assignee or a manager.
    pub fn complete_assignment(
        &self,
        id: &str,
        actor: &SessionUser,
    ) -> ServiceResult<Option<Assignment>> {
        let conn = self.store.connection();
        let Some(assignment) = documents::<Assignment>(conn).get(id)? else {
            return Ok(None);
        };
        if !actor.can_manage() && !is_recipient(conn, &assignment, actor)? {
            return Err(ServiceError::PermissionDenied(COMPLETE_PERMISSION_MESSAGE));
        }
        let now = now_iso();
        let mut changes = DocumentPatch::new();
        changes.insert("status".to_string(), Value::from("completed"));
        changes.insert("completedAt".to_string(), Value::from(now.clone()));
        changes.insert("updatedAt".to_string(), Value::from(now));
        self.apply_status(id, &changes, AssignmentStatus::Completed)
    }

    /// Deletes an assignment and its invitations.
    pub fn delete_assignment(&self, id: &str) -> ServiceResult<bool> {
        let (removed, invitations) = self.store.transaction(|conn| {
            if !documents::<Assignment>(conn).delete(id)? {
                return Ok((false, 0));
            }
            Ok((true, delete_invitations_for(conn, id)?))
        })?;

        if removed {
            info!(
                "event=assignment_delete module=assignments status=ok id={id} invitations={invitations}"
            );
            self.store.notify(ChangeEvent::AssignmentUpdated);
        }
        if invitations > 0 {
            self.store.notify(ChangeEvent::InvitationUpdated);
        }
        Ok(removed)
    }

    pub fn list_invitations(&self) -> RepoResult<Vec<AssignmentInvitation>> {
        self.store.documents::<AssignmentInvitation>().list()
    }

    /// Invitations addressed to any alias of `identifier`.
    pub fn invitations_for(&self, identifier: &str) -> RepoResult<Vec<AssignmentInvitation>> {
        let conn = self.store.connection();
        let graph = identity_graph_on(conn)?;
        let invitations = documents::<AssignmentInvitation>(conn).list()?;
        Ok(graph
            .invitations_for(identifier, &invitations)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn accept_invitation(
        &self,
        id: &str,
        actor: &SessionUser,
    ) -> ServiceResult<Option<AssignmentInvitation>> {
        self.respond(id, actor, InvitationStatus::Accepted)
    }

    pub fn decline_invitation(
        &self,
        id: &str,
        actor: &SessionUser,
    ) -> ServiceResult<Option<AssignmentInvitation>> {
        self.respond(id, actor, InvitationStatus::Declined)
    }

    fn respond(
        &self,
        id: &str,
        actor: &SessionUser,
        status: InvitationStatus,
    ) -> ServiceResult<Option<AssignmentInvitation>> {
        let conn = self.store.connection();
        let invitations = documents::<AssignmentInvitation>(conn);
        let Some(invitation) = invitations.get(id)? else {
            return Ok(None);
        };

        let graph = identity_graph_on(conn)?;
        let invited = graph.same_identity(&invitation.invited_to, &actor.id)
            || graph.same_identity(&invitation.invited_to, &actor.email);
        if !invited {
            return Err(ServiceError::PermissionDenied(RESPOND_PERMISSION_MESSAGE));
        }

        let mut changes = DocumentPatch::new();
        changes.insert("status".to_string(), Value::from(status.as_str()));
        changes.insert("respondedAt".to_string(), Value::from(now_iso()));
        let updated = invitations.update(id, &changes)?;
        if updated.is_some() {
            info!(
                "event=invitation_respond module=assignments status=ok id={id} outcome={}",
                status.as_str()
            );
            self.store.notify(ChangeEvent::InvitationUpdated);
        }
        Ok(updated)
    }

    fn apply_status(
        &self,
        id: &str,
        changes: &DocumentPatch,
        status: AssignmentStatus,
    ) -> ServiceResult<Option<Assignment>> {
        let updated = self.store.documents::<Assignment>().update(id, changes)?;
        if updated.is_some() {
            info!("event=assignment_status module=assignments status=ok id={id} outcome={status:?}");
            self.store.notify(ChangeEvent::AssignmentUpdated);
        }
        Ok(updated)
    }
}

fn insert_assignment(
    conn: &Connection,
    input: NewAssignment,
    actor: &SessionUser,
) -> ServiceResult<Assignment> {
    require(&input.assignee, "assignee")?;
    let request_id = input.request_id.filter(|id| !is_blank(id));
    let task_title = input.task_title.filter(|title| !is_blank(title));

    match &request_id {
        Some(request_id) => {
            if documents::<ClientRequest>(conn).get(request_id)?.is_none() {
                return Err(not_found::<ClientRequest>(request_id));
            }
        }
        None if task_title.is_none() => {
            return Err(ServiceError::Validation(
                "a request or a task title is required".to_string(),
            ));
        }
        None => {}
    }

    let staffer = resolve_staffer_on(conn, &input.assignee)?
        .ok_or_else(|| not_found::<Staffer>(input.assignee.trim()))?;

    let now = now_iso();
    let assignment = Assignment {
        id: new_id(),
        request_id,
        assigned_to: staffer.id.clone(),
        assigned_to_id: staffer.id.clone(),
        assigned_to_email: staffer.email.clone(),
        assigned_to_name: staffer.full_name(),
        section: staffer.section,
        assigned_by: actor.name.clone(),
        assigned_by_email: actor.email.clone(),
        status: AssignmentStatus::Pending,
        task_title,
        task_date: input.task_date,
        task_time: input.task_time,
        task_location: input.task_location,
        created_at: Some(now.clone()),
        updated_at: Some(now),
        ..Assignment::default()
    };
    documents::<Assignment>(conn).insert(&assignment)?;
    Ok(assignment)
}

fn is_recipient(conn: &Connection, assignment: &Assignment, actor: &SessionUser) -> RepoResult<bool> {
    let graph = identity_graph_on(conn)?;
    Ok(assignment.recipient_keys().any(|key| {
        graph.same_identity(&key, &actor.id) || graph.same_identity(&key, &actor.email)
    }))
}

/// Removes every invitation pointing at `assignment_id`. Returns how many went.
pub(crate) fn delete_invitations_for(conn: &Connection, assignment_id: &str) -> RepoResult<usize> {
    let invitations = documents::<AssignmentInvitation>(conn);
    let mut removed = 0;
    for invitation in invitations.find_by_field("assignmentId", assignment_id)? {
        if invitations.delete(&invitation.id)? {
            removed += 1;
        }
    }
    Ok(removed)
}
