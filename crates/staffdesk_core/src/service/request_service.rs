//! Client request intake and approval.
//!
//! # Invariants
//! - New requests start `pending`.
//! - Only managers (admin role or executive position) approve or deny.
//! - A denial always records a reason.

use crate::model::request::{ClientRequest, ClientRequestPatch, NewClientRequest, RequestStatus};
use crate::model::user::SessionUser;
use crate::model::{new_id, now_iso};
use crate::notify::ChangeEvent;
use crate::repo::document_repo::{to_patch, DocumentPatch, DocumentRepository};
use crate::repo::RepoResult;
use crate::service::{require, require_email, ServiceError, ServiceResult};
use crate::store::Store;
use log::info;
use serde_json::Value;

pub const REQUEST_PERMISSION_MESSAGE: &str = "You do not have permission to review client requests";

pub struct RequestService<'s> {
    store: &'s Store,
}

impl<'s> RequestService<'s> {
    pub(crate) fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Submits a client request. Title, date and client email are required.
    pub fn create_request(&self, input: NewClientRequest) -> ServiceResult<ClientRequest> {
        require(&input.title, "title")?;
        require(&input.date, "date")?;
        require_email(&input.client_email)?;

        let request = ClientRequest {
            id: new_id(),
            title: input.title.trim().to_string(),
            description: input.description,
            date: input.date.trim().to_string(),
            time: input.time,
            location: input.location,
            status: RequestStatus::Pending,
            client_email: input.client_email.trim().to_string(),
            client_name: input.client_name,
            created_at: Some(now_iso()),
            ..ClientRequest::default()
        };
        self.store.documents::<ClientRequest>().insert(&request)?;

        info!(
            "event=request_create module=requests status=ok id={}",
            request.id
        );
        self.store.notify(ChangeEvent::RequestUpdated);
        Ok(request)
    }

    pub fn list_requests(&self) -> RepoResult<Vec<ClientRequest>> {
        self.store.documents::<ClientRequest>().list()
    }

    pub fn get_request(&self, id: &str) -> RepoResult<Option<ClientRequest>> {
        self.store.documents::<ClientRequest>().get(id)
    }

    pub fn requests_for_client(&self, client_email: &str) -> RepoResult<Vec<ClientRequest>> {
        self.store
            .documents::<ClientRequest>()
            .find_by_field_ci("clientEmail", client_email)
    }

    pub fn requests_with_status(&self, status: RequestStatus) -> RepoResult<Vec<ClientRequest>> {
        Ok(self
            .list_requests()?
            .into_iter()
            .filter(|request| request.status == status)
            .collect())
    }

    pub fn pending_requests(&self) -> RepoResult<Vec<ClientRequest>> {
        self.requests_with_status(RequestStatus::Pending)
    }

    /// Edits descriptive fields. Returns `Ok(None)` for an unknown id.
    pub fn update_request(
        &self,
        id: &str,
        patch: &ClientRequestPatch,
    ) -> ServiceResult<Option<ClientRequest>> {
        if patch.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
            return Err(ServiceError::Validation("title is required".to_string()));
        }
        let changes = to_patch(patch)?;
        let updated = self.store.documents::<ClientRequest>().update(id, &changes)?;
        if updated.is_some() {
            self.store.notify(ChangeEvent::RequestUpdated);
        }
        Ok(updated)
    }

    pub fn approve_request(
        &self,
        id: &str,
        actor: &SessionUser,
    ) -> ServiceResult<Option<ClientRequest>> {
        ensure_manager(actor)?;
        let mut changes = DocumentPatch::new();
        changes.insert("status".to_string(), Value::from("approved"));
        changes.insert("approvedBy".to_string(), Value::from(actor.email.clone()));
        changes.insert("approvedByName".to_string(), Value::from(actor.name.clone()));
        changes.insert("approvedAt".to_string(), Value::from(now_iso()));
        self.transition(id, &changes, RequestStatus::Approved)
    }

    pub fn deny_request(
        &self,
        id: &str,
        actor: &SessionUser,
        reason: &str,
    ) -> ServiceResult<Option<ClientRequest>> {
        ensure_manager(actor)?;
        require(reason, "reason of denial")?;
        let mut changes = DocumentPatch::new();
        changes.insert("status".to_string(), Value::from("denied"));
        changes.insert("deniedBy".to_string(), Value::from(actor.email.clone()));
        changes.insert("deniedByName".to_string(), Value::from(actor.name.clone()));
        changes.insert("deniedAt".to_string(), Value::from(now_iso()));
        changes.insert("reasonOfDenial".to_string(), Value::from(reason.trim()));
        self.transition(id, &changes, RequestStatus::Denied)
    }

    pub fn delete_request(&self, id: &str) -> RepoResult<bool> {
        let removed = self.store.documents::<ClientRequest>().delete(id)?;
        if removed {
            self.store.notify(ChangeEvent::RequestUpdated);
        }
        Ok(removed)
    }

    fn transition(
        &self,
        id: &str,
        changes: &DocumentPatch,
        status: RequestStatus,
    ) -> ServiceResult<Option<ClientRequest>> {
        let updated = self.store.documents::<ClientRequest>().update(id, changes)?;
        if let Some(request) = &updated {
            info!(
                "event=request_review module=requests status=ok id={} outcome={:?}",
                request.id, status
            );
            self.store.notify(ChangeEvent::RequestUpdated);
        }
        Ok(updated)
    }
}

fn ensure_manager(actor: &SessionUser) -> ServiceResult<()> {
    if actor.can_manage() {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(REQUEST_PERMISSION_MESSAGE))
    }
}
