//! Executive-owned staffer teams.
//!
//! # Invariants
//! - A staffer appears at most once in a given owner's team.
//! - Ownership is matched through the identity graph, so a team added
//!   under an owner's email is visible under the owner's id and vice versa.

use crate::model::staffer::Staffer;
use crate::model::team::TeamMember;
use crate::model::user::SessionUser;
use crate::model::{new_id, now_iso};
use crate::notify::ChangeEvent;
use crate::repo::document_repo::DocumentRepository;
use crate::repo::RepoResult;
use crate::service::directory_service::identity_graph_on;
use crate::service::{documents, not_found, require, ServiceError, ServiceResult};
use crate::store::Store;
use log::info;
use std::collections::HashSet;

pub const TEAM_PERMISSION_MESSAGE: &str = "Only executives can manage a team";

pub struct TeamService<'s> {
    store: &'s Store,
}

impl<'s> TeamService<'s> {
    pub(crate) fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Adds `staffer_id` to the team owned by `owner`.
    ///
    /// # Errors
    /// - `PermissionDenied` when `owner` cannot manage.
    /// - `NotFound` when the staffer does not exist.
    /// - `Conflict` when the staffer is already on the owner's team.
    pub fn add_team_member(&self, owner: &SessionUser, staffer_id: &str) -> ServiceResult<TeamMember> {
        if !owner.can_manage() {
            return Err(ServiceError::PermissionDenied(TEAM_PERMISSION_MESSAGE));
        }
        require(staffer_id, "staffer id")?;

        let member = self.store.transaction(|conn| {
            let staffer = documents::<Staffer>(conn)
                .get(staffer_id)?
                .ok_or_else(|| not_found::<Staffer>(staffer_id))?;

            let graph = identity_graph_on(conn)?;
            let teams = documents::<TeamMember>(conn);
            let duplicate = teams
                .find_by_field("stafferId", &staffer.id)?
                .iter()
                .any(|member| graph.same_identity(&member.added_by, &owner.email));
            if duplicate {
                return Err(ServiceError::Conflict(format!(
                    "{} is already on this team",
                    staffer.full_name()
                )));
            }

            let member = TeamMember {
                id: new_id(),
                staffer_id: staffer.id.clone(),
                staffer_name: staffer.full_name(),
                section: staffer.section,
                added_by: owner.email.clone(),
                added_by_name: owner.name.clone(),
                created_at: Some(now_iso()),
            };
            teams.insert(&member)?;
            Ok(member)
        })?;

        info!(
            "event=team_add module=teams status=ok id={} staffer_id={}",
            member.id, member.staffer_id
        );
        self.store.notify(ChangeEvent::TeamUpdated);
        Ok(member)
    }

    pub fn remove_team_member(&self, member_id: &str) -> RepoResult<bool> {
        let removed = self.store.documents::<TeamMember>().delete(member_id)?;
        if removed {
            self.store.notify(ChangeEvent::TeamUpdated);
        }
        Ok(removed)
    }

    pub fn list_team_members(&self) -> RepoResult<Vec<TeamMember>> {
        self.store.documents::<TeamMember>().list()
    }

    /// Memberships owned by any alias of `owner`.
    pub fn team_of(&self, owner: &str) -> RepoResult<Vec<TeamMember>> {
        let conn = self.store.connection();
        let graph = identity_graph_on(conn)?;
        Ok(documents::<TeamMember>(conn)
            .list()?
            .into_iter()
            .filter(|member| graph.same_identity(&member.added_by, owner))
            .collect())
    }

    /// Staffers not yet on `owner`'s team, excluding the owner themself.
    pub fn available_staffers(&self, owner: &str) -> RepoResult<Vec<Staffer>> {
        let conn = self.store.connection();
        let graph = identity_graph_on(conn)?;
        let taken: HashSet<String> = self
            .team_of(owner)?
            .into_iter()
            .map(|member| member.staffer_id)
            .collect();
        Ok(documents::<Staffer>(conn)
            .list()?
            .into_iter()
            .filter(|staffer| !taken.contains(&staffer.id))
            .filter(|staffer| !graph.same_identity(&staffer.id, owner))
            .collect())
    }
}
