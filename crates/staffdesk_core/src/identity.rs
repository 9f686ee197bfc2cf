//! Identity reconciliation across staffer and user records.
//!
//! # Responsibility
//! - Treat a person's ids and emails as one identity for matching.
//! - Answer "which assignments belong to this person" for any alias.
//!
//! # Invariants
//! - Identifiers are compared trimmed and lowercased.
//! - Aliasing is the full transitive closure of id/email links, so matching
//!   is symmetric: if `a` resolves to `b`, `b` resolves to `a`.
//! - Display names are never aliases; they are not unique.

use crate::model::assignment::{Assignment, AssignmentInvitation};
use crate::model::normalize_identifier;
use crate::model::staffer::Staffer;
use crate::model::user::User;
use std::collections::{BTreeSet, HashMap};

/// Union-find over normalized identifiers.
#[derive(Debug, Default, Clone)]
pub struct IdentityGraph {
    index: HashMap<String, usize>,
    parent: Vec<usize>,
    keys: Vec<String>,
}

impl IdentityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from every staffer and user record.
    pub fn from_records(staffers: &[Staffer], users: &[User]) -> Self {
        let mut graph = Self::new();
        for staffer in staffers {
            graph.link(&staffer.id, &staffer.email);
        }
        for user in users {
            graph.link(&user.id, &user.email);
        }
        graph
    }

    /// Declares two identifiers as the same identity. Blank values are ignored.
    pub fn link(&mut self, left: &str, right: &str) {
        let left = self.node(left);
        let right = self.node(right);
        if let (Some(left), Some(right)) = (left, right) {
            self.union(left, right);
        }
    }

    /// Every identifier equivalent to `identifier`, including itself.
    pub fn aliases_of(&self, identifier: &str) -> BTreeSet<String> {
        let key = normalize_identifier(identifier);
        let mut aliases = BTreeSet::new();
        if key.is_empty() {
            return aliases;
        }

        match self.index.get(&key) {
            Some(&node) => {
                let root = self.find(node);
                for (candidate, name) in self.keys.iter().enumerate() {
                    if self.find(candidate) == root {
                        aliases.insert(name.clone());
                    }
                }
            }
            None => {
                aliases.insert(key);
            }
        }
        aliases
    }

    pub fn same_identity(&self, left: &str, right: &str) -> bool {
        let left = normalize_identifier(left);
        let right = normalize_identifier(right);
        if left.is_empty() || right.is_empty() {
            return false;
        }
        if left == right {
            return true;
        }
        match (self.index.get(&left), self.index.get(&right)) {
            (Some(&a), Some(&b)) => self.find(a) == self.find(b),
            _ => false,
        }
    }

    /// Assignments whose recipient fields name any alias of `identifier`.
    pub fn assignments_for<'a>(
        &self,
        identifier: &str,
        assignments: &'a [Assignment],
    ) -> Vec<&'a Assignment> {
        let aliases = self.aliases_of(identifier);
        assignments
            .iter()
            .filter(|assignment| {
                assignment
                    .recipient_keys()
                    .any(|key| aliases.contains(&key))
            })
            .collect()
    }

    /// Invitations addressed to any alias of `identifier`.
    pub fn invitations_for<'a>(
        &self,
        identifier: &str,
        invitations: &'a [AssignmentInvitation],
    ) -> Vec<&'a AssignmentInvitation> {
        let aliases = self.aliases_of(identifier);
        invitations
            .iter()
            .filter(|invitation| aliases.contains(&normalize_identifier(&invitation.invited_to)))
            .collect()
    }

    /// First staffer whose id or email is an alias of `identifier`.
    pub fn resolve_staffer<'a>(&self, identifier: &str, staffers: &'a [Staffer]) -> Option<&'a Staffer> {
        let aliases = self.aliases_of(identifier);
        if aliases.is_empty() {
            return None;
        }
        staffers.iter().find(|staffer| {
            aliases.contains(&normalize_identifier(&staffer.id))
                || aliases.contains(&normalize_identifier(&staffer.email))
        })
    }

    fn node(&mut self, identifier: &str) -> Option<usize> {
        let key = normalize_identifier(identifier);
        if key.is_empty() {
            return None;
        }
        if let Some(&node) = self.index.get(&key) {
            return Some(node);
        }
        let node = self.parent.len();
        self.parent.push(node);
        self.keys.push(key.clone());
        self.index.insert(key, node);
        Some(node)
    }

    fn find(&self, mut node: usize) -> usize {
        while self.parent[node] != node {
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, left: usize, right: usize) {
        let left_root = self.find(left);
        let right_root = self.find(right);
        if left_root == right_root {
            return;
        }
        // Lower index wins so the root is independent of link order.
        let (root, child) = if left_root < right_root {
            (left_root, right_root)
        } else {
            (right_root, left_root)
        };
        self.parent[child] = root;
    }
}
