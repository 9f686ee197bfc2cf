//! Default accounts and executive staffers for a fresh store.
//!
//! # Invariants
//! - Seeding only touches empty collections; existing data is never replaced.
//! - One seeding pass commits as a whole or not at all.
//! - Seeded staffers get login accounts through account reconciliation.

use crate::model::staffer::{Section, Staffer};
use crate::model::user::{Role, User};
use crate::model::{new_id, now_iso};
use crate::repo::document_repo::DocumentRepository;
use crate::repo::RepoResult;
use crate::service::directory_service::reconcile_accounts_on;
use crate::service::documents;
use crate::store::Store;
use rusqlite::{Connection, Transaction, TransactionBehavior};

const AVATAR_BASE_URL: &str = "https://i.pravatar.cc/150?u=";

struct SeedUser {
    email: &'static str,
    password: &'static str,
    role: Role,
    name: &'static str,
    position: &'static str,
}

const DEFAULT_USERS: &[SeedUser] = &[
    SeedUser {
        email: "admin@staffdesk.local",
        password: "admin123",
        role: Role::Admin,
        name: "Desk Administrator",
        position: "Administrator",
    },
    SeedUser {
        email: "staffer@staffdesk.local",
        password: "staffer123",
        role: Role::Staffer,
        name: "Default Staffer",
        position: "Staffer",
    },
    SeedUser {
        email: "client@staffdesk.local",
        password: "client123",
        role: Role::Client,
        name: "Default Client",
        position: "Client",
    },
    SeedUser {
        email: "sectionhead@staffdesk.local",
        password: "sectionhead123",
        role: Role::SectionHead,
        name: "Default Section Head",
        position: "Section Head",
    },
];

struct SeedStaffer {
    first_name: &'static str,
    last_name: &'static str,
    email: &'static str,
    password: &'static str,
    position: &'static str,
}

const DEFAULT_STAFFERS: &[SeedStaffer] = &[
    SeedStaffer {
        first_name: "Maria",
        last_name: "Santos",
        email: "eic@staffdesk.local",
        password: "eic12345",
        position: "Editor-in-Chief",
    },
    SeedStaffer {
        first_name: "Jose",
        last_name: "Reyes",
        email: "associate@staffdesk.local",
        password: "assoc12345",
        position: "Associate Editor",
    },
    SeedStaffer {
        first_name: "Ana",
        last_name: "Cruz",
        email: "managing@staffdesk.local",
        password: "managing12345",
        position: "Managing Editor",
    },
    SeedStaffer {
        first_name: "Paolo",
        last_name: "Garcia",
        email: "secretary@staffdesk.local",
        password: "secretary12345",
        position: "Executive Secretary",
    },
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub staffers: usize,
}

/// Seeds default users and executive staffers into empty collections.
pub fn seed_defaults(store: &Store) -> RepoResult<SeedReport> {
    let tx = Transaction::new_unchecked(store.connection(), TransactionBehavior::Immediate)?;
    let report = seed_on(&tx)?;
    tx.commit()?;
    Ok(report)
}

fn seed_on(conn: &Connection) -> RepoResult<SeedReport> {
    let users = documents::<User>(conn);
    let staffers = documents::<Staffer>(conn);
    let mut report = SeedReport::default();
    let created_at = now_iso();

    if users.count()? == 0 {
        for seed in DEFAULT_USERS {
            users.insert(&User {
                id: new_id(),
                email: seed.email.to_string(),
                password: seed.password.to_string(),
                role: seed.role,
                name: seed.name.to_string(),
                position: Some(seed.position.to_string()),
                avatar: None,
                created_at: Some(created_at.clone()),
                updated_at: None,
            })?;
            report.users += 1;
        }
    }

    if staffers.count()? == 0 {
        for seed in DEFAULT_STAFFERS {
            staffers.insert(&Staffer {
                id: new_id(),
                first_name: seed.first_name.to_string(),
                last_name: seed.last_name.to_string(),
                email: seed.email.to_string(),
                password: seed.password.to_string(),
                position: seed.position.to_string(),
                section: Section::Executives,
                role: None,
                avatar: Some(format!("{AVATAR_BASE_URL}{}", seed.email)),
                created_at: Some(created_at.clone()),
                updated_at: None,
            })?;
            report.staffers += 1;
        }
    }

    if report.staffers > 0 {
        reconcile_accounts_on(conn)?;
    }
    Ok(report)
}
