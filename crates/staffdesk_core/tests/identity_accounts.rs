use serde_json::json;
use staffdesk_core::repo::state_repo::{SqliteStateRepository, StateRepository, SESSION_KEY};
use staffdesk_core::{
    AuthError, Collection, NewStaffer, Role, Section, ServiceError, SessionUser, StafferPatch,
    Store, StoreConfig, UserPatch,
};

fn store() -> Store {
    Store::open_in_memory().unwrap()
}

fn import_person(store: &Store, staffer_password: &str, user_password: Option<&str>) {
    let staffers = json!([{
        "id": "S1",
        "firstName": "Rico",
        "lastName": "Lim",
        "email": "rico@x.com",
        "password": staffer_password,
        "position": "Writer",
        "section": "scribes"
    }]);
    store
        .import_legacy(Collection::Staffers, &staffers.to_string())
        .unwrap();

    if let Some(password) = user_password {
        let users = json!([{
            "id": "U9",
            "email": "Rico@X.com",
            "password": password,
            "role": "staffer",
            "name": "Rico Lim"
        }]);
        store.import_legacy(Collection::Users, &users.to_string()).unwrap();
    }
}

#[test]
fn assignments_match_across_staffer_and_user_ids() {
    let store = store();
    import_person(&store, "pw", Some("pw"));
    let assignments = json!([
        { "id": "a1", "assignedTo": "U9", "status": "pending" },
        { "id": "a2", "assignedTo": "S1", "status": "pending" },
        { "id": "a3", "assignedToEmail": "RICO@x.com", "status": "pending" },
        { "id": "a4", "assignedTo": "someone-else", "status": "pending" }
    ]);
    store
        .import_legacy(Collection::Assignments, &assignments.to_string())
        .unwrap();

    for identifier in ["S1", "U9", "rico@x.com"] {
        let mut ids: Vec<String> = store
            .assignments()
            .assignments_for(identifier)
            .unwrap()
            .into_iter()
            .map(|assignment| assignment.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a1", "a2", "a3"], "lookup by {identifier}");
    }
}

#[test]
fn display_names_are_not_identity_keys() {
    let store = store();
    import_person(&store, "pw", None);
    let assignments = json!([{ "id": "a1", "assignedTo": "Rico Lim", "status": "pending" }]);
    store
        .import_legacy(Collection::Assignments, &assignments.to_string())
        .unwrap();

    assert!(store.assignments().assignments_for("S1").unwrap().is_empty());
}

#[test]
fn creating_a_staffer_creates_its_login_user() {
    let store = store();
    let staffer = store
        .directory()
        .create_staffer(NewStaffer {
            first_name: "Mia".to_string(),
            last_name: "Ong".to_string(),
            email: "mia@x.com".to_string(),
            password: "pw1".to_string(),
            position: "Section Head - Scribes".to_string(),
            section: Section::Scribes,
            ..NewStaffer::default()
        })
        .unwrap();

    let user = store
        .directory()
        .find_user_by_email("MIA@x.com")
        .unwrap()
        .unwrap();
    assert_eq!(user.name, "Mia Ong");
    assert_eq!(user.role, Role::SectionHead);
    assert_eq!(user.position.as_deref(), Some("Section Head - Scribes"));
    assert!(store
        .directory()
        .identity_graph()
        .unwrap()
        .same_identity(&staffer.id, &user.id));
}

#[test]
fn explicit_staffer_role_wins_over_position() {
    let store = store();
    store
        .directory()
        .create_staffer(NewStaffer {
            first_name: "Kai".to_string(),
            last_name: "Yu".to_string(),
            email: "kai@x.com".to_string(),
            password: "pw1".to_string(),
            position: "Editor-in-Chief".to_string(),
            role: Some(Role::Client),
            ..NewStaffer::default()
        })
        .unwrap();

    let user = store.directory().find_user_by_email("kai@x.com").unwrap().unwrap();
    assert_eq!(user.role, Role::Client);
}

#[test]
fn duplicate_staffer_email_is_a_conflict() {
    let store = store();
    let input = NewStaffer {
        first_name: "Kai".to_string(),
        last_name: "Yu".to_string(),
        email: "kai@x.com".to_string(),
        password: "pw1".to_string(),
        ..NewStaffer::default()
    };
    store.directory().create_staffer(input.clone()).unwrap();

    let again = NewStaffer {
        email: "KAI@x.com".to_string(),
        ..input
    };
    let err = store.directory().create_staffer(again).unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    assert_eq!(store.directory().list_staffers().unwrap().len(), 1);
}

#[test]
fn missing_fields_fail_staffer_creation() {
    let store = store();
    let err = store
        .directory()
        .create_staffer(NewStaffer {
            email: "kai@x.com".to_string(),
            password: "pw1".to_string(),
            ..NewStaffer::default()
        })
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(message) if message == "first name is required"));
}

#[test]
fn staffer_edits_flow_to_the_login_user() {
    let store = store();
    import_person(&store, "pw", Some("pw"));

    let patch = StafferPatch {
        email: Some("rico.lim@x.com".to_string()),
        password: Some("new-pw".to_string()),
        position: Some("Managing Editor".to_string()),
        ..StafferPatch::default()
    };
    store.directory().update_staffer("S1", &patch).unwrap().unwrap();

    let user = store.directory().get_user("U9").unwrap().unwrap();
    assert_eq!(user.email, "rico.lim@x.com");
    assert_eq!(user.password, "new-pw");
    assert_eq!(user.position.as_deref(), Some("Managing Editor"));
    assert_eq!(user.role, Role::Staffer);
    assert!(store
        .directory()
        .find_user_by_email("rico@x.com")
        .unwrap()
        .is_none());
}

#[test]
fn reconcile_is_explicit_and_idempotent() {
    let store = store();
    import_person(&store, "pw", None);

    assert!(store.directory().find_user_by_email("rico@x.com").unwrap().is_none());
    store.directory().list_staffers().unwrap();
    assert!(store.directory().find_user_by_email("rico@x.com").unwrap().is_none());

    let first = store.directory().reconcile_accounts().unwrap();
    assert_eq!(first.created_users.len(), 1);
    let second = store.directory().reconcile_accounts().unwrap();
    assert!(second.is_empty());
}

#[test]
fn reconcile_backfills_missing_positions() {
    let store = store();
    import_person(&store, "pw", Some("pw"));

    let report = store.directory().reconcile_accounts().unwrap();
    assert_eq!(report.backfilled_positions, 1);
    assert!(report.created_users.is_empty());
    let user = store.directory().get_user("U9").unwrap().unwrap();
    assert_eq!(user.position.as_deref(), Some("Writer"));
}

#[test]
fn staffer_credentials_materialize_a_user_on_sign_in() {
    let store = store();
    import_person(&store, "pw", None);

    let session = store
        .auth()
        .sign_in_with_password("rico@x.com", "pw")
        .unwrap();

    assert_eq!(session.user.email, "rico@x.com");
    assert_eq!(session.user.role, Role::Staffer);
    let user = store.directory().find_user_by_email("rico@x.com").unwrap().unwrap();
    assert_eq!(user.id, session.user.id);
    assert_eq!(store.auth().current_session().unwrap(), Some(session));
}

#[test]
fn staffer_password_repairs_a_drifted_user_password() {
    let store = store();
    import_person(&store, "fresh", Some("stale"));

    store.auth().sign_in_with_password("rico@x.com", "fresh").unwrap();
    let user = store.directory().get_user("U9").unwrap().unwrap();
    assert_eq!(user.password, "fresh");
    assert_eq!(store.directory().list_users().unwrap().len(), 1);
}

#[test]
fn wrong_password_is_rejected_without_writes() {
    let store = store();
    import_person(&store, "pw", None);

    let err = store
        .auth()
        .sign_in_with_password("rico@x.com", "nope")
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(store.directory().list_users().unwrap().is_empty());
    assert!(store.auth().current_session().unwrap().is_none());
}

#[test]
fn sign_out_clears_the_session() {
    let store = store();
    import_person(&store, "pw", Some("pw"));
    store.auth().sign_in_with_password("rico@x.com", "pw").unwrap();

    assert!(store.auth().sign_out().unwrap());
    assert!(!store.auth().sign_out().unwrap());
    assert!(store.auth().current_session().unwrap().is_none());
}

#[test]
fn expired_or_unreadable_sessions_are_cleared() {
    let store = store();
    let state = SqliteStateRepository::try_new(store.connection()).unwrap();

    let expired = json!({
        "user": { "id": "U9", "email": "rico@x.com", "role": "staffer", "name": "Rico Lim" },
        "expiresAt": 1
    });
    state.put_value(SESSION_KEY, &expired.to_string()).unwrap();
    assert!(store.auth().current_session().unwrap().is_none());
    assert!(state.get_value(SESSION_KEY).unwrap().is_none());

    state.put_value(SESSION_KEY, "{garbage").unwrap();
    assert!(store.auth().current_session().unwrap().is_none());
    assert!(state.get_value(SESSION_KEY).unwrap().is_none());
}

#[test]
fn profile_update_refreshes_the_session() {
    let store = store();
    import_person(&store, "pw", Some("pw"));
    store.auth().sign_in_with_password("rico@x.com", "pw").unwrap();

    let patch = UserPatch {
        name: Some("Rico L.".to_string()),
        password: Some(String::new()),
        ..UserPatch::default()
    };
    let user = store.auth().update_profile("U9", &patch).unwrap().unwrap();

    assert_eq!(user.name, "Rico L.");
    assert_eq!(user.password, "pw");
    let session = store.auth().current_session().unwrap().unwrap();
    assert_eq!(session.user, SessionUser::from(&user));
}

#[test]
fn seeded_store_has_default_accounts_and_executives() {
    let store = Store::open(StoreConfig::default()).unwrap();

    let staffers = store.directory().list_staffers().unwrap();
    assert_eq!(staffers.len(), 4);
    assert!(staffers.iter().all(|staffer| staffer.section == Section::Executives));
    assert!(staffers.iter().all(|staffer| staffer.avatar.is_some()));

    let admin = store
        .auth()
        .sign_in_with_password("admin@staffdesk.local", "admin123")
        .unwrap();
    assert!(admin.user.can_manage());

    let chief = store
        .directory()
        .find_user_by_email("eic@staffdesk.local")
        .unwrap()
        .unwrap();
    assert_eq!(chief.role, Role::Admin);
}

#[test]
fn reopening_a_seeded_file_does_not_seed_twice() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("staffdesk.db");

    let first = Store::open(StoreConfig::with_database_path(&path)).unwrap();
    let counts = first.collection_counts().unwrap();
    drop(first);

    let second = Store::open(StoreConfig::with_database_path(&path)).unwrap();
    assert_eq!(second.collection_counts().unwrap(), counts);
}

#[test]
fn signing_in_twice_rewrites_the_session() {
    let store = store();
    import_person(&store, "pw", Some("pw"));

    let first = store.auth().sign_in_with_password("rico@x.com", "pw").unwrap();
    let second = store.auth().sign_in_with_password("rico@x.com", "pw").unwrap();

    assert_eq!(first.user, second.user);
    assert_eq!(store.auth().current_session().unwrap(), Some(second));
}

#[test]
fn reimporting_the_same_ids_replaces_records() {
    let store = store();
    import_person(&store, "pw", Some("pw"));
    import_person(&store, "pw2", Some("pw2"));

    let staffers = store.directory().list_staffers().unwrap();
    assert_eq!(staffers.len(), 1);
    assert_eq!(staffers[0].password, "pw2");
    assert_eq!(store.directory().list_users().unwrap().len(), 1);
}

#[test]
fn staffer_email_already_used_by_another_user_is_a_conflict() {
    let store = store();
    let users = json!([{
        "id": "U1",
        "email": "taken@x.com",
        "password": "pw",
        "role": "client",
        "name": "Someone Else"
    }]);
    store.import_legacy(Collection::Users, &users.to_string()).unwrap();
    let lea = store
        .directory()
        .create_staffer(NewStaffer {
            first_name: "Lea".to_string(),
            last_name: "Tan".to_string(),
            email: "lea@x.com".to_string(),
            password: "pw1".to_string(),
            ..NewStaffer::default()
        })
        .unwrap();

    let patch = StafferPatch {
        email: Some("Taken@x.com".to_string()),
        ..StafferPatch::default()
    };
    let err = store.directory().update_staffer(&lea.id, &patch).unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    assert_eq!(store.directory().get_staffer(&lea.id).unwrap().unwrap().email, "lea@x.com");
    let holders: Vec<String> = store
        .directory()
        .list_users()
        .unwrap()
        .into_iter()
        .filter(|user| user.email.eq_ignore_ascii_case("taken@x.com"))
        .map(|user| user.id)
        .collect();
    assert_eq!(holders, vec!["U1"]);
}

#[test]
fn profile_changes_flow_back_to_the_staffer() {
    let store = store();
    let staffer = store
        .directory()
        .create_staffer(NewStaffer {
            first_name: "Lea".to_string(),
            last_name: "Tan".to_string(),
            email: "lea@x.com".to_string(),
            password: "pw1".to_string(),
            position: "Photographer".to_string(),
            ..NewStaffer::default()
        })
        .unwrap();
    let user = store.directory().find_user_by_email("lea@x.com").unwrap().unwrap();

    let patch = UserPatch {
        email: Some("lea.tan@x.com".to_string()),
        name: Some("Lea Marie Tan".to_string()),
        password: Some("pw2".to_string()),
        ..UserPatch::default()
    };
    store.auth().update_profile(&user.id, &patch).unwrap().unwrap();

    let staffer = store.directory().get_staffer(&staffer.id).unwrap().unwrap();
    assert_eq!(staffer.email, "lea.tan@x.com");
    assert_eq!(staffer.first_name, "Lea");
    assert_eq!(staffer.last_name, "Marie Tan");
    assert_eq!(staffer.password, "pw2");
    assert_eq!(staffer.position, "Photographer");
    assert!(store
        .directory()
        .identity_graph()
        .unwrap()
        .same_identity(&staffer.id, &user.id));

    assert!(store.directory().reconcile_accounts().unwrap().created_users.is_empty());
    assert_eq!(store.directory().list_users().unwrap().len(), 1);
}

#[test]
fn failed_seeding_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("staffdesk.db");
    let unseeded = || StoreConfig {
        seed_defaults: false,
        ..StoreConfig::with_database_path(&path)
    };

    let setup = Store::open(unseeded()).unwrap();
    setup
        .connection()
        .execute_batch(
            "CREATE TRIGGER reject_staffers BEFORE INSERT ON documents
             WHEN NEW.collection = 'app_staffers'
             BEGIN SELECT RAISE(ABORT, 'staffers are read-only'); END;",
        )
        .unwrap();
    drop(setup);

    assert!(Store::open(StoreConfig::with_database_path(&path)).is_err());

    let check = Store::open(unseeded()).unwrap();
    assert!(check.directory().list_users().unwrap().is_empty());
    check
        .connection()
        .execute_batch("DROP TRIGGER reject_staffers;")
        .unwrap();
    drop(check);

    let seeded = Store::open(StoreConfig::with_database_path(&path)).unwrap();
    assert_eq!(seeded.directory().list_users().unwrap().len(), 8);
    assert_eq!(seeded.directory().list_staffers().unwrap().len(), 4);
}
