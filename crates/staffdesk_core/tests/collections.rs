use serde_json::json;
use staffdesk_core::repo::document_repo::to_patch;
use staffdesk_core::{
    Collection, DocumentRepository, NewAssignment, NewCalendarEvent, NewClientRequest,
    NewStaffer, RepoError, Role, ScheduleSlot, Section, Semester, SessionUser, StafferPatch,
    Store, SqliteDocumentRepository, TeamMember,
};

fn store() -> Store {
    Store::open_in_memory().unwrap()
}

fn new_staffer(email: &str) -> NewStaffer {
    NewStaffer {
        first_name: "Lea".to_string(),
        last_name: "Tan".to_string(),
        email: email.to_string(),
        password: "secret1".to_string(),
        position: "Photographer".to_string(),
        section: Section::Creatives,
        ..NewStaffer::default()
    }
}

#[test]
fn created_staffer_reads_back_field_for_field() {
    let store = store();
    let created = store
        .directory()
        .create_staffer(new_staffer("lea@x.com"))
        .unwrap();

    let loaded = store.directory().get_staffer(&created.id).unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.full_name(), "Lea Tan");
    assert_eq!(loaded.section, Section::Creatives);
}

#[test]
fn every_workflow_record_reads_back_field_for_field() {
    let store = store();
    let admin = SessionUser {
        id: "admin-1".to_string(),
        email: "admin@x.com".to_string(),
        role: Role::Admin,
        name: "Desk Admin".to_string(),
        ..SessionUser::default()
    };
    let lea = store
        .directory()
        .create_staffer(new_staffer("lea@x.com"))
        .unwrap();

    let request = store
        .requests()
        .create_request(NewClientRequest {
            title: "Campus fair coverage".to_string(),
            date: "2024-05-01".to_string(),
            client_email: "client@x.com".to_string(),
            client_name: "Client".to_string(),
            ..NewClientRequest::default()
        })
        .unwrap();
    assert_eq!(store.requests().get_request(&request.id).unwrap(), Some(request.clone()));

    let (assigned, invitation) = store
        .assignments()
        .assign_request(&request.id, &lea.id, &admin)
        .unwrap();
    assert_eq!(
        store.assignments().get_assignment(&assigned.id).unwrap(),
        Some(assigned)
    );
    assert_eq!(store.assignments().list_invitations().unwrap(), vec![invitation]);

    let task = store
        .assignments()
        .create_assignment(
            NewAssignment {
                assignee: lea.email.clone(),
                task_title: Some("Shoot portraits".to_string()),
                task_date: Some("2024-05-02".to_string()),
                ..NewAssignment::default()
            },
            &admin,
        )
        .unwrap();
    assert_eq!(store.assignments().get_assignment(&task.id).unwrap(), Some(task));

    let member = store.teams().add_team_member(&admin, &lea.id).unwrap();
    assert_eq!(store.teams().list_team_members().unwrap(), vec![member]);

    let note = store
        .schedule()
        .save_schedule_note(
            ScheduleSlot {
                staffer_id: lea.id.clone(),
                day: "Monday".to_string(),
                time_slot: "07:00AM-07:30AM".to_string(),
                semester: Semester::First,
            },
            "Class",
            &admin,
        )
        .unwrap();
    assert_eq!(store.schedule().list_schedule_notes().unwrap(), vec![note]);

    let open_day = store
        .schedule()
        .set_availability("2024-05-03", true, "Open")
        .unwrap();
    assert_eq!(store.schedule().availability_on("2024-05-03").unwrap(), Some(open_day));

    let event = store
        .calendar()
        .create_event(NewCalendarEvent {
            title: "Editorial meeting".to_string(),
            start: "2024-05-04T10:00".to_string(),
            end: Some("2024-05-04T11:00".to_string()),
            staffer_id: Some(lea.id.clone()),
            ..NewCalendarEvent::default()
        })
        .unwrap();
    assert_eq!(store.calendar().list_events().unwrap(), vec![event]);
}

#[test]
fn legacy_documents_keep_their_camel_case_shape() {
    let store = store();
    let raw = json!([{
        "id": "s1",
        "firstName": "Ana",
        "lastName": "Cruz",
        "email": "ana@x.com",
        "password": "pw",
        "position": "Section Head",
        "section": "scribes"
    }])
    .to_string();
    store.import_legacy(Collection::Staffers, &raw).unwrap();

    let exported = store.export_collection(Collection::Staffers).unwrap();
    let value: serde_json::Value = serde_json::from_str(&exported).unwrap();
    assert_eq!(value[0]["firstName"], "Ana");
    assert_eq!(value[0]["section"], "scribes");
    assert!(value[0].get("first_name").is_none());
}

#[test]
fn empty_patch_leaves_record_unchanged() {
    let store = store();
    let created = store
        .directory()
        .create_staffer(new_staffer("lea@x.com"))
        .unwrap();

    let updated = store
        .directory()
        .update_staffer(&created.id, &StafferPatch::default())
        .unwrap()
        .unwrap();

    assert_eq!(updated, created);
    assert_eq!(
        store.directory().get_staffer(&created.id).unwrap().unwrap(),
        created
    );
}

#[test]
fn blank_password_in_patch_keeps_stored_password() {
    let store = store();
    let created = store
        .directory()
        .create_staffer(new_staffer("lea@x.com"))
        .unwrap();

    let patch = StafferPatch {
        password: Some(String::new()),
        position: Some("Senior Photographer".to_string()),
        ..StafferPatch::default()
    };
    let updated = store
        .directory()
        .update_staffer(&created.id, &patch)
        .unwrap()
        .unwrap();

    assert_eq!(updated.password, "secret1");
    assert_eq!(updated.position, "Senior Photographer");
    let user = store
        .directory()
        .find_user_by_email("lea@x.com")
        .unwrap()
        .unwrap();
    assert_eq!(user.password, "secret1");
}

#[test]
fn deleting_unknown_id_returns_false_and_changes_nothing() {
    let store = store();
    store
        .directory()
        .create_staffer(new_staffer("lea@x.com"))
        .unwrap();
    let before = store.collection_counts().unwrap();

    assert!(!store.directory().delete_staffer("missing").unwrap());
    assert!(!store.requests().delete_request("missing").unwrap());
    assert!(!store.teams().remove_team_member("missing").unwrap());
    assert!(!store.schedule().clear_availability("2024-01-01").unwrap());

    assert_eq!(store.collection_counts().unwrap(), before);
}

#[test]
fn updating_unknown_id_returns_none() {
    let store = store();
    let patch = StafferPatch {
        first_name: Some("Nobody".to_string()),
        ..StafferPatch::default()
    };
    assert!(store
        .directory()
        .update_staffer("missing", &patch)
        .unwrap()
        .is_none());
}

#[test]
fn duplicate_insert_is_rejected() {
    let store = store();
    let repo = SqliteDocumentRepository::<TeamMember>::try_new(store.connection()).unwrap();
    let member = TeamMember {
        id: "t1".to_string(),
        staffer_id: "s1".to_string(),
        ..TeamMember::default()
    };
    repo.insert(&member).unwrap();

    let err = repo.insert(&member).unwrap_err();
    assert!(matches!(err, RepoError::DuplicateId { collection: Collection::Teams, .. }));
    assert_eq!(repo.count().unwrap(), 1);
}

#[test]
fn update_never_rewrites_the_id() {
    let store = store();
    let repo = SqliteDocumentRepository::<TeamMember>::try_new(store.connection()).unwrap();
    repo.insert(&TeamMember {
        id: "t1".to_string(),
        ..TeamMember::default()
    })
    .unwrap();

    let patch = json!({ "id": "t2", "stafferName": "Lea Tan" });
    let patch = patch.as_object().cloned().unwrap();
    let updated = repo.update("t1", &patch).unwrap().unwrap();

    assert_eq!(updated.id, "t1");
    assert_eq!(updated.staffer_name, "Lea Tan");
    assert!(repo.get("t2").unwrap().is_none());
}

#[test]
fn lists_keep_insertion_order() {
    let store = store();
    for email in ["c@x.com", "a@x.com", "b@x.com"] {
        store.directory().create_staffer(new_staffer(email)).unwrap();
    }

    let emails: Vec<String> = store
        .directory()
        .list_staffers()
        .unwrap()
        .into_iter()
        .map(|staffer| staffer.email)
        .collect();
    assert_eq!(emails, vec!["c@x.com", "a@x.com", "b@x.com"]);
}

#[test]
fn corrupt_documents_are_skipped_and_reported() {
    let store = store();
    store
        .directory()
        .create_staffer(new_staffer("lea@x.com"))
        .unwrap();
    store
        .connection()
        .execute(
            "INSERT INTO documents (collection, id, body)
             VALUES ('app_staffers', 'broken', '{\"firstName\": 42}');",
            [],
        )
        .unwrap();

    assert_eq!(store.directory().list_staffers().unwrap().len(), 1);
    assert!(store.directory().get_staffer("broken").unwrap().is_none());

    let report = store.integrity_report().unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].collection, Collection::Staffers);
    assert_eq!(report[0].id, "broken");
}

#[test]
fn corrupt_legacy_snapshot_is_discarded() {
    let store = store();
    let report = store
        .import_legacy(Collection::Requests, "{not an array")
        .unwrap();

    assert!(report.discarded);
    assert_eq!(report.imported, 0);
    assert!(store.requests().list_requests().unwrap().is_empty());
}

#[test]
fn legacy_import_skips_malformed_elements() {
    let store = store();
    let raw = json!([
        { "id": "r1", "title": "Coverage", "date": "2024-05-01", "status": "pending" },
        { "id": "", "title": "No identity" },
        { "id": "r2", "status": "archived" },
        "not an object"
    ])
    .to_string();

    let report = store.import_legacy(Collection::Requests, &raw).unwrap();
    assert!(!report.discarded);
    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 3);
    assert_eq!(
        store.requests().get_request("r1").unwrap().unwrap().title,
        "Coverage"
    );
}

#[test]
fn typed_patches_only_carry_set_fields() {
    let patch = StafferPatch {
        last_name: Some("Reyes".to_string()),
        ..StafferPatch::default()
    };
    let map = to_patch(&patch).unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(map["lastName"], "Reyes");
}
