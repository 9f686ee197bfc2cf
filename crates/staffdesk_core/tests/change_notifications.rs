use staffdesk_core::{
    ChangeEvent, ChangeNotification, ChangeOrigin, NewStaffer, Store, StoreConfig,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

fn record(store: &Store) -> Arc<Mutex<Vec<ChangeNotification>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store.change_bus().subscribe(move |notification| {
        sink.lock().unwrap().push(*notification);
    });
    seen
}

fn file_store(path: &Path) -> Store {
    Store::open(StoreConfig {
        seed_defaults: false,
        ..StoreConfig::with_database_path(path)
    })
    .unwrap()
}

fn new_staffer(email: &str) -> NewStaffer {
    NewStaffer {
        first_name: "Lea".to_string(),
        last_name: "Tan".to_string(),
        email: email.to_string(),
        password: "pw1".to_string(),
        ..NewStaffer::default()
    }
}

#[test]
fn every_write_publishes_a_local_event() {
    let store = Store::open_in_memory().unwrap();
    let seen = record(&store);

    store.directory().create_staffer(new_staffer("lea@x.com")).unwrap();
    store.schedule().set_availability("2024-01-02", true, "").unwrap();
    store.schedule().set_availability("2024-01-03", true, "").unwrap();

    let events: Vec<ChangeEvent> = seen.lock().unwrap().iter().map(|n| n.event).collect();
    assert_eq!(
        events,
        vec![
            ChangeEvent::StafferUpdated,
            ChangeEvent::UsersUpdated,
            ChangeEvent::ClientAvailabilityUpdated,
            ChangeEvent::ClientAvailabilityUpdated,
        ]
    );
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .all(|notification| notification.origin == ChangeOrigin::Local));
}

#[test]
fn failed_writes_publish_nothing() {
    let store = Store::open_in_memory().unwrap();
    let seen = record(&store);

    assert!(store.schedule().set_availability("tomorrow", true, "").is_err());
    assert!(!store.requests().delete_request("missing").unwrap());

    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn writes_from_another_handle_surface_as_external_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let writer = file_store(&path);
    let reader = file_store(&path);
    let seen = record(&reader);

    writer.directory().create_staffer(new_staffer("lea@x.com")).unwrap();

    let changed = reader.poll_external_changes().unwrap();
    assert!(changed.contains(&ChangeEvent::StafferUpdated));
    assert!(changed.contains(&ChangeEvent::UsersUpdated));
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .all(|notification| notification.origin == ChangeOrigin::External));
    assert_eq!(reader.directory().list_staffers().unwrap().len(), 1);

    assert!(reader.poll_external_changes().unwrap().is_empty());
}

#[test]
fn own_writes_are_not_reported_as_external() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let store = file_store(&path);

    store.directory().create_staffer(new_staffer("lea@x.com")).unwrap();
    store.schedule().set_availability("2024-01-02", true, "").unwrap();

    assert!(store.poll_external_changes().unwrap().is_empty());
}

#[test]
fn handles_can_share_one_bus() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let first = file_store(&path);
    let config = StoreConfig {
        seed_defaults: false,
        ..StoreConfig::with_database_path(&path)
    };
    let second = Store::open_with_bus(config, Arc::clone(first.change_bus())).unwrap();
    let seen = record(&first);

    second.schedule().set_availability("2024-01-02", true, "").unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].event, ChangeEvent::ClientAvailabilityUpdated);
}
