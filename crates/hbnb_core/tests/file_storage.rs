use hbnb_core::{
    City, FileStorage, Place, Record, RecordKind, ReloadOutcome, State, StoreError, User,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

fn temp_store() -> (tempfile::TempDir, PathBuf, FileStorage) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("file.json");
    let storage = FileStorage::new(&path);
    (dir, path, storage)
}

fn read_document(path: &PathBuf) -> serde_json::Map<String, Value> {
    let raw = std::fs::read(path).unwrap();
    match serde_json::from_slice::<Value>(&raw).unwrap() {
        Value::Object(map) => map,
        other => panic!("expected object document, got {other}"),
    }
}

fn snapshot(storage: &FileStorage) -> BTreeMap<String, serde_json::Map<String, Value>> {
    storage
        .all()
        .iter()
        .map(|(key, record)| (key.clone(), record.to_mapping().unwrap()))
        .collect()
}

#[test]
fn insert_then_all_returns_the_same_record() {
    let (_dir, _path, mut storage) = temp_store();

    let user = Box::new(User::fresh());
    let id = user.id().to_string();
    let address: *const User = &*user;
    storage.insert(user);

    let key = format!("User.{id}");
    let stored = storage.all().get(&key).expect("inserted key present");
    let stored_user = stored.as_any().downcast_ref::<User>().unwrap();
    assert!(std::ptr::eq(stored_user, address));
}

#[test]
fn create_registers_before_save() {
    let (_dir, path, mut storage) = temp_store();

    let id = storage.create("City").unwrap().id().to_string();

    assert!(storage.all().contains_key(&format!("City.{id}")));
    assert!(!path.exists());
    assert_eq!(storage.get_as::<City>(&id).unwrap().name, "");
}

#[test]
fn create_rejects_unknown_kind() {
    let (_dir, _path, mut storage) = temp_store();
    let err = storage.create("BaseModel").unwrap_err();
    assert!(matches!(err, StoreError::Record(_)));
    assert!(storage.is_empty());
}

#[test]
fn same_id_in_different_kinds_does_not_collide() {
    let (_dir, _path, mut storage) = temp_store();

    let user = User::from_fields(
        json!({ "id": "shared", "email": "a@b.com" })
            .as_object()
            .cloned()
            .unwrap(),
    )
    .unwrap();
    let state = State::from_fields(
        json!({ "id": "shared", "name": "Ohio" })
            .as_object()
            .cloned()
            .unwrap(),
    )
    .unwrap();
    storage.insert(Box::new(user));
    storage.insert(Box::new(state));
    assert_eq!(storage.len(), 2);

    let replacement = State::from_fields(
        json!({ "id": "shared", "name": "Iowa" })
            .as_object()
            .cloned()
            .unwrap(),
    )
    .unwrap();
    storage.insert(Box::new(replacement));
    assert_eq!(storage.len(), 2);
    assert_eq!(storage.get_as::<State>("shared").unwrap().name, "Iowa");
}

#[test]
fn save_writes_one_object_keyed_by_composite_key() {
    let (_dir, path, mut storage) = temp_store();

    let id = storage.create("User").unwrap().id().to_string();
    {
        let user = storage.get_as_mut::<User>(&id).unwrap();
        user.email = "user@example.com".to_string();
    }
    storage.save().unwrap();

    let document = read_document(&path);
    assert_eq!(document.len(), 1);
    let entry = &document[&format!("User.{id}")];
    assert_eq!(entry["__class__"], "User");
    assert_eq!(entry["email"], "user@example.com");
    assert_eq!(entry["password"], "");
    assert_eq!(entry["id"], id.as_str());
}

#[test]
fn save_replaces_prior_contents_in_full() {
    let (_dir, path, storage) = temp_store();
    std::fs::write(&path, r#"{"User.old": {"__class__": "User", "id": "old"}}"#).unwrap();

    storage.save().unwrap();

    assert!(read_document(&path).is_empty());
}

#[test]
fn save_into_missing_directory_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path().join("missing").join("file.json"));

    let err = storage.save().unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));
}

#[test]
fn save_object_restamps_then_persists() {
    let (_dir, path, mut storage) = temp_store();
    let id = storage.create("Place").unwrap().id().to_string();
    let created_at = storage.get_as::<Place>(&id).unwrap().header.created_at();

    std::thread::sleep(std::time::Duration::from_millis(2));
    assert!(storage.save_object("Place", &id).unwrap());

    let place = storage.get_as::<Place>(&id).unwrap();
    assert!(place.header.updated_at() > created_at);
    assert_eq!(place.header.created_at(), created_at);
    let document = read_document(&path);
    assert_eq!(
        document[&format!("Place.{id}")],
        Value::Object(place.to_mapping().unwrap())
    );

    assert!(!storage.save_object("Place", "nope").unwrap());
}

#[test]
fn save_then_reload_into_empty_store_restores_registry() {
    let (_dir, path, mut storage) = temp_store();
    let user_id = storage.create("User").unwrap().id().to_string();
    storage
        .get_mut("User", &user_id)
        .unwrap()
        .set_attribute("email", json!("a@b.com"))
        .unwrap();
    let city_id = storage.create("City").unwrap().id().to_string();
    storage
        .get_mut("City", &city_id)
        .unwrap()
        .set_attribute("name", json!("Boston"))
        .unwrap();
    storage
        .get_mut("City", &city_id)
        .unwrap()
        .set_attribute("population", json!("650000"))
        .unwrap();
    storage.save().unwrap();
    let before = snapshot(&storage);

    let mut fresh = FileStorage::new(&path);
    let outcome = fresh.reload().unwrap();

    assert_eq!(
        outcome,
        ReloadOutcome::Loaded {
            loaded: 2,
            skipped: 0
        }
    );
    assert_eq!(snapshot(&fresh), before);
    assert_eq!(fresh.get_as::<City>(&city_id).unwrap().name, "Boston");
}

#[test]
fn reload_missing_file_is_a_noop() {
    let (_dir, _path, mut storage) = temp_store();
    let id = storage.create("State").unwrap().id().to_string();
    let before = snapshot(&storage);

    assert_eq!(storage.reload().unwrap(), ReloadOutcome::MissingFile);
    assert_eq!(snapshot(&storage), before);
    assert!(storage.get("State", &id).is_some());
}

#[test]
fn reload_malformed_file_leaves_registry_unchanged() {
    let (_dir, path, mut storage) = temp_store();
    storage.create("State").unwrap();
    let before = snapshot(&storage);

    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        storage.reload().unwrap(),
        ReloadOutcome::Malformed { .. }
    ));
    assert_eq!(snapshot(&storage), before);

    std::fs::write(&path, "[1, 2, 3]").unwrap();
    assert!(matches!(
        storage.reload().unwrap(),
        ReloadOutcome::Malformed { .. }
    ));
    assert_eq!(snapshot(&storage), before);
}

#[test]
fn reload_reconstructs_user_from_persisted_mapping() {
    let (_dir, path, mut storage) = temp_store();
    std::fs::write(
        &path,
        r#"{"User.1234": {"__class__": "User", "id": "1234", "email": "a@b.com", "password": "x", "created_at": "2020-01-01T00:00:00", "updated_at": "2020-01-01T00:00:00"}}"#,
    )
    .unwrap();

    storage.reload().unwrap();

    assert_eq!(storage.len(), 1);
    let user = storage.get_as::<User>("1234").expect("User.1234 loaded");
    assert_eq!(user.email, "a@b.com");
    assert_eq!(user.password, "x");
    assert!(user.extra.is_empty());
}

#[test]
fn reload_merges_and_keeps_memory_only_entries() {
    let (_dir, path, mut storage) = temp_store();
    std::fs::write(
        &path,
        r#"{"City.c1": {"__class__": "City", "id": "c1", "name": "Boston"}}"#,
    )
    .unwrap();
    let unsaved = storage.create("City").unwrap().id().to_string();

    storage.reload().unwrap();
    storage.reload().unwrap();

    assert_eq!(storage.len(), 2);
    assert!(storage.get("City", &unsaved).is_some());
    assert_eq!(storage.get_as::<City>("c1").unwrap().name, "Boston");
}

#[test]
fn reload_discards_unsaved_changes_to_persisted_entries() {
    let (_dir, path, mut storage) = temp_store();
    std::fs::write(
        &path,
        r#"{"City.c1": {"__class__": "City", "id": "c1", "name": "Boston"}}"#,
    )
    .unwrap();
    storage.reload().unwrap();
    storage.get_as_mut::<City>("c1").unwrap().name = "Salem".to_string();

    storage.reload().unwrap();

    assert_eq!(storage.get_as::<City>("c1").unwrap().name, "Boston");
}

#[test]
fn reload_skips_entries_it_cannot_rehydrate() {
    let (_dir, path, mut storage) = temp_store();
    std::fs::write(
        &path,
        r#"{
            "City.c1": {"__class__": "City", "id": "c1", "name": "Boston"},
            "Ghost.g1": {"__class__": "Ghost", "id": "g1"},
            "City.c2": {"id": "c2"},
            "City.c3": "not an object",
            "City.c4": {"__class__": "City", "id": "c4", "created_at": "soon"}
        }"#,
    )
    .unwrap();

    let outcome = storage.reload().unwrap();

    assert_eq!(
        outcome,
        ReloadOutcome::Loaded {
            loaded: 1,
            skipped: 4
        }
    );
    assert_eq!(storage.all().keys().collect::<Vec<_>>(), vec!["City.c1"]);
}

#[test]
fn reload_takes_missing_id_from_the_persisted_key() {
    let (_dir, path, mut storage) = temp_store();
    std::fs::write(&path, r#"{"User.k": {"__class__": "User"}}"#).unwrap();

    let outcome = storage.reload().unwrap();

    assert_eq!(
        outcome,
        ReloadOutcome::Loaded {
            loaded: 1,
            skipped: 0
        }
    );
    let user = storage.get("User", "k").expect("User.k loaded");
    assert_eq!(user.id(), "k");
    assert_eq!(user.key(), "User.k");
}

#[test]
fn reload_skips_entries_whose_key_disagrees_with_the_record() {
    let (_dir, path, mut storage) = temp_store();
    std::fs::write(
        &path,
        r#"{
            "City.1": {"__class__": "User", "id": "1"},
            "State.2": {"__class__": "State", "id": "3", "name": "Ohio"},
            "State.4": {"__class__": "State", "id": "4", "name": "Iowa"}
        }"#,
    )
    .unwrap();

    let outcome = storage.reload().unwrap();

    assert_eq!(
        outcome,
        ReloadOutcome::Loaded {
            loaded: 1,
            skipped: 2
        }
    );
    assert!(storage.get_as::<City>("1").is_none());
    assert!(storage.get_as::<User>("1").is_none());
    assert_eq!(storage.all().keys().collect::<Vec<_>>(), vec!["State.4"]);
    for (key, record) in storage.all() {
        assert_eq!(key, &record.key());
    }
}

#[test]
fn delete_removes_exactly_one_key_and_persists() {
    let (_dir, path, mut storage) = temp_store();
    let keep = storage.create("User").unwrap().id().to_string();
    let removed = storage.create("User").unwrap().id().to_string();
    storage.save().unwrap();

    assert!(storage.delete("User", &removed).unwrap());

    assert_eq!(
        storage.all().keys().cloned().collect::<Vec<_>>(),
        vec![format!("User.{keep}")]
    );
    let document = read_document(&path);
    assert!(document.contains_key(&format!("User.{keep}")));
    assert!(!document.contains_key(&format!("User.{removed}")));
}

#[test]
fn delete_missing_record_changes_nothing() {
    let (_dir, path, mut storage) = temp_store();
    storage.create("User").unwrap();
    storage.save().unwrap();
    let bytes_before = std::fs::read(&path).unwrap();
    let before = snapshot(&storage);

    assert!(!storage.delete("User", "absent").unwrap());

    assert_eq!(snapshot(&storage), before);
    assert_eq!(std::fs::read(&path).unwrap(), bytes_before);
}

#[test]
fn deleting_through_the_live_registry_needs_an_explicit_save() {
    let (_dir, path, mut storage) = temp_store();
    let id = storage.create("State").unwrap().id().to_string();
    storage.save().unwrap();

    storage.all_mut().remove(&format!("State.{id}"));
    assert!(read_document(&path).contains_key(&format!("State.{id}")));

    storage.save().unwrap();
    assert!(read_document(&path).is_empty());
}
