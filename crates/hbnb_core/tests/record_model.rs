use hbnb_core::{builtin_kinds, City, Record, RecordKind, User};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

fn mapping(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn fresh_ids_are_pairwise_distinct() {
    let ids: HashSet<String> = (0..10_000)
        .map(|_| User::fresh().id().to_string())
        .collect();
    assert_eq!(ids.len(), 10_000);
}

#[test]
fn city_defaults_and_rehydrated_name() {
    let fresh = City::fresh();
    assert_eq!(fresh.name, "");

    let rehydrated = City::from_fields(mapping(json!({ "name": "Boston" }))).unwrap();
    assert_eq!(rehydrated.name, "Boston");
}

#[test]
fn fresh_record_has_equal_timestamps() {
    let user = User::fresh();
    assert_eq!(user.header.created_at(), user.header.updated_at());
}

#[test]
fn rehydrate_then_to_mapping_is_idempotent_for_every_kind() {
    for name in builtin_kinds().names() {
        let mut record = builtin_kinds().construct(name).unwrap();
        for field in builtin_kinds().fields(name).unwrap() {
            record
                .set_attribute(field, json!(format!("{field}-value")))
                .unwrap();
        }
        record.set_attribute("note", json!("kept")).unwrap();

        let first = record.to_mapping().unwrap();
        let rebuilt = builtin_kinds().rehydrate(first.clone()).unwrap();
        assert_eq!(rebuilt.to_mapping().unwrap(), first, "kind {name}");
        assert_eq!(rebuilt.key(), record.key());
    }
}

#[test]
fn touch_changes_only_updated_at_in_mapping() {
    let mut user = User::fresh();
    user.email = "user@example.com".to_string();
    let before = user.to_mapping().unwrap();

    std::thread::sleep(std::time::Duration::from_millis(2));
    user.touch();
    let after = user.to_mapping().unwrap();

    assert_ne!(before["updated_at"], after["updated_at"]);
    for key in ["id", "created_at", "email", "password", "__class__"] {
        assert_eq!(before[key], after[key], "field {key}");
    }
}

#[test]
fn timestamps_use_fixed_text_form() {
    let user = User::from_fields(mapping(json!({
        "id": "1234",
        "created_at": "2020-01-01T00:00:00",
        "updated_at": "2020-01-01 08:30:00.250000"
    })))
    .unwrap();
    let mapping = user.to_mapping().unwrap();
    assert_eq!(mapping["created_at"], "2020-01-01T00:00:00.000000");
    assert_eq!(mapping["updated_at"], "2020-01-01T08:30:00.250000");
}
