//! Document integration tests.
//!
//! Verifies:
//! - Rich updates survive an encode/decode cycle the way a caller persists them
//! - Mixed direct writes and operators in one call
//! - Failed calls leave the persisted form untouched
//! - `$inc` sums match a counted model for arbitrary deltas

use levelkv_doc::{DocumentError, MapDocument};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn updates(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("updates must be an object, got {other}"),
    }
}

/// Load, update and store, the way a command handler does.
fn update_stored(stored: &[u8], change: Value) -> Result<Vec<u8>, DocumentError> {
    let mut doc = if stored.is_empty() {
        MapDocument::new()
    } else {
        MapDocument::from_slice(stored)?
    };
    doc.rich_set(updates(change))?;
    doc.to_vec()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[test]
fn test_updates_across_persistence_cycles() {
    let mut stored = Vec::new();
    stored = update_stored(&stored, json!({"name": "latermoon", "$rpush": {"photos": ["a.jpg"]}})).unwrap();
    stored = update_stored(&stored, json!({"$rpush": {"photos": ["b.jpg", "c.jpg"]}, "$inc": {"version": 1}})).unwrap();
    stored = update_stored(&stored, json!({"$inc": {"version": 1}, "$set": {"setting.mute": true}})).unwrap();

    let doc = MapDocument::from_slice(&stored).unwrap();
    assert_eq!(
        Value::Object(doc.rich_get(&[])),
        json!({
            "name": "latermoon",
            "photos": ["a.jpg", "b.jpg", "c.jpg"],
            "version": 2,
            "setting": {"mute": true},
        })
    );
    assert_eq!(
        Value::Object(doc.rich_get(&["setting.mute", "version"])),
        json!({"setting": {"mute": true}, "version": 2})
    );
}

#[test]
fn test_failed_update_keeps_stored_form() {
    let stored = update_stored(&[], json!({"count": "not a number"})).unwrap();
    let err = update_stored(&stored, json!({"$inc": {"count": 1}, "other": 1})).unwrap_err();
    assert!(matches!(err, DocumentError::TypeMismatch { .. }));

    let doc = MapDocument::from_slice(&stored).unwrap();
    assert_eq!(doc.get("other"), None);
    assert_eq!(doc.get("count"), Some(&json!("not a number")));
}

#[test]
fn test_del_then_get() {
    let stored = update_stored(&[], json!({"profile": {"nickname": "m", "age": 3}})).unwrap();
    let stored = update_stored(&stored, json!({"$del": ["profile.nickname", "profile.nickname"]})).unwrap();
    let doc = MapDocument::from_slice(&stored).unwrap();
    assert_eq!(Value::Object(doc.rich_get(&["profile"])), json!({"profile": {"age": 3}}));
}

proptest! {
    #[test]
    fn prop_inc_matches_sum(deltas in prop::collection::vec(-1000i64..1000, 1..30)) {
        let mut doc = MapDocument::new();
        for delta in &deltas {
            doc.rich_set(updates(json!({"$inc": {"stats.total": delta}}))).unwrap();
        }
        let expected: i64 = deltas.iter().sum();
        prop_assert_eq!(doc.get("stats.total"), Some(&json!(expected)));
    }

    #[test]
    fn prop_rpush_preserves_order(chunks in prop::collection::vec(prop::collection::vec("[a-z]{1,3}", 0..4), 1..10)) {
        let mut doc = MapDocument::new();
        for chunk in &chunks {
            doc.rich_set(updates(json!({"$rpush": {"list": chunk}}))).unwrap();
        }
        let expected: Vec<Value> = chunks.iter().flatten().map(|s| json!(s)).collect();
        prop_assert_eq!(doc.get("list"), Some(&Value::Array(expected)));
    }
}
