use super::common::*;
use std::io::Cursor;

use crate::assignment::domain::{CategorySettings, Priority};
use crate::assignment::settings::{PersistedSettings, WorkSettings};

#[test]
fn unknown_categories_read_as_inert() {
    let settings = WorkSettings::new();
    let entry = settings.get(&category("cooking"));

    assert_eq!(entry, CategorySettings::default());
    assert!(!entry.is_active());
}

#[test]
fn set_overwrites_in_place_and_keeps_insertion_order() {
    let mut settings = settings(&[("mining", 1, 2), ("cooking", 3, 1)]);
    settings.set("mining", 4, Priority(1));

    let order: Vec<_> = settings.iter().map(|(key, _)| key.clone()).collect();
    assert_eq!(order, vec![category("mining"), category("cooking")]);
    assert_eq!(
        settings.get(&category("mining")),
        CategorySettings::new(4, Priority(1))
    );
    assert_eq!(settings.len(), 2);
}

#[test]
fn only_fully_configured_categories_are_active() {
    let settings = settings(&[("mining", 1, 0), ("cooking", 0, 2), ("hauling", 2, 2)]);
    assert_eq!(settings.active_categories(), vec![category("hauling")]);
}

#[test]
fn remove_drops_the_entry() {
    let mut settings = settings(&[("mining", 1, 2)]);
    assert_eq!(
        settings.remove(&category("mining")),
        Some(CategorySettings::new(1, Priority(2)))
    );
    assert!(settings.is_empty());
    assert_eq!(settings.remove(&category("mining")), None);
}

#[test]
fn persisted_layout_has_two_mappings() {
    let mut buffer = Vec::new();
    settings(&[("mining", 2, 3)])
        .save(&mut buffer)
        .expect("save settings");

    let value: serde_json::Value = serde_json::from_slice(&buffer).expect("valid json");
    assert_eq!(value["desired_counts"]["mining"], 2);
    assert_eq!(value["priorities"]["mining"], 3);
}

#[test]
fn reload_restores_every_entry() {
    let original = settings(&[("mining", 2, 3), ("cooking", 1, 1), ("hauling", 0, 0)]);
    let mut buffer = Vec::new();
    original.save(&mut buffer).expect("save settings");

    let reloaded = WorkSettings::load(Cursor::new(buffer));

    assert_eq!(reloaded.len(), 3);
    for (key, entry) in original.iter() {
        assert_eq!(reloaded.get(key), entry);
    }
}

#[test]
fn missing_mapping_resets_to_empty() {
    let reloaded = WorkSettings::load(Cursor::new(r#"{"desired_counts":{"mining":2}}"#));
    assert!(reloaded.is_empty());

    let reloaded = WorkSettings::from_persisted(PersistedSettings {
        desired_counts: None,
        priorities: Some([(category("mining"), Priority(1))].into_iter().collect()),
    });
    assert!(reloaded.is_empty());
}

#[test]
fn malformed_input_resets_to_empty() {
    for raw in ["not json", r#"{"desired_counts":{"mining":-1},"priorities":{}}"#, ""] {
        assert!(WorkSettings::load(Cursor::new(raw)).is_empty(), "input {raw:?}");
    }
}

#[test]
fn category_in_one_mapping_keeps_zero_for_the_other() {
    let reloaded = WorkSettings::load(Cursor::new(
        r#"{"desired_counts":{"mining":2},"priorities":{"cooking":4}}"#,
    ));

    assert_eq!(
        reloaded.get(&category("mining")),
        CategorySettings::new(2, Priority::UNASSIGNED)
    );
    assert_eq!(reloaded.get(&category("cooking")), CategorySettings::new(0, Priority(4)));
    assert!(reloaded.active_categories().is_empty());
}

#[test]
fn missing_file_loads_as_empty() {
    let path = std::env::temp_dir().join(format!(
        "auto-priority-missing-{}.json",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);

    let settings = WorkSettings::load_from_path(&path).expect("missing file is not an error");
    assert!(settings.is_empty());
}

#[test]
fn files_round_trip_through_disk() {
    let path = std::env::temp_dir().join(format!(
        "auto-priority-settings-{}.json",
        std::process::id()
    ));
    let original = settings(&[("mining", 2, 3)]);

    original.save_to_path(&path).expect("write settings");
    let reloaded = WorkSettings::load_from_path(&path).expect("read settings");
    let _ = std::fs::remove_file(&path);

    assert_eq!(reloaded, original);
}
