use campusd::filters::FilterEngine;
use campusd::{
    FieldDescriptor, FilterConsumer, FilterError, MemoryPresetStore, Preset, PresetStore, Schema,
    SelectOption, StoreError,
};
use std::collections::BTreeMap;

fn scenario_schema() -> Schema {
    Schema::new(vec![
        FieldDescriptor::text("class_id", "Class"),
        FieldDescriptor::select(
            "status",
            "Status",
            vec![SelectOption::new("pending", "Pending")],
        ),
    ])
    .expect("schema")
}

fn exam_schema() -> Schema {
    Schema::new(vec![
        FieldDescriptor::text("class_id", "Class"),
        FieldDescriptor::text("subject_id", "Subject"),
        FieldDescriptor::date("exam_date", "Date"),
    ])
    .expect("schema")
}

fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Default)]
struct Recorder {
    events: Vec<String>,
    payload: Option<BTreeMap<String, String>>,
}

impl FilterConsumer for Recorder {
    fn apply(&mut self, payload: BTreeMap<String, String>) {
        self.events.push("apply".into());
        self.payload = Some(payload);
    }

    fn close(&mut self) {
        self.events.push("close".into());
    }
}

/// Counts writes and can be switched to reject them.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryPresetStore,
    reject: bool,
    writes: usize,
}

impl PresetStore for FlakyStore {
    fn load(&self, namespace: &str) -> Result<Vec<Preset>, StoreError> {
        self.inner.load(namespace)
    }

    fn save(&mut self, namespace: &str, presets: &[Preset]) -> Result<(), StoreError> {
        if self.reject {
            return Err(StoreError::Rejected("storage full".into()));
        }
        self.writes += 1;
        self.inner.save(namespace, presets)
    }
}

#[test]
fn class_and_status_scenario() {
    let mut e = FilterEngine::create(scenario_schema(), "classFilterPresets", MemoryPresetStore::new())
        .expect("engine");
    e.set_value("class_id", "7").expect("set class");
    assert_eq!(e.compute_active_payload(), map(&[("class_id", "7")]));
    e.set_value("status", "").expect("set status");
    assert_eq!(e.compute_active_payload(), map(&[("class_id", "7")]));
}

#[test]
fn set_value_touches_exactly_one_field() {
    let mut e =
        FilterEngine::create(exam_schema(), "examFilterPresets", MemoryPresetStore::new()).expect("engine");
    e.set_value("class_id", "3").expect("set");
    e.set_value("exam_date", "2025-09-01").expect("set");
    let before = e.state().clone();

    e.set_value("subject_id", "math").expect("set");
    for (k, v) in e.state() {
        if k == "subject_id" {
            assert_eq!(v, "math");
        } else {
            assert_eq!(Some(v), before.get(k));
        }
    }
}

#[test]
fn payload_is_exactly_the_non_empty_keys_and_idempotent() {
    let mut e =
        FilterEngine::create(exam_schema(), "examFilterPresets", MemoryPresetStore::new()).expect("engine");
    e.set_value("class_id", "3").expect("set");
    e.set_value("subject_id", "").expect("set");
    let first = e.compute_active_payload();
    let second = e.compute_active_payload();
    assert_eq!(first, second);
    assert_eq!(
        first.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["class_id"]
    );
}

#[test]
fn clear_always_empties_the_payload() {
    let mut e =
        FilterEngine::create(exam_schema(), "examFilterPresets", MemoryPresetStore::new()).expect("engine");
    e.clear();
    assert!(e.compute_active_payload().is_empty());
    e.set_value("class_id", "3").expect("set");
    e.set_value("exam_date", "2025-09-02").expect("set");
    e.clear();
    e.clear();
    assert!(e.compute_active_payload().is_empty());
    assert_eq!(e.state().len(), 3);
}

#[test]
fn apply_and_close_reports_then_closes_without_mutating() {
    let mut e =
        FilterEngine::create(exam_schema(), "examFilterPresets", MemoryPresetStore::new()).expect("engine");
    e.set_value("subject_id", "bio").expect("set");
    let before = e.state().clone();

    let mut rec = Recorder::default();
    e.apply_and_close(&mut rec);
    assert_eq!(rec.events, vec!["apply", "close"]);
    assert_eq!(rec.payload, Some(map(&[("subject_id", "bio")])));
    assert_eq!(e.state(), &before);
}

#[test]
fn preset_roundtrip_restores_exact_state() {
    let mut e =
        FilterEngine::create(exam_schema(), "examFilterPresets", MemoryPresetStore::new()).expect("engine");
    e.set_value("class_id", "12").expect("set");
    e.set_value("exam_date", "2025-10-01").expect("set");
    let saved_state = e.state().clone();
    e.save_preset("p").expect("save");

    e.set_value("class_id", "99").expect("set");
    e.set_value("subject_id", "chem").expect("set");

    let p = e
        .list_presets()
        .expect("list")
        .iter()
        .find(|p| p.name == "p")
        .cloned()
        .expect("preset p");
    e.apply_preset(&p);
    assert_eq!(e.state(), &saved_state);
    // Empty fields are part of the snapshot.
    assert_eq!(p.filters.get("subject_id").map(String::as_str), Some(""));
}

#[test]
fn applied_preset_is_a_copy() {
    let mut e =
        FilterEngine::create(exam_schema(), "examFilterPresets", MemoryPresetStore::new()).expect("engine");
    e.set_value("class_id", "1").expect("set");
    e.save_preset("one").expect("save");
    let p = e.find_preset("one").expect("find").expect("present");
    e.apply_preset(&p);
    e.set_value("class_id", "2").expect("set");
    assert_eq!(
        e.find_preset("one")
            .expect("find")
            .expect("present")
            .filters
            .get("class_id")
            .map(String::as_str),
        Some("1")
    );
}

#[test]
fn resaving_a_name_replaces_in_place() {
    let mut e =
        FilterEngine::create(exam_schema(), "examFilterPresets", MemoryPresetStore::new()).expect("engine");
    e.save_preset("first").expect("save");
    e.set_value("class_id", "4").expect("set");
    e.save_preset("second").expect("save");
    e.set_value("class_id", "5").expect("set");
    let list = e.save_preset("first").expect("resave");

    assert_eq!(list.len(), 2);
    assert_eq!(list[0].name, "first");
    assert_eq!(list[0].filters.get("class_id").map(String::as_str), Some("5"));
    assert_eq!(list[1].name, "second");
}

#[test]
fn dropped_field_never_reappears_in_payload() {
    let mut e =
        FilterEngine::create(exam_schema(), "examFilterPresets", MemoryPresetStore::new()).expect("engine");
    e.set_value("subject_id", "math").expect("set");
    e.set_value("class_id", "8").expect("set");
    e.save_preset("with subject").expect("save");

    let narrowed = Schema::new(vec![
        FieldDescriptor::text("class_id", "Class"),
        FieldDescriptor::text("teacher_id", "Teacher"),
    ])
    .expect("schema");
    e.set_schema(narrowed);

    assert!(!e.state().contains_key("subject_id"));
    assert_eq!(e.value("teacher_id"), Some(""));
    assert_eq!(e.value("class_id"), Some("8"));
    assert!(matches!(
        e.set_value("subject_id", "math"),
        Err(FilterError::UnknownField(_))
    ));

    // A preset saved under the old schema is intersected on apply.
    let stale = e.find_preset("with subject").expect("find").expect("present");
    e.apply_preset(&stale);
    assert_eq!(e.compute_active_payload(), map(&[("class_id", "8")]));
}

#[test]
fn schema_errors_at_construction() {
    let dup = Schema::new(vec![
        FieldDescriptor::text("status", "A"),
        FieldDescriptor::text("status", "B"),
    ]);
    assert!(matches!(dup, Err(FilterError::Schema(_))));

    let res = FilterEngine::create(exam_schema(), "", MemoryPresetStore::new());
    assert!(matches!(res, Err(FilterError::Schema(_))));
}

#[test]
fn failed_store_write_changes_nothing() {
    let mut e = FilterEngine::create(exam_schema(), "examFilterPresets", FlakyStore::default())
        .expect("engine");
    e.set_value("class_id", "1").expect("set");
    e.save_preset("kept").expect("save");

    let mut rejecting = FlakyStore::default();
    rejecting
        .inner
        .save("examFilterPresets", e.list_presets().expect("list"))
        .expect("seed");
    rejecting.reject = true;
    let mut e = FilterEngine::create(exam_schema(), "examFilterPresets", rejecting).expect("engine");
    e.set_value("class_id", "2").expect("set");
    let state_before = e.state().clone();

    assert!(matches!(
        e.save_preset("new"),
        Err(FilterError::Store(StoreError::Rejected(_)))
    ));
    assert!(matches!(
        e.delete_preset("kept"),
        Err(FilterError::Store(StoreError::Rejected(_)))
    ));
    let names: Vec<&str> = e
        .list_presets()
        .expect("list")
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(names, vec!["kept"]);
    assert_eq!(e.state(), &state_before);
}

#[test]
fn empty_preset_name_is_a_validation_error() {
    let mut e = FilterEngine::create(exam_schema(), "examFilterPresets", FlakyStore::default())
        .expect("engine");
    assert!(matches!(e.save_preset(""), Err(FilterError::Validation(_))));
    assert!(e.list_presets().expect("list").is_empty());
}

#[test]
fn only_preset_operations_write_to_the_store() {
    let mut e = FilterEngine::create(exam_schema(), "examFilterPresets", FlakyStore::default())
        .expect("engine");
    e.set_value("class_id", "1").expect("set");
    e.clear();
    let _ = e.compute_active_payload();
    e.set_schema(exam_schema());
    e.save_preset("a").expect("save");
    e.save_preset("a").expect("resave");
    e.delete_preset("a").expect("delete");
    assert!(!e.delete_preset("a").expect("delete missing"));
    assert_eq!(e.store().writes, 3);
}
