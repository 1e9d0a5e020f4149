//! Schema-driven filter state with named presets.
//!
//! A [`FilterEngine`] is owned by exactly one filter session (one drawer). It
//! never branches on field kind: every value is an opaque string and the
//! empty string means "unset".

use std::collections::BTreeMap;

use crate::error::FilterError;
use crate::presets::{Preset, PresetStore};
use crate::schema::Schema;

/// Current value for every field of the schema.
pub type FilterState = BTreeMap<String, String>;

/// The non-empty subset of a [`FilterState`], handed to the query layer.
pub type ActiveFilterPayload = BTreeMap<String, String>;

pub const DEFAULT_MAX_PRESET_NAME_LEN: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetPolicy {
    pub max_name_len: usize,
    pub trim_names: bool,
}

impl Default for PresetPolicy {
    fn default() -> Self {
        Self {
            max_name_len: DEFAULT_MAX_PRESET_NAME_LEN,
            trim_names: true,
        }
    }
}

/// Receives the outcome of [`FilterEngine::apply_and_close`].
pub trait FilterConsumer {
    fn apply(&mut self, payload: ActiveFilterPayload);
    fn close(&mut self);
}

pub struct FilterEngine<S: PresetStore> {
    schema: Schema,
    namespace: String,
    store: S,
    state: FilterState,
    presets: Option<Vec<Preset>>,
    policy: PresetPolicy,
}

fn empty_state(schema: &Schema) -> FilterState {
    schema.names().map(|n| (n.to_string(), String::new())).collect()
}

/// Keeps values for fields present in `schema`; every other schema field is empty.
fn intersect(schema: &Schema, values: &FilterState) -> FilterState {
    schema
        .names()
        .map(|n| (n.to_string(), values.get(n).cloned().unwrap_or_default()))
        .collect()
}

impl<S: PresetStore> FilterEngine<S> {
    pub fn create(schema: Schema, namespace: &str, store: S) -> Result<Self, FilterError> {
        if namespace.trim().is_empty() {
            return Err(FilterError::schema("namespace must not be empty"));
        }
        let state = empty_state(&schema);
        Ok(Self {
            schema,
            namespace: namespace.to_string(),
            store,
            state,
            presets: None,
            policy: PresetPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: PresetPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_policy(&mut self, policy: PresetPolicy) {
        self.policy = policy;
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.state.get(name).map(String::as_str)
    }

    pub fn set_schema(&mut self, schema: Schema) {
        self.state = intersect(&schema, &self.state);
        self.schema = schema;
        self.presets = None;
    }

    pub fn set_value(&mut self, name: &str, value: impl Into<String>) -> Result<(), FilterError> {
        match self.state.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(FilterError::UnknownField(name.to_string())),
        }
    }

    pub fn clear(&mut self) {
        for v in self.state.values_mut() {
            v.clear();
        }
    }

    pub fn compute_active_payload(&self) -> ActiveFilterPayload {
        self.state
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn apply_and_close(&self, consumer: &mut impl FilterConsumer) {
        consumer.apply(self.compute_active_payload());
        consumer.close();
    }

    pub fn list_presets(&mut self) -> Result<&[Preset], FilterError> {
        if self.presets.is_none() {
            let loaded = self.store.load(&self.namespace)?;
            self.presets = Some(loaded);
        }
        Ok(self.presets.as_deref().unwrap_or_default())
    }

    /// Drops the cached list so the next read goes to the store.
    pub fn invalidate_presets(&mut self) {
        self.presets = None;
    }

    pub fn find_preset(&mut self, name: &str) -> Result<Option<Preset>, FilterError> {
        Ok(self
            .list_presets()?
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    /// Snapshots the full state under `name`, replacing a preset of the same name.
    pub fn save_preset(&mut self, name: &str) -> Result<&[Preset], FilterError> {
        let name = self.validate_preset_name(name)?;

        let mut next = self.list_presets()?.to_vec();
        let snapshot = Preset {
            name,
            filters: self.state.clone(),
        };
        match next.iter_mut().find(|p| p.name == snapshot.name) {
            Some(existing) => *existing = snapshot,
            None => next.push(snapshot),
        }

        // Memory follows the store only after a successful write.
        self.store.save(&self.namespace, &next)?;
        tracing::debug!(namespace = %self.namespace, count = next.len(), "saved filter preset");
        self.presets = Some(next);
        Ok(self.presets.as_deref().unwrap_or_default())
    }

    /// Removes the preset named `name`; `Ok(false)` if there was none.
    pub fn delete_preset(&mut self, name: &str) -> Result<bool, FilterError> {
        let current = self.list_presets()?;
        if !current.iter().any(|p| p.name == name) {
            return Ok(false);
        }
        let next: Vec<Preset> = current.iter().filter(|p| p.name != name).cloned().collect();
        self.store.save(&self.namespace, &next)?;
        tracing::debug!(namespace = %self.namespace, preset = name, "deleted filter preset");
        self.presets = Some(next);
        Ok(true)
    }

    pub fn apply_preset(&mut self, preset: &Preset) {
        self.state = intersect(&self.schema, &preset.filters);
    }

    fn validate_preset_name(&self, raw: &str) -> Result<String, FilterError> {
        let name = if self.policy.trim_names { raw.trim() } else { raw };
        if name.trim().is_empty() {
            return Err(FilterError::validation("preset name must not be empty"));
        }
        if name.chars().count() > self.policy.max_name_len {
            return Err(FilterError::validation(format!(
                "preset name length must be <= {}",
                self.policy.max_name_len
            )));
        }
        Ok(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::presets::MemoryPresetStore;
    use crate::schema::{FieldDescriptor, SelectOption};

    fn exam_schema() -> Schema {
        Schema::new(vec![
            FieldDescriptor::text("class_id", "Class"),
            FieldDescriptor::text("subject_id", "Subject"),
            FieldDescriptor::select(
                "status",
                "Status",
                vec![SelectOption::new("pending", "Pending")],
            ),
        ])
        .expect("schema")
    }

    fn engine() -> FilterEngine<MemoryPresetStore> {
        FilterEngine::create(exam_schema(), "examFilterPresets", MemoryPresetStore::new())
            .expect("engine")
    }

    struct RejectingStore;

    impl PresetStore for RejectingStore {
        fn load(&self, _namespace: &str) -> Result<Vec<Preset>, StoreError> {
            Ok(Vec::new())
        }

        fn save(&mut self, _namespace: &str, _presets: &[Preset]) -> Result<(), StoreError> {
            Err(StoreError::Rejected("quota exceeded".into()))
        }
    }

    #[test]
    fn starts_all_empty() {
        let e = engine();
        assert_eq!(e.state().len(), 3);
        assert!(e.state().values().all(|v| v.is_empty()));
        assert!(e.compute_active_payload().is_empty());
    }

    #[test]
    fn empty_namespace_is_rejected() {
        let res = FilterEngine::create(exam_schema(), " ", MemoryPresetStore::new());
        assert!(matches!(res, Err(FilterError::Schema(_))));
    }

    #[test]
    fn set_value_on_unknown_field_fails_without_side_effects() {
        let mut e = engine();
        e.set_value("class_id", "7").expect("set");
        let before = e.state().clone();
        let res = e.set_value("teacher_id", "3");
        assert!(matches!(res, Err(FilterError::UnknownField(ref n)) if n == "teacher_id"));
        assert_eq!(e.state(), &before);
    }

    #[test]
    fn preset_name_is_trimmed_and_bounded() {
        let mut e = engine().with_policy(PresetPolicy {
            max_name_len: 5,
            trim_names: true,
        });
        assert!(matches!(e.save_preset("   "), Err(FilterError::Validation(_))));
        assert!(matches!(e.save_preset("toolong"), Err(FilterError::Validation(_))));
        let list = e.save_preset("  term ").expect("save");
        assert_eq!(list[0].name, "term");
    }

    #[test]
    fn rejected_write_keeps_memory_consistent() {
        let mut e =
            FilterEngine::create(exam_schema(), "examFilterPresets", RejectingStore).expect("engine");
        e.set_value("status", "pending").expect("set");
        let res = e.save_preset("pending only");
        assert!(matches!(res, Err(FilterError::Store(StoreError::Rejected(_)))));
        assert!(e.list_presets().expect("list").is_empty());
        assert_eq!(e.value("status"), Some("pending"));
    }

    #[test]
    fn set_schema_invalidates_cached_presets() {
        let mut store = MemoryPresetStore::new();
        store
            .save(
                "examFilterPresets",
                &[Preset {
                    name: "old".into(),
                    filters: FilterState::new(),
                }],
            )
            .expect("seed");
        let mut e = FilterEngine::create(exam_schema(), "examFilterPresets", store).expect("engine");
        assert_eq!(e.list_presets().expect("list").len(), 1);
        e.set_schema(exam_schema());
        assert!(e.presets.is_none());
        assert_eq!(e.list_presets().expect("reload").len(), 1);
    }

    #[test]
    fn delete_preset_writes_back() {
        let mut e = engine();
        e.save_preset("a").expect("save a");
        e.save_preset("b").expect("save b");
        assert!(e.delete_preset("a").expect("delete"));
        assert!(!e.delete_preset("a").expect("delete again"));
        let names: Vec<String> = e
            .list_presets()
            .expect("list")
            .iter()
            .map(|p| p.name.clone())
            .collect();
        assert_eq!(names, vec!["b".to_string()]);
        assert_eq!(e.store.load("examFilterPresets").expect("load").len(), 1);
    }
}
