use crate::db;
use crate::events::NormalizeOptions;
use crate::filters::{PresetPolicy, DEFAULT_MAX_PRESET_NAME_LEN};
use crate::ipc::helpers::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Filters,
    Calendar,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "filters" => Some(Self::Filters),
            "calendar" => Some(Self::Calendar),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Filters => "setup.filters",
            Self::Calendar => "setup.calendar",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Filters => json!({
            "maxPresetNameLength": DEFAULT_MAX_PRESET_NAME_LEN,
            "trimPresetNames": true
        }),
        SetupSection::Calendar => json!({
            "allowDateTimeDates": true
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Filters => match k.as_str() {
                "maxPresetNameLength" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 200)?));
                }
                "trimPresetNames" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown filters field: {}", k)),
            },
            SetupSection::Calendar => match k.as_str() {
                "allowDateTimeDates" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown calendar field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Key by key: one bad stored value keeps its default, the rest still apply.
            for (k, v) in saved_obj {
                let mut one = Map::new();
                one.insert(k.clone(), v.clone());
                if let Err(msg) = merge_section_patch(section, &mut current, &one) {
                    tracing::warn!(key = section.key(), error = %msg, "ignoring stored setting");
                }
            }
        }
    }
    Ok(current)
}

fn load_section_or_default(state: &AppState, section: SetupSection) -> Value {
    match state.db.as_deref() {
        Some(conn) => load_section(conn, section).unwrap_or_else(|e| {
            tracing::warn!(key = section.key(), error = %e, "falling back to default settings");
            default_section(section)
        }),
        None => default_section(section),
    }
}

pub(crate) fn preset_policy(state: &AppState) -> PresetPolicy {
    let v = load_section_or_default(state, SetupSection::Filters);
    let defaults = PresetPolicy::default();
    PresetPolicy {
        max_name_len: v
            .get("maxPresetNameLength")
            .and_then(|n| n.as_u64())
            .map(|n| n as usize)
            .unwrap_or(defaults.max_name_len),
        trim_names: v
            .get("trimPresetNames")
            .and_then(|b| b.as_bool())
            .unwrap_or(defaults.trim_names),
    }
}

pub(crate) fn normalize_options(state: &AppState) -> NormalizeOptions {
    let v = load_section_or_default(state, SetupSection::Calendar);
    NormalizeOptions {
        accept_datetime_dates: v
            .get("allowDateTimeDates")
            .and_then(|b| b.as_bool())
            .unwrap_or(NormalizeOptions::default().accept_datetime_dates),
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let filters = match load_section(conn, SetupSection::Filters) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let calendar = match load_section(conn, SetupSection::Calendar) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "filters": filters,
            "calendar": calendar
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    if let SetupSection::Filters = section {
        let policy = preset_policy(state);
        for session in state.sessions.values_mut() {
            session.engine.set_policy(policy);
        }
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
