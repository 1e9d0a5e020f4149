use crate::bundle::{self, MergePolicy, PresetsByNamespace};
use crate::ipc::helpers::{required_str, respond, session_mut, state_view, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::presets::{Preset, PresetStore, SqlitePresetStore};
use serde_json::{json, Value};
use std::path::PathBuf;

fn workspace_store(state: &AppState) -> Result<SqlitePresetStore, HandlerErr> {
    state
        .db
        .as_ref()
        .map(|conn| SqlitePresetStore::new(conn.clone()))
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn list(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let session = session_mut(state, params)?;
    let presets = session.engine.list_presets()?;
    Ok(json!({ "presets": presets }))
}

fn save(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let name = required_str(params, "name")?;
    let session = session_mut(state, params)?;
    let namespace = session.engine.namespace().to_string();
    match session.engine.save_preset(name) {
        Ok(presets) => {
            tracing::info!(namespace = %namespace, preset = name, "preset saved");
            Ok(json!({ "presets": presets }))
        }
        Err(e) => {
            tracing::warn!(namespace = %namespace, preset = name, error = %e, "preset save rejected");
            Err(e.into())
        }
    }
}

fn apply(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let inline: Option<Preset> = match params.get("preset") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(
            serde_json::from_value(raw.clone())
                .map_err(|e| HandlerErr::bad_params(format!("invalid preset: {}", e)))?,
        ),
    };
    let session = session_mut(state, params)?;
    let preset = match inline {
        Some(p) => p,
        None => {
            let name = required_str(params, "name")?;
            session.engine.find_preset(name)?.ok_or_else(|| {
                HandlerErr::new("not_found", "preset not found")
                    .with_details(json!({ "name": name }))
            })?
        }
    };
    session.engine.apply_preset(&preset);
    let mut view = state_view(&session.engine);
    view["applied"] = json!(preset.name);
    Ok(view)
}

fn delete(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let name = required_str(params, "name")?;
    let session = session_mut(state, params)?;
    let removed = session.engine.delete_preset(name)?;
    if removed {
        tracing::info!(namespace = %session.engine.namespace(), preset = name, "preset deleted");
    }
    let presets = session.engine.list_presets()?;
    Ok(json!({ "removed": removed, "presets": presets }))
}

fn export_bundle(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let out_path = match params.get("outPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return Err(HandlerErr::bad_params("missing outPath")),
    };
    let store = workspace_store(state)?;

    let namespaces: Vec<String> = match params.get("namespaces").and_then(|v| v.as_array()) {
        Some(arr) => arr
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        None => store
            .namespaces()
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?,
    };

    let mut presets = PresetsByNamespace::new();
    for ns in namespaces {
        let list = store
            .load(&ns)
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
        presets.insert(ns, list);
    }

    let summary = bundle::export_presets_bundle(&presets, &PathBuf::from(&out_path)).map_err(
        |e| HandlerErr::new("io_failed", e.to_string()).with_details(json!({ "path": out_path })),
    )?;
    tracing::info!(path = %out_path, presets = summary.preset_count, "preset bundle exported");
    Ok(json!({
        "ok": true,
        "path": out_path,
        "bundleFormat": summary.bundle_format,
        "namespaceCount": summary.namespace_count,
        "presetCount": summary.preset_count
    }))
}

fn import_bundle(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let in_path = match params.get("inPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return Err(HandlerErr::bad_params("missing inPath")),
    };
    let policy = match params.get("policy").and_then(|v| v.as_str()) {
        None => MergePolicy::Upsert,
        Some(raw) => MergePolicy::parse(raw)
            .ok_or_else(|| HandlerErr::bad_params("policy must be one of: upsert, replace"))?,
    };
    let mut store = workspace_store(state)?;

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return Err(HandlerErr::new("not_found", "bundle file not found")
            .with_details(json!({ "path": in_path })));
    }
    let incoming = bundle::read_presets_bundle(&src).map_err(|e| {
        tracing::warn!(path = %in_path, error = %e, "preset bundle rejected");
        HandlerErr::new("io_failed", e.to_string()).with_details(json!({ "path": in_path }))
    })?;
    let summary = bundle::merge_presets(&mut store, &incoming, policy)
        .map_err(|e| HandlerErr::new("store_failed", e.to_string()))?;

    for session in state.sessions.values_mut() {
        if incoming.contains_key(session.engine.namespace()) {
            session.engine.invalidate_presets();
        }
    }
    tracing::info!(
        path = %in_path,
        inserted = summary.inserted,
        replaced = summary.replaced,
        "preset bundle imported"
    );
    Ok(json!({
        "ok": true,
        "namespaces": summary.namespaces,
        "inserted": summary.inserted,
        "replaced": summary.replaced
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "presets.list" => list(state, &req.params),
        "presets.save" => save(state, &req.params),
        "presets.apply" => apply(state, &req.params),
        "presets.delete" => delete(state, &req.params),
        "presets.exportBundle" => export_bundle(state, &req.params),
        "presets.importBundle" => import_bundle(state, &req.params),
        _ => return None,
    };
    Some(respond(req, res))
}
