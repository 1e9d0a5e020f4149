use crate::drawers::Drawer;
use crate::filters::{ActiveFilterPayload, FilterConsumer, FilterEngine};
use crate::ipc::handlers::setup::preset_policy;
use crate::ipc::helpers::{
    full_view, ok, parse_schema_param, required_str, respond, session_mut, state_view, HandlerErr,
};
use crate::ipc::types::{AppState, FilterSession, Request, SessionStore};
use crate::presets::{MemoryPresetStore, SqlitePresetStore};
use crate::schema::Schema;
use serde_json::{json, Value};
use uuid::Uuid;

/// Collects what `apply_and_close` hands over so it can be sent back to the UI.
#[derive(Default)]
struct ReplyConsumer {
    payload: Option<ActiveFilterPayload>,
    closed: bool,
}

impl FilterConsumer for ReplyConsumer {
    fn apply(&mut self, payload: ActiveFilterPayload) {
        self.payload = Some(payload);
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

fn handle_drawers_list(_state: &mut AppState, req: &Request) -> Value {
    let mut drawers = Vec::new();
    for d in Drawer::ALL {
        let field_count = d.default_schema().map(|s| s.len()).unwrap_or(0);
        drawers.push(json!({
            "id": d.id(),
            "namespace": d.namespace(),
            "fieldCount": field_count
        }));
    }
    ok(&req.id, json!({ "drawers": drawers }))
}

fn open_session(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let drawer = match params.get("drawer").and_then(|v| v.as_str()) {
        Some(raw) => Some(
            Drawer::parse(raw)
                .ok_or_else(|| HandlerErr::bad_params(format!("unknown drawer: {}", raw)))?,
        ),
        None => None,
    };
    let namespace = match (params.get("namespace").and_then(|v| v.as_str()), drawer) {
        (Some(ns), _) => ns.to_string(),
        (None, Some(d)) => d.namespace().to_string(),
        (None, None) => return Err(HandlerErr::bad_params("missing drawer or namespace")),
    };
    let schema = match (parse_schema_param(params)?, drawer) {
        (Some(s), _) => s,
        (None, Some(d)) => d.default_schema()?,
        (None, None) => Schema::default(),
    };

    let store = match state.db.as_ref() {
        Some(conn) => SessionStore::Workspace(SqlitePresetStore::new(conn.clone())),
        None => SessionStore::Ephemeral(MemoryPresetStore::new()),
    };
    let engine =
        FilterEngine::create(schema, &namespace, store)?.with_policy(preset_policy(state));

    let session_id = Uuid::new_v4().to_string();
    let mut view = full_view(&engine);
    view["sessionId"] = json!(session_id);
    view["persistent"] = json!(state.db.is_some());
    tracing::debug!(session = %session_id, namespace = %namespace, "filter session opened");
    state
        .sessions
        .insert(session_id, FilterSession { drawer, engine });
    Ok(view)
}

fn set_schema(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let schema =
        parse_schema_param(params)?.ok_or_else(|| HandlerErr::bad_params("missing schema"))?;
    let session = session_mut(state, params)?;
    session.engine.set_schema(schema);
    Ok(full_view(&session.engine))
}

fn set_value(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let name = required_str(params, "name")?;
    let value = match params.get("value") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(_) => return Err(HandlerErr::bad_params("value must be a string")),
    };
    let session = session_mut(state, params)?;
    session.engine.set_value(name, value)?;
    Ok(state_view(&session.engine))
}

fn clear(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let session = session_mut(state, params)?;
    session.engine.clear();
    Ok(state_view(&session.engine))
}

fn get(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let session = session_mut(state, params)?;
    let mut view = full_view(&session.engine);
    view["drawer"] = json!(session.drawer.map(|d| d.id()));
    Ok(view)
}

fn apply_and_close(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let session_id = required_str(params, "sessionId")?.to_string();
    let mut consumer = ReplyConsumer::default();
    session_mut(state, params)?
        .engine
        .apply_and_close(&mut consumer);
    if consumer.closed {
        state.sessions.remove(&session_id);
    }
    Ok(json!({
        "payload": consumer.payload.unwrap_or_default(),
        "closed": consumer.closed
    }))
}

fn close(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let session_id = required_str(params, "sessionId")?;
    let removed = state.sessions.remove(session_id).is_some();
    Ok(json!({ "ok": true, "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "drawers.list" => return Some(handle_drawers_list(state, req)),
        "filters.open" => open_session(state, &req.params),
        "filters.setSchema" => set_schema(state, &req.params),
        "filters.setValue" => set_value(state, &req.params),
        "filters.clear" => clear(state, &req.params),
        "filters.get" => get(state, &req.params),
        "filters.applyAndClose" => apply_and_close(state, &req.params),
        "filters.close" => close(state, &req.params),
        _ => return None,
    };
    Some(respond(req, res))
}
