use serde_json::{json, Value};

use crate::controls::render_controls;
use crate::error::{FilterError, NormalizeError};
use crate::filters::FilterEngine;
use crate::ipc::types::{AppState, FilterSession, Request, SessionStore};
use crate::schema::Schema;

/// Success envelope for request `id`.
pub fn ok(id: &str, result: Value) -> Value {
    json!({ "id": id, "ok": true, "result": result })
}

/// Error envelope; `details` is omitted when there are none.
pub fn err(id: &str, code: &str, message: impl Into<String>, details: Option<Value>) -> Value {
    let mut body = json!({ "code": code, "message": message.into() });
    if let Some(d) = details {
        body["details"] = d;
    }
    json!({ "id": id, "ok": false, "error": body })
}

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<FilterError> for HandlerErr {
    fn from(e: FilterError) -> Self {
        let details = match &e {
            FilterError::UnknownField(name) => Some(json!({ "field": name })),
            _ => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<NormalizeError> for HandlerErr {
    fn from(e: NormalizeError) -> Self {
        let details = match &e {
            NormalizeError::MalformedTime { field, value } => {
                Some(json!({ "field": field, "value": value }))
            }
            NormalizeError::MalformedDate(value) => Some(json!({ "field": "date", "value": value })),
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

pub fn respond(req: &Request, res: Result<Value, HandlerErr>) -> Value {
    match res {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn parse_schema_param(params: &Value) -> Result<Option<Schema>, HandlerErr> {
    match params.get("schema") {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => Ok(Some(Schema::from_json(raw)?)),
    }
}

pub fn session_mut<'a>(
    state: &'a mut AppState,
    params: &Value,
) -> Result<&'a mut FilterSession, HandlerErr> {
    let session_id = required_str(params, "sessionId")?;
    state.sessions.get_mut(session_id).ok_or_else(|| {
        HandlerErr::new("not_found", "filter session not found")
            .with_details(json!({ "sessionId": session_id }))
    })
}

pub fn state_view(engine: &FilterEngine<SessionStore>) -> Value {
    json!({
        "state": engine.state(),
        "payload": engine.compute_active_payload(),
    })
}

pub fn full_view(engine: &FilterEngine<SessionStore>) -> Value {
    let mut v = state_view(engine);
    v["namespace"] = json!(engine.namespace());
    v["controls"] = json!(render_controls(engine.schema(), engine.state()));
    v
}
