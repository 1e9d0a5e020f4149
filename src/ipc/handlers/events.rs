use crate::events::{normalize_events, to_calendar_item, CalendarEvent};
use crate::ipc::handlers::setup::normalize_options;
use crate::ipc::helpers::{respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn parse_event(raw: &Value) -> Result<CalendarEvent, HandlerErr> {
    serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid event: {}", e)))
}

fn normalize_one(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let raw = params
        .get("event")
        .ok_or_else(|| HandlerErr::bad_params("missing event"))?;
    let event = parse_event(raw)?;
    let item = to_calendar_item(&event, &normalize_options(state))?;
    let inverted = item.instant.is_inverted();
    let mut out = serde_json::to_value(&item)
        .map_err(|e| HandlerErr::new("internal", e.to_string()))?;
    out["inverted"] = json!(inverted);
    Ok(out)
}

fn normalize_many(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let Some(raw) = params.get("events").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("events must be an array"));
    };
    let events = raw
        .iter()
        .map(parse_event)
        .collect::<Result<Vec<_>, _>>()?;

    let mut items = Vec::with_capacity(events.len());
    let mut failed = 0usize;
    for (i, res) in normalize_events(&events, &normalize_options(state))
        .into_iter()
        .enumerate()
    {
        match res {
            Ok(item) => items.push(json!({ "index": i, "ok": true, "item": item })),
            Err(e) => {
                failed += 1;
                let he = HandlerErr::from(e);
                items.push(json!({
                    "index": i,
                    "ok": false,
                    "error": { "code": he.code, "message": he.message, "details": he.details }
                }));
            }
        }
    }
    Ok(json!({ "items": items, "failed": failed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let res = match req.method.as_str() {
        "events.normalize" => normalize_one(state, &req.params),
        "events.normalizeMany" => normalize_many(state, &req.params),
        _ => return None,
    };
    Some(respond(req, res))
}
