//! Rows that carry a complete, pre-encoded event payload
//!
//! The payload column holds a Measurement Protocol request body such as
//! `{"client_id": "..", "events": [{"name": "purchase", "params": {..}}]}`.
//! Each row maps to one hit, so the body must carry exactly one event.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use ferry_protocol::{Hit, RawRow, RowId, Value};
use serde_json::{Map, Value as Json};

use crate::error::MappingError;

/// Parse the payload column of `row` into a hit
pub(crate) fn parse_payload(row: &RawRow, column: &str) -> Result<Hit, MappingError> {
    let id = row.id();
    let text = match row.get(column) {
        Some(Value::String(s)) => s.as_str(),
        Some(Value::Null) | None => return Err(MappingError::missing_field(id, column)),
        Some(other) => {
            return Err(MappingError::invalid_json(
                id,
                format!("payload column holds a {}, not JSON text", other.kind()),
            ));
        }
    };

    let body: Json = serde_json::from_str(text)
        .map_err(|e| MappingError::invalid_json(id, format!("payload is not JSON: {}", e)))?;
    let Json::Object(body) = body else {
        return Err(MappingError::invalid_json(id, "payload must be a JSON object"));
    };

    let client_id = body
        .get("client_id")
        .or_else(|| body.get("app_instance_id"))
        .and_then(Json::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            MappingError::invalid_json(id, "payload has no client_id or app_instance_id")
        })?;

    let event = single_event(id, &body)?;
    let name = event
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| MappingError::invalid_json(id, "event has no name"))?;

    let mut hit = Hit::new(client_id, name, id.clone(), row.position().clone());
    hit.user_id = body
        .get("user_id")
        .and_then(Json::as_str)
        .map(str::to_string);
    hit.non_personalized_ads = body.get("non_personalized_ads").and_then(Json::as_bool);

    let micros = event
        .get("timestamp_micros")
        .or_else(|| body.get("timestamp_micros"));
    if let Some(micros) = micros {
        let ts = micros
            .as_i64()
            .or_else(|| micros.as_str().and_then(|s| s.parse().ok()))
            .and_then(|m| Utc.timestamp_micros(m).single())
            .ok_or_else(|| MappingError::invalid_json(id, "timestamp_micros is not an integer"))?;
        hit.timestamp = Some(ts);
    }

    if let Some(params) = event.get("params") {
        hit.params = object_fields(id, "params", params, |v| Some(v.clone()))?;
    }
    if let Some(props) = body.get("user_properties") {
        hit.user_properties =
            object_fields(id, "user_properties", props, |v| v.get("value").cloned())?;
    }

    Ok(hit)
}

fn single_event<'a>(id: &RowId, body: &'a Map<String, Json>) -> Result<&'a Map<String, Json>, MappingError> {
    let events = body
        .get("events")
        .and_then(Json::as_array)
        .ok_or_else(|| MappingError::invalid_json(id, "payload has no events array"))?;
    match events.as_slice() {
        [Json::Object(event)] => Ok(event),
        [_] => Err(MappingError::invalid_json(id, "event must be an object")),
        other => Err(MappingError::invalid_json(
            id,
            format!("payload must carry exactly one event, found {}", other.len()),
        )),
    }
}

fn object_fields(
    id: &RowId,
    field: &str,
    value: &Json,
    extract: impl Fn(&Json) -> Option<Json>,
) -> Result<BTreeMap<String, Value>, MappingError> {
    let Json::Object(map) = value else {
        return Err(MappingError::invalid_json(id, format!("{} must be an object", field)));
    };
    let mut out = BTreeMap::new();
    for (key, raw) in map {
        let inner = extract(raw).ok_or_else(|| {
            MappingError::invalid_json(id, format!("{}.{} has no value", field, key))
        })?;
        out.insert(key.clone(), Value::from_json(inner));
    }
    Ok(out)
}
