//! Value coercion into declared kinds
//!
//! Sources often deliver everything as text (CSV always does), so a column
//! declared as `number` or `timestamp` accepts the string form of that kind.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use ferry_protocol::{Value, ValueKind};

/// Timestamp layouts accepted besides RFC 3339
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f UTC",
];

/// Coerce a non-null value into `kind`
///
/// Returns a short reason when the value cannot represent that kind.
/// Null is handled by the caller (it is "absent", not "mistyped").
pub fn coerce(value: &Value, kind: ValueKind) -> Result<Value, String> {
    match kind {
        ValueKind::String => Ok(match value {
            Value::String(_) => value.clone(),
            other => other.to_text().map(Value::String).unwrap_or(Value::Null),
        }),
        ValueKind::Number => to_number(value),
        ValueKind::Timestamp => to_timestamp(value),
        ValueKind::Bool => to_bool(value),
        ValueKind::Null => match value {
            Value::Null => Ok(Value::Null),
            other => Err(format!("expected null, got {}", other.kind())),
        },
    }
}

fn to_number(value: &Value) -> Result<Value, String> {
    match value {
        Value::Integer(_) => Ok(value.clone()),
        Value::Float(f) if f.is_finite() => Ok(value.clone()),
        Value::Float(f) => Err(format!("{} is not a finite number", f)),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Value::Integer(i));
            }
            match s.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Value::Float(f)),
                _ => Err(format!("'{}' is not a number", s)),
            }
        }
        other => Err(format!("expected number, got {}", other.kind())),
    }
}

/// Integers are read as epoch microseconds, the collector's native unit
fn to_timestamp(value: &Value) -> Result<Value, String> {
    match value {
        Value::Timestamp(_) => Ok(value.clone()),
        Value::Integer(micros) => from_micros(*micros),
        Value::String(s) => parse_timestamp(s.trim())
            .map(Value::Timestamp)
            .ok_or_else(|| format!("'{}' is not a timestamp", s)),
        other => Err(format!("expected timestamp, got {}", other.kind())),
    }
}

fn from_micros(micros: i64) -> Result<Value, String> {
    Utc.timestamp_micros(micros)
        .single()
        .map(Value::Timestamp)
        .ok_or_else(|| format!("{} is out of range for timestamp_micros", micros))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    s.parse::<i64>()
        .ok()
        .and_then(|micros| Utc.timestamp_micros(micros).single())
}

fn to_bool(value: &Value) -> Result<Value, String> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::Integer(0) => Ok(Value::Bool(false)),
        Value::Integer(1) => Ok(Value::Bool(true)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "n" => Ok(Value::Bool(false)),
            _ => Err(format!("'{}' is not a boolean", s)),
        },
        other => Err(format!("expected bool, got {}", other.kind())),
    }
}

#[cfg(test)]
#[path = "coerce_test.rs"]
mod tests;
