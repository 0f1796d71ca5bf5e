//! Decoding of JSON-lines and CSV objects into columns

use bytes::Bytes;
use ferry_protocol::Value;

use crate::traits::missing_columns;

/// One decoded line of an object
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Line {
    /// Nothing to emit (blank line)
    Blank,
    Row(Vec<(String, Value)>),
    Malformed(String),
}

/// Decode a JSON-lines object
///
/// Each non-blank line must be a JSON object.
pub(crate) fn parse_jsonl(data: &Bytes) -> Vec<Line> {
    let mut body: &[u8] = data;
    if let Some(stripped) = body.strip_suffix(b"\n") {
        body = stripped;
    }
    if body.is_empty() {
        return Vec::new();
    }

    body.split(|b| *b == b'\n')
        .map(|raw| {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            if raw.iter().all(u8::is_ascii_whitespace) {
                return Line::Blank;
            }
            match serde_json::from_slice::<serde_json::Value>(raw) {
                Ok(serde_json::Value::Object(map)) => Line::Row(
                    map.into_iter()
                        .map(|(k, v)| (k, Value::from_json(v)))
                        .collect(),
                ),
                Ok(other) => Line::Malformed(format!("expected a JSON object, got {}", kind(&other))),
                Err(e) => Line::Malformed(format!("invalid JSON: {}", e)),
            }
        })
        .collect()
}

fn kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Decode a CSV object with a header row
///
/// Empty fields become null. Returns the missing expected columns instead
/// of lines when the header does not cover them.
pub(crate) fn parse_csv(
    data: &Bytes,
    delimiter: u8,
    expected: &[String],
) -> Result<Vec<Line>, Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(data.as_ref());

    let headers: Vec<String> = match reader.headers() {
        Ok(headers) => headers.iter().map(|h| h.trim().to_string()).collect(),
        Err(_) => return Err(expected.to_vec()),
    };
    let missing = missing_columns(expected, headers.iter().map(String::as_str));
    if !missing.is_empty() {
        return Err(missing);
    }

    let lines = reader
        .records()
        .map(|record| match record {
            Ok(record) => Line::Row(
                headers
                    .iter()
                    .zip(record.iter())
                    .map(|(name, field)| {
                        let value = if field.is_empty() {
                            Value::Null
                        } else {
                            Value::from(field)
                        };
                        (name.clone(), value)
                    })
                    .collect(),
            ),
            Err(e) => Line::Malformed(format!("invalid CSV record: {}", e)),
        })
        .collect();
    Ok(lines)
}
