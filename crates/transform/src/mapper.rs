//! Schema-driven row to hit mapping

use std::collections::{BTreeMap, HashSet};

use ferry_config::{FieldMapping, SchemaConfig};
use ferry_protocol::{Hit, RawRow, RowId, Value, ValueKind};

use crate::coerce::coerce;
use crate::embedded::parse_payload;
use crate::error::{MappingError, MappingErrorKind};

/// Longest event name the collector accepts
const MAX_EVENT_NAME_LEN: usize = 40;

/// Converts raw rows into hits
///
/// Mapping is a pure function of the row and the schema: the same row
/// always yields the same hit, dedup key included.
#[derive(Debug, Clone)]
pub struct EventMapper {
    schema: SchemaConfig,
    /// Columns consumed by explicit mappings (excluded from `include_unmapped`)
    mapped: HashSet<String>,
}

impl EventMapper {
    pub fn new(schema: SchemaConfig) -> Self {
        let mut mapped: HashSet<String> = schema
            .params
            .iter()
            .chain(&schema.user_properties)
            .map(|m| m.column.clone())
            .collect();
        mapped.insert(schema.client_id_column.clone());
        mapped.extend(
            [
                &schema.user_id_column,
                &schema.event_name_column,
                &schema.timestamp_column,
                &schema.non_personalized_ads_column,
                &schema.payload_column,
            ]
            .into_iter()
            .flatten()
            .cloned(),
        );

        Self { schema, mapped }
    }

    pub fn schema(&self) -> &SchemaConfig {
        &self.schema
    }

    /// Map one row
    ///
    /// # Errors
    ///
    /// Returns a row-local `MappingError` when the row fails validation.
    pub fn map(&self, row: &RawRow) -> Result<Hit, MappingError> {
        let mut hit = match &self.schema.payload_column {
            Some(column) => parse_payload(row, column)?,
            None => self.map_columns(row)?,
        };

        self.check_event_name(row.id(), &hit.event_name)?;

        if let Some(param) = &self.schema.dedup_param {
            hit.params
                .insert(param.clone(), Value::String(hit.dedup_key.to_string()));
        }
        Ok(hit)
    }

    fn map_columns(&self, row: &RawRow) -> Result<Hit, MappingError> {
        let id = row.id();
        let schema = &self.schema;

        for column in &schema.required {
            if present(row, column).is_none() {
                return Err(MappingError::missing_field(id, column));
            }
        }

        let client_id = text(row, &schema.client_id_column)
            .ok_or_else(|| MappingError::missing_field(id, &schema.client_id_column))?;

        let event_name = schema
            .event_name_column
            .as_deref()
            .and_then(|column| text(row, column))
            .or_else(|| schema.default_event_name.clone())
            .ok_or_else(|| {
                MappingError::missing_field(
                    id,
                    schema.event_name_column.as_deref().unwrap_or("event_name"),
                )
            })?;

        let mut hit = Hit::new(client_id, event_name, id.clone(), row.position().clone());

        hit.user_id = schema
            .user_id_column
            .as_deref()
            .and_then(|column| text(row, column));

        if let Some(column) = &schema.timestamp_column
            && let Some(value) = present(row, column)
        {
            match coerce(value, ValueKind::Timestamp) {
                Ok(Value::Timestamp(ts)) => hit.timestamp = Some(ts),
                Ok(other) => return Err(MappingError::invalid_type(id, column, other.kind())),
                Err(reason) => return Err(MappingError::invalid_type(id, column, reason)),
            }
        }

        if let Some(column) = &schema.non_personalized_ads_column
            && let Some(value) = present(row, column)
        {
            match coerce(value, ValueKind::Bool) {
                Ok(Value::Bool(npa)) => hit.non_personalized_ads = Some(npa),
                Ok(other) => return Err(MappingError::invalid_type(id, column, other.kind())),
                Err(reason) => return Err(MappingError::invalid_type(id, column, reason)),
            }
        }

        hit.params = map_fields(row, &schema.params)?;
        hit.user_properties = map_fields(row, &schema.user_properties)?;

        if schema.include_unmapped {
            for (name, value) in row.columns() {
                if value.is_null() || self.mapped.contains(name) {
                    continue;
                }
                hit.params
                    .entry(name.to_string())
                    .or_insert_with(|| value.clone());
            }
        }

        Ok(hit)
    }

    fn check_event_name(&self, id: &RowId, name: &str) -> Result<(), MappingError> {
        let valid_start = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
        let valid_chars = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_start || !valid_chars || name.len() > MAX_EVENT_NAME_LEN {
            return Err(MappingError::new(
                id,
                MappingErrorKind::InvalidEventName,
                format!(
                    "'{}' must start with a letter, use only letters, digits and '_', and be at most {} characters",
                    name, MAX_EVENT_NAME_LEN
                ),
            ));
        }

        if !self.schema.allowed_events.is_empty()
            && !self.schema.allowed_events.iter().any(|e| e == name)
        {
            return Err(MappingError::new(
                id,
                MappingErrorKind::EventNotAllowed,
                format!("event '{}' is not in allowed_events", name),
            ));
        }
        Ok(())
    }
}

/// Non-null value of a column
fn present<'a>(row: &'a RawRow, column: &str) -> Option<&'a Value> {
    row.get(column).filter(|v| !v.is_null())
}

/// Non-empty text of a column
fn text(row: &RawRow, column: &str) -> Option<String> {
    present(row, column)
        .and_then(Value::to_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn map_fields(
    row: &RawRow,
    mappings: &[FieldMapping],
) -> Result<BTreeMap<String, Value>, MappingError> {
    let mut out = BTreeMap::new();
    for mapping in mappings {
        let Some(value) = present(row, &mapping.column) else {
            if mapping.required {
                return Err(MappingError::missing_field(row.id(), &mapping.column));
            }
            continue;
        };
        let value = coerce(value, mapping.kind)
            .map_err(|reason| MappingError::invalid_type(row.id(), &mapping.column, reason))?;
        out.insert(mapping.output_name().to_string(), value);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "mapper_test.rs"]
mod tests;
