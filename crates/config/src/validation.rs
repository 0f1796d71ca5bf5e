//! Configuration validation
//!
//! Validates config consistency:
//! - The pipeline has a name usable as a file stem
//! - Source fields required by the selected source type are present
//! - Sink credentials match the payload type
//! - Batch and retry limits are usable
//! - Schema mappings name an event and have no duplicate outputs

use std::collections::HashSet;

use ferry_protocol::PayloadType;
use ferry_protocol::payload::MAX_REQUEST_BYTES;

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::source::{BookmarkMode, SourceConfig};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_pipeline(config)?;
    validate_source(config)?;
    validate_sink(config)?;
    validate_batch(config)?;
    validate_retry(config)?;
    validate_schema(config)?;
    Ok(())
}

/// Check that collector credentials are resolvable
///
/// Kept apart from `validate_config` because secrets usually arrive through
/// the environment of the run, not the environment that checks the file.
pub fn validate_credentials(config: &Config) -> Result<()> {
    if config.sink.dry_run {
        return Ok(());
    }
    if config.sink.resolve_api_secret().is_none() {
        let hint = match &config.sink.api_secret_env {
            Some(var) => format!("api_secret (environment variable '{}' is unset)", var),
            None => "api_secret".to_string(),
        };
        return Err(ConfigError::MissingCredentials(hint));
    }
    Ok(())
}

fn validate_pipeline(config: &Config) -> Result<()> {
    let name = &config.pipeline.name;
    if name.is_empty() {
        return Err(ConfigError::missing_field("pipeline", "<unnamed>", "name"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(ConfigError::invalid_value(
            "pipeline",
            name,
            "name",
            "only ASCII letters, digits, '_', '-' and '.' are allowed",
        ));
    }
    if config.pipeline.read_batch_rows == 0 {
        return Err(ConfigError::invalid_value(
            "pipeline",
            name,
            "read_batch_rows",
            "must be greater than zero",
        ));
    }
    if config.pipeline.dedup_window == 0 {
        return Err(ConfigError::invalid_value(
            "pipeline",
            name,
            "dedup_window",
            "must be greater than zero",
        ));
    }
    Ok(())
}

fn validate_source(config: &Config) -> Result<()> {
    let name = &config.pipeline.name;
    match &config.source {
        SourceConfig::Files(files) => {
            if files.url.is_empty() {
                return Err(ConfigError::missing_field("source", name, "url"));
            }
            if !files.csv_delimiter.is_ascii() {
                return Err(ConfigError::invalid_value(
                    "source",
                    name,
                    "csv_delimiter",
                    "must be a single ASCII character",
                ));
            }
        }
        SourceConfig::Warehouse(wh) => {
            if wh.endpoint.is_empty() {
                return Err(ConfigError::missing_field("source", name, "endpoint"));
            }
            if wh.table.is_empty() {
                return Err(ConfigError::missing_field("source", name, "table"));
            }
            if wh.bookmark == BookmarkMode::Key && wh.key_column.is_none() {
                return Err(ConfigError::missing_field("source", name, "key_column"));
            }
        }
    }
    Ok(())
}

fn validate_sink(config: &Config) -> Result<()> {
    let name = &config.pipeline.name;
    let sink = &config.sink;
    let present = |v: &Option<String>| v.as_ref().is_some_and(|s| !s.is_empty());

    match sink.payload_type {
        PayloadType::Gtag if !present(&sink.measurement_id) => {
            return Err(ConfigError::missing_field("sink", name, "measurement_id"));
        }
        PayloadType::Firebase if !present(&sink.firebase_app_id) => {
            return Err(ConfigError::missing_field("sink", name, "firebase_app_id"));
        }
        _ => {}
    }

    for (field, url) in [
        ("collect_url", &sink.collect_url),
        ("validation_url", &sink.validation_url),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::invalid_value(
                "sink",
                name,
                field,
                "must be an http(s) URL",
            ));
        }
    }

    if sink.timeout.is_zero() {
        return Err(ConfigError::invalid_value(
            "sink",
            name,
            "timeout",
            "must be greater than zero",
        ));
    }
    Ok(())
}

fn validate_batch(config: &Config) -> Result<()> {
    let name = &config.pipeline.name;
    if config.batch.max_hits == 0 {
        return Err(ConfigError::invalid_value(
            "batch",
            name,
            "max_hits",
            "must be greater than zero",
        ));
    }
    if config.batch.max_bytes == 0 || config.batch.max_bytes > MAX_REQUEST_BYTES {
        return Err(ConfigError::invalid_value(
            "batch",
            name,
            "max_bytes",
            format!("must be between 1 and {}", MAX_REQUEST_BYTES),
        ));
    }
    Ok(())
}

fn validate_retry(config: &Config) -> Result<()> {
    let name = &config.pipeline.name;
    let retry = &config.retry;
    if retry.max_attempts == 0 {
        return Err(ConfigError::invalid_value(
            "retry",
            name,
            "max_attempts",
            "must be at least 1",
        ));
    }
    if retry.max_delay < retry.base_delay {
        return Err(ConfigError::invalid_value(
            "retry",
            name,
            "max_delay",
            "must not be shorter than base_delay",
        ));
    }
    if !(0.0..=1.0).contains(&retry.jitter) {
        return Err(ConfigError::invalid_value(
            "retry",
            name,
            "jitter",
            "must be between 0.0 and 1.0",
        ));
    }
    if retry.multiplier < 1.0 {
        return Err(ConfigError::invalid_value(
            "retry",
            name,
            "multiplier",
            "must be at least 1.0",
        ));
    }
    Ok(())
}

fn validate_schema(config: &Config) -> Result<()> {
    let name = &config.pipeline.name;
    let schema = &config.schema;

    if schema.payload_column.is_some() {
        return Ok(());
    }

    if schema.client_id_column.is_empty() {
        return Err(ConfigError::missing_field(
            "schema",
            name,
            "client_id_column",
        ));
    }
    if schema.event_name_column.is_none() && schema.default_event_name.is_none() {
        return Err(ConfigError::missing_field(
            "schema",
            name,
            "event_name_column",
        ));
    }
    if let Some(default) = &schema.default_event_name
        && !schema.allowed_events.is_empty()
        && !schema.allowed_events.contains(default)
    {
        return Err(ConfigError::invalid_value(
            "schema",
            name,
            "default_event_name",
            format!("'{}' is not in allowed_events", default),
        ));
    }

    for (field, mappings) in [
        ("params", &schema.params),
        ("user_properties", &schema.user_properties),
    ] {
        let mut seen = HashSet::new();
        for mapping in mappings {
            if mapping.column.is_empty() {
                return Err(ConfigError::missing_field("schema", name, "column"));
            }
            if !seen.insert(mapping.output_name()) {
                return Err(ConfigError::invalid_value(
                    "schema",
                    name,
                    field,
                    format!("duplicate output name '{}'", mapping.output_name()),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;
