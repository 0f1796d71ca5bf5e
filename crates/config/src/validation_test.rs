use super::*;
use std::str::FromStr;

const BASE: &str = r#"
[pipeline]
name = "conversions"

[source]
type = "files"
url = "/data/exports"

[sink]
measurement_id = "G-TEST"
api_secret = "secret"
"#;

fn parse_with(extra: &str) -> Result<Config> {
    Config::from_str(&format!("{}\n{}", BASE, extra))
}

#[test]
fn test_base_config_is_valid() {
    let config = Config::from_str(BASE).unwrap();
    assert!(validate_config(&config).is_ok());
    assert!(validate_credentials(&config).is_ok());
}

#[test]
fn test_missing_pipeline_name() {
    let err = Config::from_str(&BASE.replace("name = \"conversions\"", ""))
        .unwrap_err();
    assert!(err.to_string().contains("name"));
}

#[test]
fn test_pipeline_name_must_be_file_safe() {
    let err = Config::from_str(&BASE.replace("conversions", "../etc")).unwrap_err();
    assert!(err.to_string().contains("name"));
}

#[test]
fn test_gtag_requires_measurement_id() {
    let err = Config::from_str(&BASE.replace("measurement_id = \"G-TEST\"", ""))
        .unwrap_err();
    assert!(err.to_string().contains("measurement_id"));
}

#[test]
fn test_firebase_requires_app_id() {
    let toml = BASE.replace(
        "measurement_id = \"G-TEST\"",
        "payload_type = \"firebase\"",
    );
    let err = Config::from_str(&toml).unwrap_err();
    assert!(err.to_string().contains("firebase_app_id"));
}

#[test]
fn test_missing_secret_is_credentials_error() {
    let toml = BASE.replace("api_secret = \"secret\"", "");
    let config = Config::from_str(&toml).unwrap();
    let err = validate_credentials(&config).unwrap_err();
    assert!(matches!(err, ConfigError::MissingCredentials(_)));
}

#[test]
fn test_dry_run_needs_no_secret() {
    let toml = BASE.replace("api_secret = \"secret\"", "dry_run = true");
    let config = Config::from_str(&toml).unwrap();
    assert!(validate_credentials(&config).is_ok());
}

#[test]
fn test_warehouse_key_mode_requires_key_column() {
    let toml = BASE.replace(
        "type = \"files\"\nurl = \"/data/exports\"",
        "type = \"warehouse\"\nendpoint = \"http://wh\"\ntable = \"t\"\nbookmark = \"key\"",
    );
    let err = Config::from_str(&toml).unwrap_err();
    assert!(err.to_string().contains("key_column"));
}

#[test]
fn test_batch_bytes_capped_by_collector_limit() {
    let err = parse_with("[batch]\nmax_bytes = 500000").unwrap_err();
    assert!(err.to_string().contains("max_bytes"));
}

#[test]
fn test_zero_max_hits() {
    let err = parse_with("[batch]\nmax_hits = 0").unwrap_err();
    assert!(err.to_string().contains("max_hits"));
}

#[test]
fn test_retry_ceiling_below_base() {
    let err = parse_with("[retry]\nbase_delay = \"10s\"\nmax_delay = \"1s\"").unwrap_err();
    assert!(err.to_string().contains("max_delay"));
}

#[test]
fn test_jitter_out_of_range() {
    let err = parse_with("[retry]\njitter = 1.5").unwrap_err();
    assert!(err.to_string().contains("jitter"));
}

#[test]
fn test_duplicate_param_output_name() {
    let extra = r#"
[[schema.params]]
column = "a"
name = "value"

[[schema.params]]
column = "value"
"#;
    let err = parse_with(extra).unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn test_default_event_not_allowed() {
    let extra = r#"
[schema]
default_event_name = "page_view"
allowed_events = ["purchase"]
"#;
    let err = parse_with(extra).unwrap_err();
    assert!(err.to_string().contains("default_event_name"));
}

#[test]
fn test_payload_column_skips_field_checks() {
    let extra = r#"
[schema]
payload_column = "payload"
client_id_column = ""
"#;
    assert!(parse_with(extra).is_ok());
}

#[test]
fn test_non_http_collect_url() {
    let toml = BASE.replace(
        "api_secret = \"secret\"",
        "api_secret = \"secret\"\ncollect_url = \"ftp://x\"",
    );
    let err = Config::from_str(&toml).unwrap_err();
    assert!(err.to_string().contains("collect_url"));
}

#[test]
fn test_zero_dedup_window() {
    let toml = BASE.replace(
        "name = \"conversions\"",
        "name = \"conversions\"\ndedup_window = 0",
    );
    let err = Config::from_str(&toml).unwrap_err();
    assert!(err.to_string().contains("dedup_window"));
}
