//! Tests for mapping error types

use super::*;

fn row() -> RowId {
    RowId::Line {
        object: "exports/day1.csv".into(),
        line: 7,
    }
}

#[test]
fn test_error_creation() {
    let err = MappingError::missing_field(&row(), "client_id");
    assert_eq!(err.kind, MappingErrorKind::MissingField);
    assert_eq!(err.code(), "missing_field");

    let err = MappingError::invalid_type(&row(), "value", "'x' is not a number");
    assert_eq!(err.code(), "invalid_type");

    let err = MappingError::invalid_json(&row(), "expected object");
    assert_eq!(err.code(), "invalid_json_structure");
}

#[test]
fn test_error_display() {
    let err = MappingError::missing_field(&row(), "client_id");
    assert_eq!(
        err.to_string(),
        "exports/day1.csv:7: missing_field: column 'client_id' is missing or null"
    );
}
