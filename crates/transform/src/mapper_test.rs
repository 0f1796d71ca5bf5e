//! Tests for the event mapper

use super::*;
use chrono::{TimeZone, Utc};
use ferry_protocol::{Cursor, DedupKey};

fn row(index: u64, columns: Vec<(&str, Value)>) -> RawRow {
    RawRow::new(
        RowId::Offset { index },
        Cursor::Offset { rows: index + 1 },
        columns
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

fn schema() -> SchemaConfig {
    SchemaConfig {
        user_id_column: Some("user_id".into()),
        timestamp_column: Some("ts".into()),
        params: vec![
            FieldMapping {
                column: "value".into(),
                name: None,
                kind: ValueKind::Number,
                required: true,
            },
            FieldMapping {
                column: "currency".into(),
                name: Some("currency_code".into()),
                kind: ValueKind::String,
                required: false,
            },
        ],
        user_properties: vec![FieldMapping {
            column: "tier".into(),
            name: None,
            kind: ValueKind::String,
            required: false,
        }],
        ..Default::default()
    }
}

fn purchase_row(index: u64) -> RawRow {
    row(
        index,
        vec![
            ("client_id", Value::from("123.456")),
            ("user_id", Value::from("u-1")),
            ("event_name", Value::from("purchase")),
            ("ts", Value::from("2024-05-01 10:00:00")),
            ("value", Value::from("19.99")),
            ("currency", Value::from("EUR")),
            ("tier", Value::Null),
        ],
    )
}

#[test]
fn test_map_full_row() {
    let mapper = EventMapper::new(schema());
    let hit = mapper.map(&purchase_row(0)).unwrap();

    assert_eq!(hit.client_id, "123.456");
    assert_eq!(hit.user_id.as_deref(), Some("u-1"));
    assert_eq!(hit.event_name, "purchase");
    assert_eq!(
        hit.timestamp,
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
    );
    assert_eq!(hit.params.get("value"), Some(&Value::Float(19.99)));
    assert_eq!(hit.params.get("currency_code"), Some(&Value::from("EUR")));
    assert!(hit.user_properties.is_empty());
    assert_eq!(hit.row_id, RowId::Offset { index: 0 });
    assert_eq!(hit.position, Cursor::Offset { rows: 1 });
}

#[test]
fn test_mapping_is_deterministic() {
    let mapper = EventMapper::new(schema());
    let row = purchase_row(3);
    let first = mapper.map(&row).unwrap();
    let second = mapper.map(&row).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.dedup_key, DedupKey::derive(row.id(), "purchase"));

    // A fresh mapper over the same config agrees too
    let other = EventMapper::new(schema()).map(&row).unwrap();
    assert_eq!(first, other);
}

#[test]
fn test_missing_client_id() {
    let mapper = EventMapper::new(schema());
    let r = row(
        1,
        vec![
            ("client_id", Value::from("  ")),
            ("event_name", Value::from("purchase")),
            ("value", Value::Integer(1)),
        ],
    );
    let err = mapper.map(&r).unwrap_err();
    assert_eq!(err.kind, MappingErrorKind::MissingField);
    assert_eq!(err.row, RowId::Offset { index: 1 });
}

#[test]
fn test_required_param_missing() {
    let mapper = EventMapper::new(schema());
    let r = row(
        2,
        vec![
            ("client_id", Value::from("c")),
            ("event_name", Value::from("purchase")),
        ],
    );
    let err = mapper.map(&r).unwrap_err();
    assert_eq!(err.kind, MappingErrorKind::MissingField);
    assert!(err.reason.contains("value"));
}

#[test]
fn test_required_column_list() {
    let mapper = EventMapper::new(SchemaConfig {
        required: vec!["order_id".into()],
        ..Default::default()
    });
    let r = row(
        0,
        vec![
            ("client_id", Value::from("c")),
            ("event_name", Value::from("purchase")),
            ("order_id", Value::Null),
        ],
    );
    let err = mapper.map(&r).unwrap_err();
    assert!(err.reason.contains("order_id"));
}

#[test]
fn test_uncoercible_param() {
    let mapper = EventMapper::new(schema());
    let r = row(
        0,
        vec![
            ("client_id", Value::from("c")),
            ("event_name", Value::from("purchase")),
            ("value", Value::from("twenty")),
        ],
    );
    let err = mapper.map(&r).unwrap_err();
    assert_eq!(err.kind, MappingErrorKind::InvalidType);
    assert_eq!(err.code(), "invalid_type");
}

#[test]
fn test_bad_timestamp() {
    let mapper = EventMapper::new(schema());
    let r = row(
        0,
        vec![
            ("client_id", Value::from("c")),
            ("event_name", Value::from("purchase")),
            ("value", Value::Integer(5)),
            ("ts", Value::from("soon")),
        ],
    );
    assert_eq!(
        mapper.map(&r).unwrap_err().kind,
        MappingErrorKind::InvalidType
    );
}

#[test]
fn test_allowed_events() {
    let mapper = EventMapper::new(SchemaConfig {
        allowed_events: vec!["purchase".into(), "refund".into()],
        ..Default::default()
    });
    let ok = row(
        0,
        vec![
            ("client_id", Value::from("c")),
            ("event_name", Value::from("refund")),
        ],
    );
    assert!(mapper.map(&ok).is_ok());

    let bad = row(
        1,
        vec![
            ("client_id", Value::from("c")),
            ("event_name", Value::from("page_view")),
        ],
    );
    assert_eq!(
        mapper.map(&bad).unwrap_err().kind,
        MappingErrorKind::EventNotAllowed
    );
}

#[test]
fn test_invalid_event_name() {
    let mapper = EventMapper::new(SchemaConfig::default());
    let too_long = "a".repeat(41);
    for name in ["1st_purchase", "purchase-now", "", too_long.as_str()] {
        let r = row(
            0,
            vec![
                ("client_id", Value::from("c")),
                ("event_name", Value::from(name)),
            ],
        );
        let err = mapper.map(&r).unwrap_err();
        assert!(
            matches!(
                err.kind,
                MappingErrorKind::InvalidEventName | MappingErrorKind::MissingField
            ),
            "name {:?} gave {:?}",
            name,
            err
        );
    }
}

#[test]
fn test_default_event_name() {
    let mapper = EventMapper::new(SchemaConfig {
        event_name_column: None,
        default_event_name: Some("conversion".into()),
        ..Default::default()
    });
    let hit = mapper
        .map(&row(0, vec![("client_id", Value::from("c"))]))
        .unwrap();
    assert_eq!(hit.event_name, "conversion");
}

#[test]
fn test_include_unmapped_and_dedup_param() {
    let mapper = EventMapper::new(SchemaConfig {
        include_unmapped: true,
        dedup_param: Some("transaction_id".into()),
        ..Default::default()
    });
    let r = row(
        9,
        vec![
            ("client_id", Value::from("c")),
            ("event_name", Value::from("purchase")),
            ("coupon", Value::from("SPRING")),
            ("empty", Value::Null),
        ],
    );
    let hit = mapper.map(&r).unwrap();
    assert_eq!(hit.params.get("coupon"), Some(&Value::from("SPRING")));
    assert!(!hit.params.contains_key("empty"));
    assert!(!hit.params.contains_key("client_id"));
    assert_eq!(
        hit.params.get("transaction_id"),
        Some(&Value::String(hit.dedup_key.to_string()))
    );
}

#[test]
fn test_npa_column() {
    let mapper = EventMapper::new(SchemaConfig {
        non_personalized_ads_column: Some("npa".into()),
        ..Default::default()
    });
    let r = row(
        0,
        vec![
            ("client_id", Value::from("c")),
            ("event_name", Value::from("purchase")),
            ("npa", Value::from("true")),
        ],
    );
    assert_eq!(mapper.map(&r).unwrap().non_personalized_ads, Some(true));
}

#[test]
fn test_payload_column_checks_allowed_events() {
    let mapper = EventMapper::new(SchemaConfig {
        payload_column: Some("payload".into()),
        allowed_events: vec!["purchase".into()],
        ..Default::default()
    });
    let r = row(
        0,
        vec![(
            "payload",
            Value::from(r#"{"client_id":"c","events":[{"name":"login"}]}"#),
        )],
    );
    assert_eq!(
        mapper.map(&r).unwrap_err().kind,
        MappingErrorKind::EventNotAllowed
    );
}
