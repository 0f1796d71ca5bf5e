use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use ferry_protocol::{Cursor, RowId, Value};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;

use super::*;

/// Mock collector endpoint
#[derive(Default)]
struct MockState {
    /// Status and Retry-After seconds per collect call (default 204)
    responses: Mutex<VecDeque<(u16, Option<u64>)>>,
    /// Validation response body (default: no messages)
    validation: Mutex<Option<JsonValue>>,
    /// Status of the validation endpoint instead of a body
    validation_status: Mutex<Option<u16>>,
    collected: Mutex<Vec<(HashMap<String, String>, JsonValue)>>,
    validated: Mutex<Vec<JsonValue>>,
}

async fn collect_handler(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<JsonValue>,
) -> Response {
    state.collected.lock().push((query, body));
    let (status, retry_after) = state.responses.lock().pop_front().unwrap_or((204, None));
    let mut response = StatusCode::from_u16(status).unwrap().into_response();
    if let Some(secs) = retry_after {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}

async fn validate_handler(
    State(state): State<Arc<MockState>>,
    Json(body): Json<JsonValue>,
) -> Response {
    state.validated.lock().push(body);
    if let Some(status) = *state.validation_status.lock() {
        return StatusCode::from_u16(status).unwrap().into_response();
    }
    let result = state
        .validation
        .lock()
        .clone()
        .unwrap_or_else(|| serde_json::json!({"validationMessages": []}));
    Json(result).into_response()
}

async fn start_server(state: Arc<MockState>) -> String {
    let app = Router::new()
        .route("/mp/collect", post(collect_handler))
        .route("/debug/mp/collect", post(validate_handler))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn sink_config(base: &str) -> SinkConfig {
    SinkConfig {
        measurement_id: Some("G-TEST".into()),
        collect_url: format!("{}/mp/collect", base),
        validation_url: format!("{}/debug/mp/collect", base),
        ..Default::default()
    }
}

fn hit(client: &str, index: u64) -> Hit {
    let mut hit = Hit::new(
        client,
        "purchase",
        RowId::Offset { index },
        Cursor::Offset { rows: index + 1 },
    );
    hit.params.insert("value".into(), Value::Float(9.5));
    hit
}

async fn collector(state: &Arc<MockState>, tweak: impl FnOnce(&mut SinkConfig)) -> MeasurementProtocolCollector {
    let base = start_server(state.clone()).await;
    let mut config = sink_config(&base);
    tweak(&mut config);
    MeasurementProtocolCollector::new(&config, "s3cret").unwrap()
}

#[tokio::test]
async fn test_accepts_and_sends_credentials() {
    let state = Arc::new(MockState::default());
    let mp = collector(&state, |_| {}).await;

    let statuses = mp.collect(&[hit("c1", 0), hit("c1", 1)]).await.unwrap();
    assert_eq!(statuses, vec![ItemStatus::Accepted; 2]);

    let collected = state.collected.lock();
    assert_eq!(collected.len(), 1);
    let (query, body) = &collected[0];
    assert_eq!(query.get("api_secret").map(String::as_str), Some("s3cret"));
    assert_eq!(query.get("measurement_id").map(String::as_str), Some("G-TEST"));
    assert_eq!(body["client_id"], "c1");
    assert_eq!(body["events"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_one_request_per_client() {
    let state = Arc::new(MockState::default());
    let mp = collector(&state, |_| {}).await;

    mp.collect(&[hit("c1", 0), hit("c1", 1), hit("c2", 2)])
        .await
        .unwrap();

    let collected = state.collected.lock();
    assert_eq!(collected.len(), 2);
    assert_eq!(collected[1].1["client_id"], "c2");
}

#[tokio::test]
async fn test_firebase_uses_app_instance_id() {
    let state = Arc::new(MockState::default());
    let mp = collector(&state, |c| {
        c.payload_type = PayloadType::Firebase;
        c.measurement_id = None;
        c.firebase_app_id = Some("1:123:android:abc".into());
    })
    .await;

    mp.collect(&[hit("inst-1", 0)]).await.unwrap();

    let collected = state.collected.lock();
    let (query, body) = &collected[0];
    assert_eq!(
        query.get("firebase_app_id").map(String::as_str),
        Some("1:123:android:abc")
    );
    assert!(!query.contains_key("measurement_id"));
    assert_eq!(body["app_instance_id"], "inst-1");
}

#[tokio::test]
async fn test_throttle_stops_remaining_requests() {
    let state = Arc::new(MockState::default());
    state.responses.lock().push_back((429, Some(3)));
    let mp = collector(&state, |_| {}).await;

    let statuses = mp.collect(&[hit("c1", 0), hit("c2", 1)]).await.unwrap();
    let throttled = ItemStatus::Throttled {
        retry_after: Some(Duration::from_secs(3)),
    };
    assert_eq!(statuses, vec![throttled.clone(), throttled]);
    assert_eq!(state.collected.lock().len(), 1);
}

#[tokio::test]
async fn test_status_classification_per_request() {
    let state = Arc::new(MockState::default());
    state.responses.lock().extend([(500, None), (400, None), (204, None)]);
    let mp = collector(&state, |_| {}).await;

    let statuses = mp
        .collect(&[hit("c1", 0), hit("c2", 1), hit("c3", 2)])
        .await
        .unwrap();
    assert_eq!(
        statuses,
        vec![
            ItemStatus::Transient("http_500".into()),
            ItemStatus::Rejected("http_400".into()),
            ItemStatus::Accepted,
        ]
    );
}

#[tokio::test]
async fn test_validation_rejects_before_sending() {
    let state = Arc::new(MockState::default());
    *state.validation.lock() = Some(serde_json::json!({
        "validationMessages": [{
            "fieldPath": "events.params",
            "description": "Event param [value] has an invalid type.",
            "validationCode": "VALUE_INVALID"
        }]
    }));
    let mp = collector(&state, |c| c.validate_payloads = true).await;

    let statuses = mp.collect(&[hit("c1", 0)]).await.unwrap();
    assert_eq!(
        statuses,
        vec![ItemStatus::Rejected("invalid_events_params".into())]
    );
    assert!(state.collected.lock().is_empty());

    let validated = state.validated.lock();
    assert_eq!(validated[0]["validationBehavior"], "ENFORCE_RECOMMENDATIONS");
}

#[tokio::test]
async fn test_valid_payload_is_sent_without_validation_flag() {
    let state = Arc::new(MockState::default());
    let mp = collector(&state, |c| c.validate_payloads = true).await;

    let statuses = mp.collect(&[hit("c1", 0)]).await.unwrap();
    assert_eq!(statuses, vec![ItemStatus::Accepted]);
    assert_eq!(state.validated.lock().len(), 1);

    let collected = state.collected.lock();
    assert!(collected[0].1.get("validationBehavior").is_none());
}

#[tokio::test]
async fn test_validation_auth_failure_is_rejected() {
    let state = Arc::new(MockState::default());
    *state.validation_status.lock() = Some(403);
    let mp = collector(&state, |c| c.validate_payloads = true).await;

    let statuses = mp.collect(&[hit("c1", 0), hit("c2", 1)]).await.unwrap();
    assert_eq!(
        statuses,
        vec![
            ItemStatus::Rejected("http_403".into()),
            ItemStatus::Rejected("http_403".into())
        ]
    );
    assert!(state.collected.lock().is_empty());
}

#[tokio::test]
async fn test_validation_server_error_is_transient() {
    let state = Arc::new(MockState::default());
    *state.validation_status.lock() = Some(503);
    let mp = collector(&state, |c| c.validate_payloads = true).await;

    let statuses = mp.collect(&[hit("c1", 0)]).await.unwrap();
    assert_eq!(statuses, vec![ItemStatus::Transient("http_503".into())]);
}

#[tokio::test]
async fn test_validation_throttle_stops_remaining_requests() {
    let state = Arc::new(MockState::default());
    *state.validation_status.lock() = Some(429);
    let mp = collector(&state, |c| c.validate_payloads = true).await;

    let statuses = mp.collect(&[hit("c1", 0), hit("c2", 1)]).await.unwrap();
    assert!(statuses.iter().all(|s| matches!(s, ItemStatus::Throttled { .. })));
    assert_eq!(state.validated.lock().len(), 1);
}

#[tokio::test]
async fn test_unreachable_collector_is_transient() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let mp = MeasurementProtocolCollector::new(&sink_config(&base), "s3cret").unwrap();
    let statuses = mp.collect(&[hit("c1", 0)]).await.unwrap();
    match &statuses[0] {
        ItemStatus::Transient(reason) => assert!(!reason.contains("s3cret"), "{}", reason),
        other => panic!("expected transient, got {:?}", other),
    }
}

#[test]
fn test_missing_stream_id_is_config_error() {
    let config = SinkConfig {
        measurement_id: None,
        ..Default::default()
    };
    let err = MeasurementProtocolCollector::new(&config, "s3cret").err().unwrap();
    assert!(matches!(err, SinkError::Config(_)));
    assert!(err.to_string().contains("measurement_id"));
}

#[test]
fn test_missing_secret_is_config_error() {
    let config = SinkConfig {
        measurement_id: Some("G-TEST".into()),
        ..Default::default()
    };
    assert!(matches!(
        MeasurementProtocolCollector::from_config(&config),
        Err(SinkError::Config(_))
    ));
}

#[test]
fn test_classify_validation_message() {
    assert_eq!(
        classify_validation_message(Some("client_id"), ""),
        "invalid_client_id"
    );
    assert_eq!(
        classify_validation_message(Some("events.params.items"), ""),
        "invalid_events_params_items"
    );
    assert_eq!(
        classify_validation_message(None, "timestamp_micros is in the future"),
        "invalid_timestamp_micros"
    );
    assert_eq!(
        classify_validation_message(Some(""), "Unknown problem"),
        "invalid_values"
    );
}

#[test]
fn test_classify_response() {
    let mut headers = HeaderMap::new();
    assert_eq!(
        classify_response(StatusCode::NO_CONTENT, &headers),
        ItemStatus::Accepted
    );
    assert_eq!(
        classify_response(StatusCode::REQUEST_TIMEOUT, &headers),
        ItemStatus::Transient("http_408".into())
    );
    assert_eq!(
        classify_response(StatusCode::FORBIDDEN, &headers),
        ItemStatus::Rejected("http_403".into())
    );

    headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
    assert_eq!(
        classify_response(StatusCode::TOO_MANY_REQUESTS, &headers),
        ItemStatus::Throttled {
            retry_after: Some(Duration::from_secs(7))
        }
    );
}
