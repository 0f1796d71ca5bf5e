//! GA4 Measurement Protocol collector
//!
//! Hits are grouped into requests (one client per request, at most 25
//! events) and posted in order. Each request's HTTP status decides the
//! status of every hit it carried:
//!
//! | Response            | Item status                  |
//! |---------------------|------------------------------|
//! | 2xx                 | `Accepted`                   |
//! | 429                 | `Throttled` (Retry-After)    |
//! | 408, 5xx, network   | `Transient`                  |
//! | other 4xx           | `Rejected("http_<code>")`    |
//!
//! After a 429 the remaining requests of the call are not sent; their hits
//! are reported throttled too.
//!
//! With `validate_payloads`, every request is first checked against the
//! validation endpoint. A validation message rejects the request's hits
//! with a code derived from the offending field.

use std::time::Duration;

use async_trait::async_trait;
use ferry_config::SinkConfig;
use ferry_protocol::payload::{encode_request, group_requests};
use ferry_protocol::{Hit, ItemStatus, PayloadType};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::collector::Collector;
use crate::error::{Result, SendError, SinkError};

/// Validation behavior requested from the debug endpoint
const VALIDATION_BEHAVIOR: &str = "ENFORCE_RECOMMENDATIONS";

/// Payload fields a validation message can point at, most specific first
const VALIDATED_FIELDS: &[(&str, &str)] = &[
    ("events.params.items", "invalid_events_params_items"),
    ("events.params", "invalid_events_params"),
    ("non_personalized_ads", "invalid_non_personalized_ads"),
    ("timestamp_micros", "invalid_timestamp_micros"),
    ("user_properties", "invalid_user_properties"),
    ("app_instance_id", "invalid_app_instance_id"),
    ("client_id", "invalid_client_id"),
    ("user_id", "invalid_user_id"),
    ("events", "invalid_events"),
];

/// Code for validation messages that name no known field
const INVALID_VALUES: &str = "invalid_values";

#[derive(Debug, Deserialize)]
struct ValidationResponse {
    #[serde(default, rename = "validationMessages")]
    validation_messages: Vec<ValidationMessage>,
}

#[derive(Debug, Deserialize)]
struct ValidationMessage {
    #[serde(default, rename = "fieldPath")]
    field_path: Option<String>,
    #[serde(default)]
    description: String,
}

/// Failure code for a validation message
///
/// An exact field path match wins; otherwise the first field named in the
/// description.
pub fn classify_validation_message(field_path: Option<&str>, description: &str) -> &'static str {
    if let Some(path) = field_path
        && let Some((_, code)) = VALIDATED_FIELDS.iter().find(|(field, _)| *field == path)
    {
        return code;
    }
    VALIDATED_FIELDS
        .iter()
        .find(|(field, _)| description.contains(field))
        .map(|(_, code)| *code)
        .unwrap_or(INVALID_VALUES)
}

/// Item status for a collect response
pub fn classify_response(status: StatusCode, headers: &HeaderMap) -> ItemStatus {
    if status.is_success() {
        ItemStatus::Accepted
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ItemStatus::Throttled {
            retry_after: parse_retry_after(headers),
        }
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        ItemStatus::Transient(format!("http_{}", status.as_u16()))
    } else {
        ItemStatus::Rejected(format!("http_{}", status.as_u16()))
    }
}

/// Retry-After in delta-seconds form
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Convert a request error, dropping the URL (it carries the API secret)
fn redacted(e: reqwest::Error) -> SendError {
    SendError::from(e.without_url())
}

/// Measurement Protocol HTTP collector
pub struct MeasurementProtocolCollector {
    client: reqwest::Client,
    payload_type: PayloadType,
    collect_url: Url,
    /// Set when payloads are validated before sending
    validation_url: Option<Url>,
}

impl MeasurementProtocolCollector {
    /// Build a collector, resolving the API secret from the config
    pub fn from_config(config: &SinkConfig) -> std::result::Result<Self, SinkError> {
        let api_secret = config
            .resolve_api_secret()
            .ok_or_else(|| SinkError::config("api_secret is not set"))?;
        Self::new(config, &api_secret)
    }

    pub fn new(config: &SinkConfig, api_secret: &str) -> std::result::Result<Self, SinkError> {
        let (id_param, id) = match config.payload_type {
            PayloadType::Gtag => ("measurement_id", config.measurement_id.as_deref()),
            PayloadType::Firebase => ("firebase_app_id", config.firebase_app_id.as_deref()),
        };
        let id = id.filter(|s| !s.is_empty()).ok_or_else(|| {
            SinkError::config(format!(
                "{} is required for {} payloads",
                id_param,
                config.payload_type.as_str()
            ))
        })?;

        let params = [("api_secret", api_secret), (id_param, id)];
        let collect_url = Url::parse_with_params(&config.collect_url, &params)
            .map_err(|e| SinkError::config(format!("invalid collect_url: {}", e)))?;
        let validation_url = if config.validate_payloads {
            Some(
                Url::parse_with_params(&config.validation_url, &params)
                    .map_err(|e| SinkError::config(format!("invalid validation_url: {}", e)))?,
            )
        } else {
            None
        };

        let client = reqwest::Client::builder()
            .user_agent(concat!("ferry/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| SinkError::init(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            payload_type: config.payload_type,
            collect_url,
            validation_url,
        })
    }

    /// Check one request body against the validation endpoint
    ///
    /// Returns the status every event of the request gets without being
    /// sent, or `None` when the payload is valid. HTTP failures of the
    /// endpoint are classified like collect responses.
    async fn validate(&self, url: &Url, body: &Json) -> Result<Option<ItemStatus>> {
        let mut body = body.clone();
        if let Json::Object(map) = &mut body {
            map.insert(
                "validationBehavior".into(),
                Json::String(VALIDATION_BEHAVIOR.into()),
            );
        }

        let response = self
            .client
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(redacted)?;
        let status = classify_response(response.status(), response.headers());
        if !matches!(status, ItemStatus::Accepted) {
            warn!(?status, "validation endpoint refused the request");
            return Ok(Some(status));
        }

        let result: ValidationResponse = response.json().await.map_err(redacted)?;
        Ok(result.validation_messages.first().map(|message| {
            let code =
                classify_validation_message(message.field_path.as_deref(), &message.description);
            warn!(
                code,
                field_path = message.field_path.as_deref().unwrap_or(""),
                description = %message.description,
                "payload failed validation"
            );
            ItemStatus::Rejected(code.to_string())
        }))
    }

    async fn post(&self, body: &Json) -> ItemStatus {
        match self.client.post(self.collect_url.clone()).json(body).send().await {
            Ok(response) => classify_response(response.status(), response.headers()),
            Err(e) => redacted(e).to_item_status(),
        }
    }
}

#[async_trait]
impl Collector for MeasurementProtocolCollector {
    fn name(&self) -> &str {
        "measurement_protocol"
    }

    async fn collect(&self, hits: &[Hit]) -> Result<Vec<ItemStatus>> {
        let mut statuses = Vec::with_capacity(hits.len());
        let mut throttled: Option<Option<Duration>> = None;

        for range in group_requests(hits) {
            let events = range.len();

            if let Some(retry_after) = throttled {
                statuses.extend(std::iter::repeat_n(
                    ItemStatus::Throttled { retry_after },
                    events,
                ));
                continue;
            }

            let body = encode_request(self.payload_type, &hits[range]);

            if let Some(url) = &self.validation_url {
                let refused = match self.validate(url, &body).await {
                    Ok(refused) => refused,
                    Err(e) => {
                        debug!(error = %e, "validation request failed");
                        Some(e.to_item_status())
                    }
                };
                if let Some(status) = refused {
                    if let ItemStatus::Throttled { retry_after } = &status {
                        throttled = Some(*retry_after);
                    }
                    statuses.extend(std::iter::repeat_n(status, events));
                    continue;
                }
            }

            let status = self.post(&body).await;
            debug!(events, ?status, "measurement protocol request");
            if let ItemStatus::Throttled { retry_after } = &status {
                throttled = Some(*retry_after);
            }
            statuses.extend(std::iter::repeat_n(status, events));
        }

        Ok(statuses)
    }
}

#[cfg(test)]
#[path = "measurement_test.rs"]
mod tests;
