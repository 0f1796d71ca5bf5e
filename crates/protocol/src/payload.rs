//! Measurement Protocol payload encoding
//!
//! Turns hits into GA4 Measurement Protocol request bodies:
//!
//! ```json
//! {
//!   "client_id": "555.123",
//!   "user_id": "u-1",
//!   "non_personalized_ads": false,
//!   "user_properties": {"tier": {"value": "gold"}},
//!   "events": [
//!     {"name": "purchase", "timestamp_micros": 1700000000000000, "params": {"value": 9.99}}
//!   ]
//! }
//! ```
//!
//! Firebase payloads use `app_instance_id` in place of `client_id`.
//! One request carries at most [`MAX_EVENTS_PER_REQUEST`] events, all for
//! the same client.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::hit::Hit;

/// Events allowed in one Measurement Protocol request
pub const MAX_EVENTS_PER_REQUEST: usize = 25;

/// Maximum Measurement Protocol post body size in bytes
pub const MAX_REQUEST_BYTES: usize = 130_000;

/// Which client identifier the collector expects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadType {
    /// Web streams, identified by `client_id`
    #[default]
    Gtag,
    /// App streams, identified by `app_instance_id`
    Firebase,
}

impl PayloadType {
    /// JSON field that carries the client identifier
    pub fn client_field(&self) -> &'static str {
        match self {
            Self::Gtag => "client_id",
            Self::Firebase => "app_instance_id",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gtag => "gtag",
            Self::Firebase => "firebase",
        }
    }
}

/// Encode one event object
fn encode_event(hit: &Hit) -> Json {
    let mut event = Map::new();
    event.insert("name".into(), Json::String(hit.event_name.clone()));
    if let Some(ts) = hit.timestamp {
        event.insert("timestamp_micros".into(), Json::from(ts.timestamp_micros()));
    }
    if !hit.params.is_empty() {
        let params: Map<String, Json> = hit
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        event.insert("params".into(), Json::Object(params));
    }
    Json::Object(event)
}

/// Encode a request body for hits that share one identity
///
/// Identity fields are taken from the first hit; callers group hits with
/// [`group_requests`] first. Returns `Json::Null` for an empty slice.
pub fn encode_request(payload_type: PayloadType, hits: &[Hit]) -> Json {
    let Some(first) = hits.first() else {
        return Json::Null;
    };

    let mut body = Map::new();
    body.insert(
        payload_type.client_field().into(),
        Json::String(first.client_id.clone()),
    );
    if let Some(user_id) = &first.user_id {
        body.insert("user_id".into(), Json::String(user_id.clone()));
    }
    if let Some(npa) = first.non_personalized_ads {
        body.insert("non_personalized_ads".into(), Json::Bool(npa));
    }
    if !first.user_properties.is_empty() {
        let props: Map<String, Json> = first
            .user_properties
            .iter()
            .map(|(k, v)| {
                let mut wrapped = Map::new();
                wrapped.insert("value".into(), v.to_json());
                (k.clone(), Json::Object(wrapped))
            })
            .collect();
        body.insert("user_properties".into(), Json::Object(props));
    }
    body.insert(
        "events".into(),
        Json::Array(hits.iter().map(encode_event).collect()),
    );
    Json::Object(body)
}

/// Serialized size of a hit sent on its own
///
/// This is the unit the batcher budgets with: a batch's byte size is the
/// sum of its hits' standalone sizes, which bounds every grouped request
/// built from it.
pub fn encoded_len(payload_type: PayloadType, hit: &Hit) -> usize {
    serde_json::to_vec(&encode_request(payload_type, std::slice::from_ref(hit)))
        .map(|bytes| bytes.len())
        .unwrap_or(usize::MAX)
}

/// Split hits into request ranges
///
/// Consecutive hits with the same identity share a request, up to
/// [`MAX_EVENTS_PER_REQUEST`] events. Order is preserved.
pub fn group_requests(hits: &[Hit]) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut start = 0;

    for i in 1..=hits.len() {
        let boundary = i == hits.len()
            || i - start >= MAX_EVENTS_PER_REQUEST
            || !hits[start].same_identity(&hits[i]);
        if boundary {
            groups.push(start..i);
            start = i;
        }
    }

    groups
}
