//! Normalized, sink-ready events

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cursor::Cursor;
use crate::row::RowId;
use crate::value::Value;

/// Length of the hex dedup key (128 bits of SHA-256)
const DEDUP_KEY_HEX_LEN: usize = 32;

/// Deterministic identifier of a (row, event) pair
///
/// Derived from the row identifier and event name only, so re-reading the
/// same row always produces the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey(String);

impl DedupKey {
    /// Derive the key for a row and event name
    pub fn derive(row: &RowId, event_name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(row.to_string().as_bytes());
        // Unit separator keeps ("a:1", "b") and ("a", ":1b") apart
        hasher.update([0x1f]);
        hasher.update(event_name.as_bytes());
        let digest = hasher.finalize();

        let mut key = hex::encode(digest);
        key.truncate(DEDUP_KEY_HEX_LEN);
        Self(key)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One outbound analytics event
///
/// Parameter maps are ordered so that serializing the same hit always
/// yields identical bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Client (or app instance) identifier
    pub client_id: String,

    /// Optional signed-in user identifier
    pub user_id: Option<String>,

    /// Event name
    pub event_name: String,

    /// Event time; `None` lets the collector use receipt time
    pub timestamp: Option<DateTime<Utc>>,

    /// Event parameters
    pub params: BTreeMap<String, Value>,

    /// User-scoped properties
    pub user_properties: BTreeMap<String, Value>,

    /// Opt the event out of ad personalization
    pub non_personalized_ads: Option<bool>,

    /// Deterministic dedup key
    pub dedup_key: DedupKey,

    /// Row this hit was mapped from
    pub row_id: RowId,

    /// Cursor after the source row
    pub position: Cursor,
}

impl Hit {
    /// Create a hit with empty parameters, deriving its dedup key
    pub fn new(
        client_id: impl Into<String>,
        event_name: impl Into<String>,
        row_id: RowId,
        position: Cursor,
    ) -> Self {
        let event_name = event_name.into();
        let dedup_key = DedupKey::derive(&row_id, &event_name);
        Self {
            client_id: client_id.into(),
            user_id: None,
            event_name,
            timestamp: None,
            params: BTreeMap::new(),
            user_properties: BTreeMap::new(),
            non_personalized_ads: None,
            dedup_key,
            row_id,
            position,
        }
    }

    /// Whether two hits can share one collector request
    ///
    /// A request carries events for a single client/user pair.
    pub fn same_identity(&self, other: &Hit) -> bool {
        self.client_id == other.client_id
            && self.user_id == other.user_id
            && self.non_personalized_ads == other.non_personalized_ads
            && self.user_properties == other.user_properties
    }
}
