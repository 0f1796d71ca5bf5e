//! Row-to-hit schema mapping

use ferry_protocol::ValueKind;
use serde::Deserialize;

/// One source column mapped to a hit parameter or user property
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FieldMapping {
    /// Source column
    pub column: String,

    /// Output name; defaults to the column name
    #[serde(default)]
    pub name: Option<String>,

    /// Declared value kind; string values are coerced into it
    #[serde(default = "default_kind")]
    pub kind: ValueKind,

    /// Row fails mapping when the column is absent or null
    #[serde(default)]
    pub required: bool,
}

fn default_kind() -> ValueKind {
    ValueKind::String
}

impl FieldMapping {
    /// Output name, falling back to the column name
    pub fn output_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.column)
    }
}

/// Schema mapping from raw rows to hits
///
/// # Example
///
/// ```toml
/// [schema]
/// client_id_column = "client_id"
/// event_name_column = "event_name"
/// timestamp_column = "event_ts"
/// allowed_events = ["purchase", "generate_lead"]
///
/// [[schema.params]]
/// column = "value"
/// kind = "number"
/// required = true
///
/// [[schema.user_properties]]
/// column = "tier"
/// name = "customer_tier"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Column holding the client (or app instance) id
    /// Default: "client_id"
    pub client_id_column: String,

    /// Column holding the signed-in user id
    pub user_id_column: Option<String>,

    /// Column holding the event name
    /// Default: "event_name"
    pub event_name_column: Option<String>,

    /// Event name used when the row carries none
    pub default_event_name: Option<String>,

    /// Column holding the event time
    pub timestamp_column: Option<String>,

    /// Column holding the non_personalized_ads flag
    pub non_personalized_ads_column: Option<String>,

    /// Column holding a complete pre-encoded event payload (JSON)
    pub payload_column: Option<String>,

    /// Mapped event parameters
    pub params: Vec<FieldMapping>,

    /// Mapped user properties
    pub user_properties: Vec<FieldMapping>,

    /// Columns that must be present and non-null
    pub required: Vec<String>,

    /// Accepted event names; empty accepts any
    pub allowed_events: Vec<String>,

    /// Copy unmapped columns into params as-is
    /// Default: false
    pub include_unmapped: bool,

    /// Attach the dedup key to each hit as this event parameter
    pub dedup_param: Option<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            client_id_column: "client_id".to_string(),
            user_id_column: None,
            event_name_column: Some("event_name".to_string()),
            default_event_name: None,
            timestamp_column: None,
            non_personalized_ads_column: None,
            payload_column: None,
            params: Vec::new(),
            user_properties: Vec::new(),
            required: Vec::new(),
            allowed_events: Vec::new(),
            include_unmapped: false,
            dedup_param: None,
        }
    }
}

impl SchemaConfig {
    /// Columns a source must expose for every row to be mappable
    ///
    /// A payload column replaces the identity and event columns.
    pub fn expected_columns(&self) -> Vec<&str> {
        if let Some(payload) = &self.payload_column {
            return vec![payload.as_str()];
        }

        let mut columns = vec![self.client_id_column.as_str()];
        if self.default_event_name.is_none()
            && let Some(event) = &self.event_name_column
        {
            columns.push(event);
        }
        columns.extend(self.required.iter().map(String::as_str));
        columns.extend(
            self.params
                .iter()
                .chain(&self.user_properties)
                .filter(|m| m.required)
                .map(|m| m.column.as_str()),
        );
        columns.sort_unstable();
        columns.dedup();
        columns
    }
}
