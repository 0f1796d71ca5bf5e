//! Collector (sink) configuration
//!
//! The sink is a GA4 Measurement Protocol endpoint. Credentials are either
//! inline or read from an environment variable at startup.

use std::time::Duration;

use ferry_protocol::PayloadType;
use serde::Deserialize;

/// Default Measurement Protocol collect endpoint
pub const DEFAULT_COLLECT_URL: &str = "https://www.google-analytics.com/mp/collect";

/// Default Measurement Protocol validation endpoint
pub const DEFAULT_VALIDATION_URL: &str = "https://www.google-analytics.com/debug/mp/collect";

/// Measurement Protocol sink configuration
///
/// # Example
///
/// ```toml
/// [sink]
/// payload_type = "gtag"
/// measurement_id = "G-02ABCDEFGH"
/// api_secret_env = "GA4_API_SECRET"
/// validate_payloads = false
/// dry_run = false
/// timeout = "10s"
/// ```
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// `gtag` (web, needs measurement_id) or `firebase` (app, needs firebase_app_id)
    pub payload_type: PayloadType,

    /// API secret (prefer `api_secret_env`)
    pub api_secret: Option<String>,

    /// Environment variable holding the API secret
    pub api_secret_env: Option<String>,

    /// Web stream measurement ID
    pub measurement_id: Option<String>,

    /// Firebase app ID
    pub firebase_app_id: Option<String>,

    /// Collect endpoint
    pub collect_url: String,

    /// Validation endpoint
    pub validation_url: String,

    /// Check each request against the validation endpoint before sending
    /// Default: false
    pub validate_payloads: bool,

    /// Log payloads instead of sending them
    /// Default: false
    pub dry_run: bool,

    /// HTTP request timeout
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            payload_type: PayloadType::Gtag,
            api_secret: None,
            api_secret_env: None,
            measurement_id: None,
            firebase_app_id: None,
            collect_url: DEFAULT_COLLECT_URL.to_string(),
            validation_url: DEFAULT_VALIDATION_URL.to_string(),
            validate_payloads: false,
            dry_run: false,
            timeout: Duration::from_secs(10),
        }
    }
}

impl SinkConfig {
    /// Resolve the API secret: inline value first, then the environment
    pub fn resolve_api_secret(&self) -> Option<String> {
        if let Some(secret) = self.api_secret.as_ref().filter(|s| !s.is_empty()) {
            return Some(secret.clone());
        }
        self.api_secret_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|s| !s.is_empty())
    }
}

impl std::fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkConfig")
            .field("payload_type", &self.payload_type)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .field("api_secret_env", &self.api_secret_env)
            .field("measurement_id", &self.measurement_id)
            .field("firebase_app_id", &self.firebase_app_id)
            .field("collect_url", &self.collect_url)
            .field("validation_url", &self.validation_url)
            .field("validate_payloads", &self.validate_payloads)
            .field("dry_run", &self.dry_run)
            .field("timeout", &self.timeout)
            .finish()
    }
}
