//! Sink error types

use std::time::Duration;

use ferry_protocol::ItemStatus;
use thiserror::Error;

/// Result type for collector calls
pub type Result<T> = std::result::Result<T, SendError>;

/// Failure of a whole collector call
///
/// Applies to every hit in the call. Per-item outcomes travel as
/// `ItemStatus` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Network failure, timeout, or server error; the call may succeed later
    #[error("transient send failure: {0}")]
    Transient(String),

    /// Collector rate-limited the call
    #[error("throttled by collector")]
    Throttled { retry_after: Option<Duration> },

    /// Collector refused the call (malformed payload, auth, quota)
    #[error("permanent send failure: {0}")]
    Permanent(String),
}

impl SendError {
    #[inline]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }

    /// Status every item of the failed call receives
    pub fn to_item_status(&self) -> ItemStatus {
        match self {
            Self::Transient(reason) => ItemStatus::Transient(reason.clone()),
            Self::Throttled { retry_after } => ItemStatus::Throttled {
                retry_after: *retry_after,
            },
            Self::Permanent(code) => ItemStatus::Rejected(code.clone()),
        }
    }
}

impl From<reqwest::Error> for SendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
            return Self::Transient(e.to_string());
        }
        match e.status() {
            Some(status) if status.as_u16() == 429 => Self::Throttled { retry_after: None },
            Some(status) if status.is_server_error() => Self::Transient(e.to_string()),
            Some(status) => Self::Permanent(format!("http_{}", status.as_u16())),
            None if e.is_builder() => Self::Permanent(e.to_string()),
            None => Self::Transient(e.to_string()),
        }
    }
}

/// Errors building a collector
#[derive(Debug, Error)]
pub enum SinkError {
    /// Collector initialization failed
    #[error("failed to initialize collector: {0}")]
    Init(String),

    /// Configuration error
    #[error("collector configuration error: {0}")]
    Config(String),
}

impl SinkError {
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
