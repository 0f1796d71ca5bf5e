//! Ferry Sinks - Delivery of hits to an analytics collector
//!
//! # Components
//!
//! - [`Collector`] - one call to the remote endpoint, per-item statuses back
//! - [`MeasurementProtocolCollector`] - GA4 Measurement Protocol over HTTP
//! - [`DryRunCollector`] - logs payloads, accepts everything
//! - [`Sender`] - retries a batch with backoff until every hit is terminal
//!
//! # Retry layering
//!
//! ```text
//! Sender::send(batch)
//!   └─ loop: Collector::collect(pending) ─> ItemStatus per hit
//!            Accepted/Rejected ─> terminal
//!            Throttled/Transient ─> backoff, resend subset
//! ```
//!
//! Collectors never retry on their own.

mod collector;
mod dry_run;
mod error;
mod measurement;
mod metrics;
mod retry;
mod scripted;
mod sender;

use std::sync::Arc;

use ferry_config::SinkConfig;
use tracing::info;

pub use collector::Collector;
pub use dry_run::DryRunCollector;
pub use error::{Result, SendError, SinkError};
pub use measurement::{
    MeasurementProtocolCollector, classify_response, classify_validation_message,
};
pub use metrics::{SenderMetrics, SenderSnapshot};
pub use retry::RetryPolicy;
pub use scripted::{Reply, ScriptedCollector};
pub use sender::{RETRIES_EXHAUSTED, Sender};

/// Build the collector a sink configuration describes
pub fn build_collector(config: &SinkConfig) -> std::result::Result<Arc<dyn Collector>, SinkError> {
    if config.dry_run {
        info!(payload_type = config.payload_type.as_str(), "dry run: nothing will be sent");
        return Ok(Arc::new(DryRunCollector::new(config.payload_type)));
    }
    let collector = MeasurementProtocolCollector::from_config(config)?;
    info!(
        payload_type = config.payload_type.as_str(),
        validate = config.validate_payloads,
        "measurement protocol collector ready"
    );
    Ok(Arc::new(collector))
}
