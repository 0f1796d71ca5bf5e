//! Collector trait definition

use async_trait::async_trait;
use ferry_protocol::{Hit, ItemStatus};

use crate::error::Result;

/// A remote endpoint that accepts hits
///
/// `collect` returns one `ItemStatus` per hit, aligned by index, or a
/// `SendError` that applies to every hit of the call. Implementations must
/// not retry; the `Sender` owns retries.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short name for logs (e.g., "measurement_protocol")
    fn name(&self) -> &str;

    async fn collect(&self, hits: &[Hit]) -> Result<Vec<ItemStatus>>;
}
