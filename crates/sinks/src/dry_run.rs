//! Dry-run collector
//!
//! Logs each request body instead of sending it and accepts every hit.

use async_trait::async_trait;
use ferry_protocol::payload::{encode_request, group_requests};
use ferry_protocol::{Hit, ItemStatus, PayloadType};
use tracing::info;

use crate::collector::Collector;
use crate::error::Result;

pub struct DryRunCollector {
    payload_type: PayloadType,
}

impl DryRunCollector {
    pub fn new(payload_type: PayloadType) -> Self {
        Self { payload_type }
    }
}

#[async_trait]
impl Collector for DryRunCollector {
    fn name(&self) -> &str {
        "dry_run"
    }

    async fn collect(&self, hits: &[Hit]) -> Result<Vec<ItemStatus>> {
        for range in group_requests(hits) {
            let body = encode_request(self.payload_type, &hits[range.clone()]);
            info!(
                events = range.len(),
                payload = %body,
                "dry run: payload not sent"
            );
        }
        Ok(vec![ItemStatus::Accepted; hits.len()])
    }
}
