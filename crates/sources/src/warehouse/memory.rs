//! In-memory table implementing the paged query contract

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value as Json;

use super::{Page, PageRequest, WarehouseClient};
use crate::error::{Result, SourceError};

/// A table served page by page from memory
///
/// Page tokens are row offsets rendered as text. Key-mode requests filter
/// on the key column, comparing numerically when both sides are integers.
#[derive(Debug, Default)]
pub struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Vec<Json>>,
    page_size: Option<usize>,
    fetches: AtomicUsize,
    failures: Vec<usize>,
}

impl MemoryTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_row(mut self, values: Vec<Json>) -> Self {
        self.rows.push(values);
        self
    }

    /// Fixed page size, overriding the request's `max_rows`
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Make the `n`th fetch (0-based) fail as unavailable
    pub fn fail_fetch(mut self, n: usize) -> Self {
        self.failures.push(n);
        self
    }

    /// Fetches served so far
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Null keys never compare above a watermark
    fn key_after(key: &Json, after: &str) -> bool {
        if key.is_null() {
            return false;
        }
        match (key.as_i64(), after.parse::<i64>()) {
            (Some(k), Ok(a)) => k > a,
            _ => match key {
                Json::String(s) => s.as_str() > after,
                other => other.to_string().as_str() > after,
            },
        }
    }
}

#[async_trait]
impl WarehouseClient for MemoryTable {
    async fn fetch(&self, request: &PageRequest) -> Result<Page> {
        let n = self.fetches.fetch_add(1, Ordering::Relaxed);
        if self.failures.contains(&n) {
            return Err(SourceError::unavailable(format!("fetch {} failed", n)));
        }

        let size = self.page_size.unwrap_or(request.max_rows).max(1);

        if let Some(key_column) = &request.key_column {
            let index = self
                .columns
                .iter()
                .position(|c| c == key_column)
                .ok_or_else(|| SourceError::unavailable(format!("no column {}", key_column)))?;
            let rows = self
                .rows
                .iter()
                .filter(|row| match (&request.after_key, row.get(index)) {
                    (None, _) => true,
                    (Some(after), Some(key)) => Self::key_after(key, after),
                    (Some(_), None) => false,
                })
                .take(size)
                .cloned()
                .collect();
            return Ok(Page {
                columns: self.columns.clone(),
                rows,
                next_page_token: None,
            });
        }

        let offset = match &request.page_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| SourceError::unavailable(format!("bad page token {}", token)))?,
        };
        let end = (offset + size).min(self.rows.len());
        let start = offset.min(end);
        Ok(Page {
            columns: self.columns.clone(),
            rows: self.rows[start..end].to_vec(),
            next_page_token: (end < self.rows.len()).then(|| end.to_string()),
        })
    }
}
