//! Warehouse source - table rows through a paged query collaborator
//!
//! The query itself runs elsewhere; this source only pages through its
//! result. Two bookmark modes:
//!
//! - **page token**: `Cursor::Page { token, skip }` names the page to fetch
//!   (`None` is the first) and how many of its rows are consumed
//! - **key**: `Cursor::Key { watermark }` is the last primary key read; the
//!   collaborator returns rows with keys strictly above it, in key order

mod http;
mod memory;

use async_trait::async_trait;
use ferry_config::{BookmarkMode, WarehouseSourceConfig};
use ferry_protocol::{Cursor, RawRow, RowId, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SourceError};
use crate::traits::{ReadBatch, RowSource, missing_columns};

pub use http::HttpWarehouseClient;
pub use memory::MemoryTable;

/// One page request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    pub table: String,
    /// Page to fetch (page-token mode); `None` is the first page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    /// Return rows with keys above this (key mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_key: Option<String>,
    /// Key column to order and filter by (key mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_column: Option<String>,
    pub max_rows: usize,
}

/// One page of results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub columns: Vec<String>,
    /// Rows as positional values aligned with `columns`
    pub rows: Vec<Vec<serde_json::Value>>,
    /// Token of the following page; absent on the last page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Paged access to a query result
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    async fn fetch(&self, request: &PageRequest) -> Result<Page>;
}

/// Row source over a `WarehouseClient`
pub struct WarehouseSource<C> {
    client: C,
    table: String,
    mode: BookmarkMode,
    key_column: Option<String>,
    expected: Vec<String>,
    /// Last fetched page and the token it was fetched with
    page: Option<(Option<String>, Page)>,
}

impl<C: WarehouseClient> WarehouseSource<C> {
    pub fn new(client: C, config: &WarehouseSourceConfig) -> Self {
        Self {
            client,
            table: config.table.clone(),
            mode: config.bookmark,
            key_column: config.key_column.clone(),
            expected: Vec::new(),
            page: None,
        }
    }

    /// Columns every page must carry
    pub fn with_expected_columns(mut self, columns: Vec<String>) -> Self {
        self.expected = columns;
        self
    }

    fn check_columns(&self, page: &Page) -> Result<()> {
        let missing = missing_columns(&self.expected, page.columns.iter().map(String::as_str));
        if !missing.is_empty() {
            return Err(SourceError::SchemaMismatch {
                location: self.table.clone(),
                missing,
            });
        }
        Ok(())
    }

    async fn fetch_page(&mut self, token: Option<String>, max_rows: usize) -> Result<&Page> {
        let cached = self.page.as_ref().is_some_and(|(t, _)| *t == token);
        if !cached {
            let request = PageRequest {
                table: self.table.clone(),
                page_token: token.clone(),
                max_rows,
                ..Default::default()
            };
            let page = self.client.fetch(&request).await?;
            self.check_columns(&page)?;
            debug!(table = %self.table, rows = page.rows.len(), "fetched page");
            self.page = Some((token, page));
        }
        self.page
            .as_ref()
            .map(|(_, page)| page)
            .ok_or_else(|| SourceError::unavailable("page cache empty"))
    }

    async fn next_by_page(
        &mut self,
        token: Option<String>,
        skip: u64,
        max_rows: usize,
    ) -> Result<ReadBatch> {
        let key_column = self.key_column.clone();
        let page = self.fetch_page(token.clone(), max_rows).await?;
        let key_index = key_column
            .as_ref()
            .and_then(|key| page.columns.iter().position(|c| c == key));
        let start = (skip as usize).min(page.rows.len());
        let end = (start + max_rows).min(page.rows.len());
        let columns = page.columns.clone();
        let next_token = page.next_page_token.clone();
        let total = page.rows.len();

        let records = page.rows[start..end]
            .iter()
            .enumerate()
            .map(|(offset, values)| {
                let consumed = (start + offset + 1) as u64;
                let position = Cursor::Page {
                    token: token.clone(),
                    skip: consumed,
                };
                let id = match key_index.and_then(|i| values.get(i)) {
                    Some(key) => RowId::Key {
                        key: json_text(key),
                    },
                    None => RowId::Key {
                        key: format!("{}#{}", token.as_deref().unwrap_or("first"), consumed),
                    },
                };
                build_row(id, position, &columns, values)
            })
            .collect::<Vec<_>>();

        let page_done = end >= total;
        let (cursor, exhausted) = match (page_done, next_token) {
            // Move to the next page so a resume does not refetch this one
            (true, Some(next)) => (
                Cursor::Page {
                    token: Some(next),
                    skip: 0,
                },
                false,
            ),
            (true, None) => (
                Cursor::Page {
                    token,
                    skip: end as u64,
                },
                true,
            ),
            (false, _) => (
                Cursor::Page {
                    token,
                    skip: end as u64,
                },
                false,
            ),
        };

        Ok(ReadBatch {
            records,
            cursor,
            exhausted,
        })
    }

    async fn next_by_key(&mut self, watermark: Option<String>, max_rows: usize) -> Result<ReadBatch> {
        let key_column = self
            .key_column
            .clone()
            .ok_or_else(|| SourceError::unavailable("key bookmark needs a key column"))?;
        let request = PageRequest {
            table: self.table.clone(),
            after_key: watermark.clone(),
            key_column: Some(key_column.clone()),
            max_rows,
            ..Default::default()
        };
        let page = self.client.fetch(&request).await?;
        self.check_columns(&page)?;

        let key_index = page
            .columns
            .iter()
            .position(|c| *c == key_column)
            .ok_or_else(|| SourceError::SchemaMismatch {
                location: self.table.clone(),
                missing: vec![key_column.clone()],
            })?;

        let mut records = Vec::with_capacity(page.rows.len());
        let mut last = watermark.clone();
        for (index, values) in page.rows.iter().take(max_rows).enumerate() {
            // A keyless row cannot move the watermark; it stays at the last key
            let Some(key) = values.get(key_index).and_then(key_text) else {
                let after = last.as_deref().unwrap_or("start");
                records.push(Err(SourceError::MalformedRecord {
                    row: RowId::Key {
                        key: format!("{}#{}", after, index + 1),
                    },
                    position: key_cursor(last.clone()),
                    reason: format!("no value in key column {}", key_column),
                }));
                continue;
            };
            let position = Cursor::Key {
                watermark: key.clone(),
            };
            last = Some(key.clone());
            records.push(build_row(RowId::Key { key }, position, &page.columns, values));
        }

        // A short page only means the collaborator caps its page size; the
        // table ends at an empty page. A page of keyless rows would be
        // returned again, so it ends the read too.
        let stalled = !page.rows.is_empty() && last == watermark;
        if stalled {
            warn!(
                table = %self.table,
                rows = page.rows.len(),
                "page has no keyed rows, watermark cannot advance"
            );
        }
        let exhausted = page.rows.is_empty() || stalled;
        let cursor = key_cursor(last);
        Ok(ReadBatch {
            records,
            cursor,
            exhausted,
        })
    }
}

#[async_trait]
impl<C: WarehouseClient> RowSource for WarehouseSource<C> {
    fn describe(&self) -> String {
        format!("warehouse table {}", self.table)
    }

    async fn open(&mut self, resume: Option<Cursor>) -> Result<Cursor> {
        let cursor = resume.unwrap_or_default();
        match (&cursor, self.mode) {
            (Cursor::Start, _)
            | (Cursor::Page { .. }, BookmarkMode::PageToken)
            | (Cursor::Key { .. }, BookmarkMode::Key) => {}
            _ => return Err(SourceError::IncompatibleCursor(cursor)),
        }
        self.page = None;
        info!(table = %self.table, mode = ?self.mode, cursor = %cursor, "warehouse source opened");
        Ok(cursor)
    }

    async fn next_batch(&mut self, cursor: &Cursor, max_rows: usize) -> Result<ReadBatch> {
        match (cursor, self.mode) {
            (Cursor::Start, BookmarkMode::PageToken) => self.next_by_page(None, 0, max_rows).await,
            (Cursor::Page { token, skip }, BookmarkMode::PageToken) => {
                self.next_by_page(token.clone(), *skip, max_rows).await
            }
            (Cursor::Start, BookmarkMode::Key) => self.next_by_key(None, max_rows).await,
            (Cursor::Key { watermark }, BookmarkMode::Key) => {
                self.next_by_key(Some(watermark.clone()), max_rows).await
            }
            (other, _) => Err(SourceError::IncompatibleCursor(other.clone())),
        }
    }
}

/// Zip positional values with their column names
fn build_row(
    id: RowId,
    position: Cursor,
    columns: &[String],
    values: &[serde_json::Value],
) -> std::result::Result<RawRow, SourceError> {
    if values.len() != columns.len() {
        return Err(SourceError::MalformedRecord {
            row: id,
            position,
            reason: format!("{} values for {} columns", values.len(), columns.len()),
        });
    }
    let columns = columns
        .iter()
        .zip(values)
        .map(|(name, value)| (name.clone(), Value::from_json(value.clone())))
        .collect();
    Ok(RawRow::new(id, position, columns))
}

/// Watermark cursor, or the start when no key has been read
fn key_cursor(watermark: Option<String>) -> Cursor {
    match watermark {
        Some(watermark) => Cursor::Key { watermark },
        None => Cursor::Start,
    }
}

/// Key text of a usable key value; null and empty keys have none
fn key_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        other => Some(json_text(other)),
    }
}

/// Key text without JSON quoting
fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "warehouse_test.rs"]
mod tests;
