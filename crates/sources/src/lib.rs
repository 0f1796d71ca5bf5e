//! Ferry - Sources
//!
//! Restartable readers that produce `RawRow`s for the pipeline.
//!
//! # Available Sources
//!
//! - **Files** - JSON lines or CSV objects under a prefix in object storage
//!   (GCS or a local directory), resumed at (object, line)
//! - **Warehouse** - table rows paged through a query collaborator, resumed
//!   by page token or primary-key watermark
//! - **Memory** - rows held in memory, resumed by offset
//!
//! # Contract
//!
//! `open` returns the cursor to start from (the committed one on resume).
//! `next_batch` returns the records after a cursor, the cursor after them,
//! and whether the source is exhausted. A malformed row is returned in place
//! as `SourceError::MalformedRecord` and does not fail the read; any other
//! error is fatal to the run.
//!
//! # Example
//!
//! ```ignore
//! let mut source = build_source(&config.source, config.schema.expected_columns())?;
//! let mut cursor = source.open(committed).await?;
//! loop {
//!     let batch = source.next_batch(&cursor, 1000).await?;
//!     cursor = batch.cursor.clone();
//!     if batch.exhausted { break; }
//! }
//! ```

mod error;
pub mod files;
mod memory;
mod traits;
pub mod warehouse;

use ferry_config::SourceConfig;

pub use error::{Result, SourceError};
pub use files::{FileSource, open_store};
pub use memory::MemorySource;
pub use traits::{ReadBatch, RowSource};
pub use warehouse::{
    HttpWarehouseClient, MemoryTable, Page, PageRequest, WarehouseClient, WarehouseSource,
};

/// Build the configured source
///
/// `expected_columns` are the columns the schema needs; sources that can
/// see their columns before reading rows fail with `SchemaMismatch`.
pub fn build_source(
    config: &SourceConfig,
    expected_columns: Vec<String>,
) -> Result<Box<dyn RowSource>> {
    match config {
        SourceConfig::Files(files) => {
            let store = open_store(&files.url)?;
            Ok(Box::new(
                FileSource::new(store, files.url.clone(), files)
                    .with_expected_columns(expected_columns),
            ))
        }
        SourceConfig::Warehouse(wh) => {
            let client = HttpWarehouseClient::from_config(wh)?;
            Ok(Box::new(
                WarehouseSource::new(client, wh).with_expected_columns(expected_columns),
            ))
        }
    }
}
