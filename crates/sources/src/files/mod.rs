//! File source - JSON lines or CSV objects under a prefix
//!
//! Lists every object under the prefix whose extension matches the format,
//! reads them in lexicographic order, and addresses rows by (object, line).
//!
//! # Resume
//!
//! `Cursor::File { object, line }` means every object ordering before
//! `object` is done and the first `line` lines of `object` are consumed.
//! Objects that disappeared since the cursor was written are skipped, so
//! resuming continues with the first object after `object`.
//!
//! # Example
//!
//! ```ignore
//! let store = open_store("gs://exports")?;
//! let mut source = FileSource::new(store, "gs://exports", &files_config)
//!     .with_expected_columns(schema.expected_columns());
//! let cursor = source.open(resume).await?;
//! ```

mod parse;
mod store;

use std::sync::Arc;

use async_trait::async_trait;
use ferry_config::{FileFormat, FilesSourceConfig};
use ferry_protocol::{Cursor, RawRow, RowId};
use futures::TryStreamExt;
use object_store::ObjectStore;
use object_store::path::Path;
use tracing::{debug, info};

use crate::error::{Result, SourceError};
use crate::traits::{ReadBatch, RowSource};

pub use store::open_store;

use parse::{Line, parse_csv, parse_jsonl};

/// The object currently held in memory
struct LoadedObject {
    name: String,
    lines: Vec<Line>,
}

/// Row source over objects in an object store
pub struct FileSource {
    store: Arc<dyn ObjectStore>,
    location: String,
    prefix: Option<Path>,
    format: FileFormat,
    delimiter: u8,
    expected: Vec<String>,
    /// Sorted object names, filled by `open`
    objects: Vec<String>,
    loaded: Option<LoadedObject>,
}

impl FileSource {
    /// Create a file source; `location` is only used for logs
    pub fn new(
        store: Arc<dyn ObjectStore>,
        location: impl Into<String>,
        config: &FilesSourceConfig,
    ) -> Self {
        let prefix = config.prefix.trim_matches('/');
        Self {
            store,
            location: location.into(),
            prefix: (!prefix.is_empty()).then(|| Path::from(prefix)),
            format: config.format,
            // validated as ASCII by the config layer
            delimiter: u8::try_from(config.csv_delimiter).unwrap_or(b','),
            expected: Vec::new(),
            objects: Vec::new(),
            loaded: None,
        }
    }

    /// Columns every object must provide (checked on CSV headers)
    pub fn with_expected_columns(mut self, columns: Vec<String>) -> Self {
        self.expected = columns;
        self
    }

    /// Objects found by `open`, in read order
    pub fn objects(&self) -> &[String] {
        &self.objects
    }

    async fn list_objects(&self) -> Result<Vec<String>> {
        let metas: Vec<_> = self
            .store
            .list(self.prefix.as_ref())
            .try_collect()
            .await?;

        let extensions = self.format.extensions();
        let mut names: Vec<String> = metas
            .into_iter()
            .filter(|meta| {
                meta.location
                    .extension()
                    .is_some_and(|ext| extensions.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .map(|meta| meta.location.to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Make `name` the loaded object, downloading and decoding it if needed
    async fn load(&mut self, name: &str) -> Result<&[Line]> {
        let cached = self.loaded.as_ref().is_some_and(|l| l.name == name);
        if !cached {
            let data = self
                .store
                .get(&Path::from(name))
                .await?
                .bytes()
                .await?;

            let lines = match self.format {
                FileFormat::Jsonl => parse_jsonl(&data),
                FileFormat::Csv => parse_csv(&data, self.delimiter, &self.expected).map_err(
                    |missing| SourceError::SchemaMismatch {
                        location: name.to_string(),
                        missing,
                    },
                )?,
            };
            debug!(object = name, bytes = data.len(), lines = lines.len(), "loaded object");
            self.loaded = Some(LoadedObject {
                name: name.to_string(),
                lines,
            });
        }

        Ok(self
            .loaded
            .as_ref()
            .map(|l| l.lines.as_slice())
            .unwrap_or_default())
    }

    /// Index of the object to read and lines already consumed in it
    fn locate(&self, cursor: &Cursor) -> Result<(usize, u64)> {
        match cursor {
            Cursor::Start => Ok((0, 0)),
            Cursor::File { object, line } => {
                match self.objects.binary_search(object) {
                    Ok(index) => Ok((index, *line)),
                    // Object vanished: continue with the next one in order
                    Err(index) => Ok((index, 0)),
                }
            }
            other => Err(SourceError::IncompatibleCursor(other.clone())),
        }
    }
}

#[async_trait]
impl RowSource for FileSource {
    fn describe(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", self.location.trim_end_matches('/'), prefix),
            None => self.location.clone(),
        }
    }

    async fn open(&mut self, resume: Option<Cursor>) -> Result<Cursor> {
        self.objects = self.list_objects().await?;
        self.loaded = None;

        let cursor = resume.unwrap_or_default();
        let (index, _) = self.locate(&cursor)?;

        // Check the first CSV header before anything is sent; later objects
        // are checked as they load
        if self.format == FileFormat::Csv
            && let Some(name) = self.objects.get(index).cloned()
        {
            self.load(&name).await?;
        }

        info!(
            source = %self.describe(),
            objects = self.objects.len(),
            cursor = %cursor,
            "file source opened"
        );
        Ok(cursor)
    }

    async fn next_batch(&mut self, cursor: &Cursor, max_rows: usize) -> Result<ReadBatch> {
        let (mut index, mut line) = self.locate(cursor)?;
        let mut records = Vec::new();
        let mut position = cursor.clone();

        while records.len() < max_rows && index < self.objects.len() {
            let name = self.objects[index].clone();
            let lines = self.load(&name).await?;

            let Some(entry) = lines.get(line as usize).cloned() else {
                index += 1;
                line = 0;
                continue;
            };
            line += 1;

            let row = RowId::Line {
                object: name.clone(),
                line,
            };
            position = Cursor::File { object: name, line };
            match entry {
                Line::Blank => {}
                Line::Row(columns) => {
                    records.push(Ok(RawRow::new(row, position.clone(), columns)));
                }
                Line::Malformed(reason) => records.push(Err(SourceError::MalformedRecord {
                    row,
                    position: position.clone(),
                    reason,
                })),
            }
        }

        let exhausted = match self.objects.len().checked_sub(1) {
            None => true,
            Some(last) => {
                index > last
                    || (index == last
                        && self
                            .loaded
                            .as_ref()
                            .is_some_and(|l| l.name == self.objects[last] && line as usize >= l.lines.len()))
            }
        };

        Ok(ReadBatch {
            records,
            cursor: position,
            exhausted,
        })
    }
}

#[cfg(test)]
#[path = "files_test.rs"]
mod tests;
