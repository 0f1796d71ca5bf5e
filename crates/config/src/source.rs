//! Row source configuration
//!
//! One source per run: either files in object storage or a warehouse table
//! behind a paged query endpoint.

use std::time::Duration;

use serde::Deserialize;

/// Record format of source files
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// One JSON object per line
    #[default]
    Jsonl,
    /// Comma-separated values with a header row
    Csv,
}

impl FileFormat {
    /// File extensions that belong to this format
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Jsonl => &["jsonl", "json", "ndjson"],
            Self::Csv => &["csv"],
        }
    }
}

/// Files in object storage
///
/// # Example
///
/// ```toml
/// [source]
/// type = "files"
/// url = "gs://my-bucket"
/// prefix = "exports/conversions/"
/// format = "jsonl"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesSourceConfig {
    /// Store location: `gs://bucket`, `file:///dir`, or a local directory path
    pub url: String,

    /// Object prefix to list under
    pub prefix: String,

    /// Record format
    pub format: FileFormat,

    /// CSV field delimiter
    /// Default: ','
    pub csv_delimiter: char,
}

impl Default for FilesSourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            prefix: String::new(),
            format: FileFormat::Jsonl,
            csv_delimiter: ',',
        }
    }
}

/// How a warehouse source bookmarks its position
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkMode {
    /// Exported-page token plus rows consumed within the page
    #[default]
    PageToken,
    /// Monotonic primary-key watermark
    Key,
}

/// Warehouse table read through a paged query endpoint
///
/// # Example
///
/// ```toml
/// [source]
/// type = "warehouse"
/// endpoint = "https://exports.internal/v1/rows"
/// table = "analytics.conversions"
/// bookmark = "key"
/// key_column = "conversion_id"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseSourceConfig {
    /// Base URL of the paged row endpoint
    pub endpoint: String,

    /// Fully qualified table name
    pub table: String,

    /// Bookmark mode
    pub bookmark: BookmarkMode,

    /// Primary key column (required for `bookmark = "key"`)
    pub key_column: Option<String>,

    /// Environment variable holding a bearer token for the endpoint
    pub token_env: Option<String>,

    /// HTTP request timeout
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for WarehouseSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            table: String::new(),
            bookmark: BookmarkMode::PageToken,
            key_column: None,
            token_env: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Source configuration, tagged by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Files(FilesSourceConfig),
    Warehouse(WarehouseSourceConfig),
}

impl SourceConfig {
    /// Short type name for logs
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Files(_) => "files",
            Self::Warehouse(_) => "warehouse",
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Files(FilesSourceConfig::default())
    }
}
