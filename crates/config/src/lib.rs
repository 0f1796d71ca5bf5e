//! Ferry Configuration
//!
//! TOML-based configuration for one transfer pipeline: where rows come from,
//! how they map to hits, and where hits go. Every section has defaults;
//! a minimal config names the pipeline, the source and the GA4 stream.
//!
//! # Parsing
//!
//! ```
//! use ferry_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str(r#"
//! [pipeline]
//! name = "conversions"
//!
//! [source]
//! type = "files"
//! url = "gs://exports"
//!
//! [sink]
//! measurement_id = "G-ABC123"
//! api_secret_env = "GA4_API_SECRET"
//! "#).unwrap();
//! assert_eq!(config.batch.max_hits, 500);
//! ```

mod batch;
mod error;
mod logging;
mod pipeline;
mod progress;
mod retry;
mod schema;
mod sink;
mod source;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use batch::BatchConfig;
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use pipeline::PipelineConfig;
pub use progress::ProgressConfig;
pub use retry::RetryConfig;
pub use schema::{FieldMapping, SchemaConfig};
pub use sink::{DEFAULT_COLLECT_URL, DEFAULT_VALIDATION_URL, SinkConfig};
pub use source::{
    BookmarkMode, FileFormat, FilesSourceConfig, SourceConfig, WarehouseSourceConfig,
};
pub use validation::validate_credentials;

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pipeline identity and run settings
    pub pipeline: PipelineConfig,

    /// Row source
    pub source: SourceConfig,

    /// Measurement Protocol collector
    pub sink: SinkConfig,

    /// Batch limits
    pub batch: BatchConfig,

    /// Send retry policy
    pub retry: RetryConfig,

    /// Row-to-hit mapping
    pub schema: SchemaConfig,

    /// Cursor persistence
    pub progress: ProgressConfig,

    /// Logging configuration
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config = Self::parse_unvalidated(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML without running validation
    ///
    /// For callers that only need one section of a possibly incomplete file.
    pub fn parse_unvalidated(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(ConfigError::ParseError)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
