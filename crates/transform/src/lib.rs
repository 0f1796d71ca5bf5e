//! Ferry - Transform
//!
//! Maps raw source rows into normalized hits.
//!
//! # Overview
//!
//! `EventMapper` applies a `SchemaConfig` to each `RawRow`:
//! - identity columns (client id, user id) and the event name
//! - declared parameters and user properties, coerced into their kinds
//! - required-field, event-name and allowed-event checks
//! - optionally, a pre-encoded payload column instead of columns
//!
//! A row that fails any check yields a `MappingError`. The pipeline counts
//! it as skipped and never retries it.
//!
//! # Example
//!
//! ```ignore
//! let mapper = EventMapper::new(config.schema.clone());
//! match mapper.map(&row) {
//!     Ok(hit) => batcher.add(hit),
//!     Err(e) => skipped.push(e),
//! }
//! ```

mod coerce;
mod embedded;
mod error;
mod mapper;

pub use coerce::coerce;
pub use error::{MappingError, MappingErrorKind};
pub use mapper::EventMapper;

/// Result type for mapping a single row
pub type Result<T> = std::result::Result<T, MappingError>;
