//! Ferry Protocol - Core types for the event transfer pipeline
//!
//! This crate provides the types that flow through the pipeline:
//! - `RawRow` - One source row (ordered columns of tagged `Value`s)
//! - `Hit` - A normalized analytics event with a deterministic `DedupKey`
//! - `Batch` - Size-bounded group of hits plus the cursor it commits
//! - `SendResult` - Per-batch outcome with per-hit `HitOutcome`s
//! - `Cursor` - Opaque source position used for resume
//! - `RunSummary` - Aggregate counts for one run
//!
//! The `payload` module encodes hits as GA4 Measurement Protocol bodies.
//!
//! # Data Flow
//!
//! ```text
//! RawRow ──map──> Hit ──batch──> Batch ──send──> SendResult ──commit──> Cursor
//! ```

mod batch;
mod cursor;
mod error;
mod hit;
mod outcome;
pub mod payload;
mod row;
mod summary;
mod value;

pub use batch::Batch;
pub use cursor::Cursor;
pub use error::ProtocolError;
pub use hit::{DedupKey, Hit};
pub use outcome::{BatchStatus, HitOutcome, ItemStatus, SendResult};
pub use payload::PayloadType;
pub use row::{RawRow, RowId};
pub use summary::{FailureRecord, RunState, RunSummary};
pub use value::{Value, ValueKind};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Default maximum hits per batch
pub const DEFAULT_MAX_BATCH_HITS: usize = 500;

/// Default maximum serialized bytes per batch
pub const DEFAULT_MAX_BATCH_BYTES: usize = payload::MAX_REQUEST_BYTES;

#[cfg(test)]
mod hit_test;
