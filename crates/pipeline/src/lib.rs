//! Ferry Pipeline - the run loop
//!
//! Connects a row source to the collector and keeps the committed cursor
//! honest.
//!
//! # Architecture
//!
//! ```text
//! RowSource ──> EventMapper ──> Batcher ──> Sender ──> ProgressTracker
//!   (read)         (map)        (pack)     (send)        (commit)
//! └──────────── prepare next ──────────┘  └──── deliver current ────┘
//! ```
//!
//! # Guarantees
//!
//! - A cursor is committed only after every hit of its batch is accepted
//!   or permanently failed; commits happen in batch order
//! - A crash between send and commit re-sends at most the uncommitted
//!   batch on resume
//! - Row-local problems are counted and skipped, never fatal
//! - One run per pipeline name at a time ([`RunLock`])

mod batcher;
mod dedup;
mod error;
mod lock;
mod progress;
mod runner;
mod stats;

pub use batcher::{Batcher, Oversize};
pub use dedup::DedupWindow;
pub use error::{PipelineError, ProgressError, Result};
pub use lock::RunLock;
pub use progress::{FileProgressStore, MemoryProgressStore, ProgressStore, ProgressTracker};
pub use runner::{HIT_TOO_LARGE, MALFORMED_RECORD, PipelineRunner};
pub use stats::{DeliveryStats, FailureLog, ReadStats};
