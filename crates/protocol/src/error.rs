//! Protocol error types

use thiserror::Error;

/// Errors from decoding protocol values
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Cursor token could not be decoded
    #[error("invalid cursor token: {0}")]
    InvalidCursor(String),
}
