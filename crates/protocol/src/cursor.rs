//! Source positions
//!
//! A `Cursor` marks a position in a source: everything before it has been
//! read. The pipeline persists the last committed cursor so a restarted
//! run resumes after it instead of from the start.
//!
//! The token form is a compact JSON document so the progress store can
//! treat it as opaque text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Position in a row source
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cursor {
    /// Nothing consumed yet
    #[default]
    Start,

    /// `rows` rows of an ordered result consumed
    Offset { rows: u64 },

    /// All objects ordering before `object` are done, and `line` lines
    /// of `object` are consumed
    File { object: String, line: u64 },

    /// Rows with a primary key up to and including `watermark` are consumed
    Key { watermark: String },

    /// Within the page fetched with `token` (None = first page), `skip`
    /// rows are consumed
    Page { token: Option<String>, skip: u64 },
}

impl Cursor {
    /// Encode as an opaque token
    pub fn to_token(&self) -> String {
        // Serializing a plain enum of strings and integers cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode a token produced by [`Cursor::to_token`]
    pub fn from_token(token: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(token).map_err(|e| ProtocolError::InvalidCursor(e.to_string()))
    }

    #[inline]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Offset { rows } => write!(f, "offset:{}", rows),
            Self::File { object, line } => write!(f, "{}:{}", object, line),
            Self::Key { watermark } => write!(f, "key>{}", watermark),
            Self::Page { token, skip } => match token {
                Some(t) => write!(f, "page:{}+{}", t, skip),
                None => write!(f, "page:first+{}", skip),
            },
        }
    }
}
