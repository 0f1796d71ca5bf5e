//! Progress tracking - persisted cursors for resume
//!
//! A cursor is committed only after every hit of its batch is terminal.
//! The file store writes `<dir>/<name>.cursor` by writing a temporary file,
//! syncing it, and renaming it over the old one, so a crash leaves either
//! the old or the new cursor, never a torn one.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use ferry_protocol::Cursor;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ProgressError;

/// Persistence for committed cursors, keyed by pipeline name
pub trait ProgressStore: Send + Sync {
    fn load(&self, pipeline: &str) -> Result<Option<Cursor>, ProgressError>;

    /// Replace the stored cursor atomically
    fn save(&self, pipeline: &str, cursor: &Cursor) -> Result<(), ProgressError>;

    /// Forget the stored cursor; the next run starts from the beginning
    fn clear(&self, pipeline: &str) -> Result<(), ProgressError>;
}

/// On-disk cursor document
#[derive(Debug, Serialize, Deserialize)]
struct CursorFile {
    pipeline: String,
    cursor: Cursor,
    committed_at: DateTime<Utc>,
}

/// Cursor files in a directory
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    dir: PathBuf,
}

impl FileProgressStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cursor_path(&self, pipeline: &str) -> PathBuf {
        self.dir.join(format!("{}.cursor", pipeline))
    }

    fn temp_path(&self, pipeline: &str) -> PathBuf {
        self.dir.join(format!(".{}.cursor.tmp", pipeline))
    }
}

impl ProgressStore for FileProgressStore {
    fn load(&self, pipeline: &str) -> Result<Option<Cursor>, ProgressError> {
        let path = self.cursor_path(pipeline);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ProgressError::io(path, e)),
        };

        let file: CursorFile =
            serde_json::from_str(&contents).map_err(|e| ProgressError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        if file.pipeline != pipeline {
            return Err(ProgressError::Corrupt {
                path,
                reason: format!("cursor belongs to pipeline '{}'", file.pipeline),
            });
        }

        debug!(pipeline, cursor = %file.cursor, committed_at = %file.committed_at, "loaded cursor");
        Ok(Some(file.cursor))
    }

    fn save(&self, pipeline: &str, cursor: &Cursor) -> Result<(), ProgressError> {
        fs::create_dir_all(&self.dir).map_err(|e| ProgressError::io(&self.dir, e))?;

        let document = CursorFile {
            pipeline: pipeline.to_string(),
            cursor: cursor.clone(),
            committed_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&document).map_err(|e| ProgressError::Corrupt {
            path: self.cursor_path(pipeline),
            reason: e.to_string(),
        })?;

        let temp = self.temp_path(pipeline);
        let mut file = fs::File::create(&temp).map_err(|e| ProgressError::io(&temp, e))?;
        file.write_all(&bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| ProgressError::io(&temp, e))?;
        drop(file);

        let path = self.cursor_path(pipeline);
        fs::rename(&temp, &path).map_err(|e| ProgressError::io(&path, e))?;

        // Persist the rename itself
        #[cfg(unix)]
        if let Ok(dir) = fs::File::open(&self.dir) {
            let _ = dir.sync_all();
        }

        Ok(())
    }

    fn clear(&self, pipeline: &str) -> Result<(), ProgressError> {
        let path = self.cursor_path(pipeline);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProgressError::io(path, e)),
        }
    }
}

/// In-memory cursor store
///
/// Can be told to reject writes after a number of successful saves, which
/// simulates a crash at a commit boundary.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    cursors: Mutex<HashMap<String, Cursor>>,
    saves: AtomicU64,
    /// Saves allowed before writes fail (u64::MAX = unlimited)
    save_budget: AtomicU64,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self {
            save_budget: AtomicU64::new(u64::MAX),
            ..Default::default()
        }
    }

    /// Reject every save after `n` more successful ones
    pub fn fail_after(&self, n: u64) {
        self.save_budget
            .store(self.saves.load(Ordering::SeqCst) + n, Ordering::SeqCst);
    }

    /// Accept saves again
    pub fn heal(&self) {
        self.save_budget.store(u64::MAX, Ordering::SeqCst);
    }

    /// Successful saves so far
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn get(&self, pipeline: &str) -> Option<Cursor> {
        self.cursors.lock().get(pipeline).cloned()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&self, pipeline: &str) -> Result<Option<Cursor>, ProgressError> {
        Ok(self.get(pipeline))
    }

    fn save(&self, pipeline: &str, cursor: &Cursor) -> Result<(), ProgressError> {
        if self.saves.load(Ordering::SeqCst) >= self.save_budget.load(Ordering::SeqCst) {
            return Err(ProgressError::Rejected("simulated commit failure".into()));
        }
        self.cursors
            .lock()
            .insert(pipeline.to_string(), cursor.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self, pipeline: &str) -> Result<(), ProgressError> {
        self.cursors.lock().remove(pipeline);
        Ok(())
    }
}

/// Owner of one pipeline's committed cursor
pub struct ProgressTracker {
    store: Arc<dyn ProgressStore>,
    pipeline: String,
    committed: Option<Cursor>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn ProgressStore>, pipeline: impl Into<String>) -> Self {
        Self {
            store,
            pipeline: pipeline.into(),
            committed: None,
        }
    }

    /// Load the committed cursor, if any
    pub fn load(&mut self) -> Result<Option<Cursor>, ProgressError> {
        let cursor = self.store.load(&self.pipeline)?;
        if let Some(cursor) = &cursor {
            info!(pipeline = %self.pipeline, cursor = %cursor, "resuming from committed cursor");
        }
        self.committed = cursor.clone();
        Ok(cursor)
    }

    /// Persist `cursor` as committed
    ///
    /// The in-memory view only moves when the store accepted the write.
    pub fn commit(&mut self, cursor: &Cursor) -> Result<(), ProgressError> {
        if self.committed.as_ref() == Some(cursor) {
            return Ok(());
        }
        self.store.save(&self.pipeline, cursor)?;
        debug!(pipeline = %self.pipeline, cursor = %cursor, "cursor committed");
        self.committed = Some(cursor.clone());
        Ok(())
    }

    /// Last committed cursor
    #[inline]
    pub fn committed(&self) -> Option<&Cursor> {
        self.committed.as_ref()
    }

    #[inline]
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }
}

#[cfg(test)]
#[path = "progress_test.rs"]
mod tests;
