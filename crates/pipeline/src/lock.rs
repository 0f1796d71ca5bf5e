//! Single-writer lock per pipeline
//!
//! `<dir>/<name>.lock` is created exclusively when a run starts and removed
//! when the lock is dropped. A second run of the same pipeline fails fast
//! instead of diverging the committed cursor.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

/// Held for the duration of one run
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn path_for(dir: &Path, pipeline: &str) -> PathBuf {
        dir.join(format!("{}.lock", pipeline))
    }

    /// Take the lock, failing if another run holds it
    ///
    /// A lock left behind by a crashed run must be removed by hand (or with
    /// `ferry cursor unlock`).
    pub fn acquire(dir: &Path, pipeline: &str) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|source| PipelineError::LockIo {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = Self::path_for(dir, pipeline);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(PipelineError::Locked {
                    name: pipeline.to_string(),
                    path,
                });
            }
            Err(source) => return Err(PipelineError::LockIo { path, source }),
        };

        let owner = format!("pid={} started_at={}\n", std::process::id(), Utc::now().to_rfc3339());
        if let Err(source) = file.write_all(owner.as_bytes()) {
            let _ = fs::remove_file(&path);
            return Err(PipelineError::LockIo { path, source });
        }

        debug!(path = %path.display(), "run lock acquired");
        Ok(Self { path })
    }

    /// Remove a lock left behind by a crashed run
    pub fn break_stale(dir: &Path, pipeline: &str) -> Result<bool> {
        let path = Self::path_for(dir, pipeline);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(PipelineError::LockIo { path, source }),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove run lock");
        }
    }
}
