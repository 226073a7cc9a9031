//! Persisted per-task baselines, the comparison point for change detection.
//!
//! Each task's last successfully extracted content is stored as a single
//! file keyed by a SHA-256 hash of the task name, so any task name maps to
//! a stable, filesystem-safe path. Absence of a record is distinct from a
//! record holding an empty string; [`BaselineStore::exists`] reports pure
//! record existence.
//!
//! Writes are whole-value replacements. Atomicity against concurrent
//! mutation is provided by the orchestrator's run-serialization gate, not
//! by this store.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{MonitorError, Result};

/// Directory-backed baseline storage.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    dir: PathBuf,
}

impl BaselineStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| MonitorError::Persistence(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// Retrieve the last persisted content for a task.
    ///
    /// Returns `None` when no record exists. Read errors are logged and
    /// also degrade to `None` so a corrupt record behaves like a first run.
    pub fn get(&self, task_name: &str) -> Option<String> {
        let path = self.record_path(task_name);
        if !path.exists() {
            return None;
        }
        match fs::read_to_string(&path) {
            Ok(content) => {
                tracing::debug!(task = %task_name, bytes = content.len(), "baseline read");
                Some(content)
            }
            Err(err) => {
                tracing::warn!(task = %task_name, error = %err, "baseline read failed");
                None
            }
        }
    }

    /// Persist content for a task, replacing any previous record.
    pub fn put(&self, task_name: &str, content: &str) -> Result<()> {
        let path = self.record_path(task_name);
        fs::write(&path, content).map_err(|e| {
            MonitorError::Persistence(format!("write baseline for '{task_name}': {e}"))
        })?;
        tracing::debug!(task = %task_name, bytes = content.len(), "baseline written");
        Ok(())
    }

    /// Whether a record exists for this task.
    ///
    /// An empty record still exists; only a missing file reports `false`.
    pub fn exists(&self, task_name: &str) -> bool {
        self.record_path(task_name).exists()
    }

    /// Remove a task's record, if present.
    pub fn remove(&self, task_name: &str) -> Result<()> {
        let path = self.record_path(task_name);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                MonitorError::Persistence(format!("remove baseline for '{task_name}': {e}"))
            })?;
        }
        Ok(())
    }

    /// Stable, filesystem-safe record path for a task name.
    fn record_path(&self, task_name: &str) -> PathBuf {
        let digest = Sha256::digest(task_name.as_bytes());
        self.dir.join(format!("{}.txt", hex::encode(digest)))
    }

    /// The directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
