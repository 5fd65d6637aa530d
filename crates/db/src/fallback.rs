//! On-disk fallback store: one JSON snapshot per job id.
//!
//! Snapshots are rewritten wholesale on every registry update and exist
//! for crash recovery only; the durable store stays authoritative. Writes
//! here are small and synchronous.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use stemd_core::types::JobId;

use crate::models::job::Job;

#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("Fallback store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Fallback snapshot is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Directory of `<job_id>.json` snapshots.
#[derive(Debug)]
pub struct FallbackStore {
    dir: PathBuf,
}

impl FallbackStore {
    /// Open (and create if needed) the snapshot directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, FallbackError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: JobId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Rewrite the snapshot for one job.
    pub fn write(&self, job: &Job) -> Result<(), FallbackError> {
        let bytes = serde_json::to_vec(job)?;
        fs::write(self.path_for(job.id), bytes)?;
        Ok(())
    }

    /// Load the snapshot for one job, or `None` if there is none.
    pub fn read(&self, id: JobId) -> Result<Option<Job>, FallbackError> {
        let path = self.path_for(id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the snapshot for one job; missing files are not an error.
    pub fn remove(&self, id: JobId) -> Result<(), FallbackError> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load every readable snapshot. Unparseable files are logged and
    /// skipped so one corrupt snapshot cannot block recovery of the rest.
    pub fn snapshots(&self) -> Result<Vec<Job>, FallbackError> {
        let mut jobs = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_snapshot(&path) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable fallback snapshot");
                }
            }
        }
        Ok(jobs)
    }

    /// Delete snapshot files whose modification time is older than
    /// `max_age`. Per-file failures are logged and do not stop the sweep.
    /// Returns the number of files removed.
    pub fn purge_older_than(&self, max_age: Duration) -> Result<usize, FallbackError> {
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|mtime| now.duration_since(mtime).ok())
                .is_some_and(|age| age >= max_age);

            if expired {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to remove stale snapshot");
                    }
                }
            }
        }

        Ok(removed)
    }
}

fn read_snapshot(path: &Path) -> Result<Job, FallbackError> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
