//! Job entity model and DTOs for the separation job lifecycle.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stemd_core::types::{JobId, Timestamp};

use super::status::{JobStatus, StatusId};

/// A row from the `jobs` table.
///
/// Also the exact shape persisted to the on-disk fallback store, so it
/// derives `Serialize`/`Deserialize` and `PartialEq` for round-trip
/// verification after a restart.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status_id: StatusId,
    /// 0-100. Applied as parsed from the tool's output; late low values
    /// are accepted as-is (no monotonicity clamp).
    pub progress: i16,
    pub message: Option<String>,
    pub error: Option<String>,

    pub input_path: String,
    pub output_dir: String,
    pub stems: i32,
    pub original_filename: Option<String>,
    pub file_size: Option<i64>,

    pub user_id: String,
    pub ip_address: Option<String>,

    /// Stem name -> output file path. Non-empty iff the job completed.
    pub stem_files: Option<serde_json::Value>,

    pub processing_started_at: Option<Timestamp>,
    pub processing_completed_at: Option<Timestamp>,
    pub processing_duration_secs: Option<f64>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,

    pub auto_cleanup_at: Option<Timestamp>,
    pub files_deleted: bool,
}

impl Job {
    /// Typed view of the raw `status_id` column.
    ///
    /// An unknown id is treated as `Error`: it can only appear if the row
    /// was written by a newer schema revision.
    pub fn status(&self) -> JobStatus {
        JobStatus::from_id(self.status_id).unwrap_or(JobStatus::Error)
    }
}

/// Fields required to create a new job record (status starts at `queued`).
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: JobId,
    pub user_id: String,
    pub input_path: String,
    pub output_dir: String,
    pub stems: i32,
    pub original_filename: Option<String>,
    pub file_size: Option<i64>,
    pub ip_address: Option<String>,
}

/// Partial update applied through the registry. Only provided fields
/// change; stamping of processing timestamps is derived from the status
/// transition, not supplied by callers.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<i16>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub stem_files: Option<serde_json::Value>,
}
