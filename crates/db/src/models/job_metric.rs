//! Append-only per-job performance records.
//!
//! Written once when a job reaches a terminal state, never mutated, and
//! kept off the request path (offline analysis only).

use sqlx::FromRow;
use stemd_core::types::{DbId, JobId, Timestamp};

/// A row from the `job_metrics` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobMetric {
    pub id: DbId,
    pub job_id: JobId,
    pub file_size_mb: Option<f64>,
    pub processing_time_secs: Option<f64>,
    pub success: bool,
    pub error_type: Option<String>,
    pub model_name: String,
    pub stems_count: i32,
    pub gpu_used: Option<bool>,
    pub max_memory_mb: Option<i64>,
    pub recorded_at: Timestamp,
}

/// Fields for recording a new metric.
#[derive(Debug, Clone)]
pub struct NewJobMetric {
    pub job_id: JobId,
    pub file_size_mb: Option<f64>,
    pub processing_time_secs: Option<f64>,
    pub success: bool,
    pub error_type: Option<String>,
    pub model_name: String,
    pub stems_count: i32,
    pub gpu_used: Option<bool>,
    pub max_memory_mb: Option<i64>,
}
