//! Repository for the append-only `job_metrics` table.

use sqlx::PgPool;

use crate::models::job_metric::{JobMetric, NewJobMetric};

/// Column list for `job_metrics` queries.
const COLUMNS: &str = "\
    id, job_id, file_size_mb, processing_time_secs, success, error_type, \
    model_name, stems_count, gpu_used, max_memory_mb, recorded_at";

/// Records per-job performance metrics. Rows are never updated or read on
/// the request path.
pub struct JobMetricRepo;

impl JobMetricRepo {
    /// Append one metric row for a finished job.
    pub async fn record(pool: &PgPool, input: &NewJobMetric) -> Result<JobMetric, sqlx::Error> {
        let query = format!(
            "INSERT INTO job_metrics \
                 (job_id, file_size_mb, processing_time_secs, success, error_type, \
                  model_name, stems_count, gpu_used, max_memory_mb) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobMetric>(&query)
            .bind(input.job_id)
            .bind(input.file_size_mb)
            .bind(input.processing_time_secs)
            .bind(input.success)
            .bind(&input.error_type)
            .bind(&input.model_name)
            .bind(input.stems_count)
            .bind(input.gpu_used)
            .bind(input.max_memory_mb)
            .fetch_one(pool)
            .await
    }
}
