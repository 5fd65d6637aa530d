//! Repository for the `jobs` table.
//!
//! Status transitions stamp processing timestamps here, in one place:
//! the first transition into `processing` sets `processing_started_at`;
//! any transition into a terminal state sets `processing_completed_at`
//! and derives the duration.

use chrono::Utc;
use sqlx::PgPool;
use stemd_core::types::JobId;

use crate::models::job::{Job, JobUpdate, NewJob};
use crate::models::status::JobStatus;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, status_id, progress, message, error, \
    input_path, output_dir, stems, original_filename, file_size, \
    user_id, ip_address, stem_files, \
    processing_started_at, processing_completed_at, processing_duration_secs, \
    created_at, updated_at, auto_cleanup_at, files_deleted";

/// Maximum page size for per-user job listing.
const MAX_LIMIT: i64 = 100;

/// Provides CRUD operations for separation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new job with status `queued` and an auto-cleanup deadline
    /// of `auto_cleanup_days` from now. A duplicate id violates the
    /// primary key and surfaces as a database error.
    pub async fn create(
        pool: &PgPool,
        input: &NewJob,
        auto_cleanup_days: i64,
    ) -> Result<Job, sqlx::Error> {
        let auto_cleanup_at = Utc::now() + chrono::Duration::days(auto_cleanup_days);
        let query = format!(
            "INSERT INTO jobs \
                 (id, status_id, user_id, input_path, output_dir, stems, \
                  original_filename, file_size, ip_address, message, auto_cleanup_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(input.id)
            .bind(JobStatus::Queued.id())
            .bind(&input.user_id)
            .bind(&input.input_path)
            .bind(&input.output_dir)
            .bind(input.stems)
            .bind(&input.original_filename)
            .bind(input.file_size)
            .bind(&input.ip_address)
            .bind("Job added to queue")
            .bind(auto_cleanup_at)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply a partial update and return the new row, or `None` if the job
    /// does not exist.
    ///
    /// The row is read first so timestamp stamping can be derived from the
    /// transition: `processing_started_at` only on the first entry into
    /// `processing`, completion fields only on entry into a terminal state.
    pub async fn update(
        pool: &PgPool,
        id: JobId,
        update: &JobUpdate,
    ) -> Result<Option<Job>, sqlx::Error> {
        let Some(current) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        let mut started_at = current.processing_started_at;
        let mut completed_at = current.processing_completed_at;
        let mut duration_secs = current.processing_duration_secs;

        if let Some(status) = update.status {
            if status == JobStatus::Processing && started_at.is_none() {
                started_at = Some(now);
            } else if status.is_terminal() && completed_at.is_none() {
                completed_at = Some(now);
                if let Some(started) = started_at {
                    duration_secs = Some((now - started).num_milliseconds() as f64 / 1000.0);
                }
            }
        }

        let status_id = update.status.map(JobStatus::id).unwrap_or(current.status_id);
        let progress = update.progress.unwrap_or(current.progress);
        let message = update.message.clone().or(current.message);
        let error = update.error.clone().or(current.error);
        let stem_files = update.stem_files.clone().or(current.stem_files);

        let query = format!(
            "UPDATE jobs \
             SET status_id = $2, progress = $3, message = $4, error = $5, \
                 stem_files = $6, processing_started_at = $7, \
                 processing_completed_at = $8, processing_duration_secs = $9, \
                 updated_at = $10 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(status_id)
            .bind(progress)
            .bind(&message)
            .bind(&error)
            .bind(&stem_files)
            .bind(started_at)
            .bind(completed_at)
            .bind(duration_secs)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// List a user's jobs, newest first, bounded by `limit` (capped).
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE user_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(user_id)
            .bind(limit.clamp(1, MAX_LIMIT))
            .fetch_all(pool)
            .await
    }

    /// Count jobs currently in the given status.
    pub async fn count_by_status(pool: &PgPool, status: JobStatus) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE status_id = $1")
            .bind(status.id())
            .fetch_one(pool)
            .await
    }

    /// Jobs older than `cutoff` whose files have not been deleted yet.
    /// Used by the cleanup sweeper to find artifact-deletion candidates.
    pub async fn find_stale(
        pool: &PgPool,
        cutoff: stemd_core::types::Timestamp,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE created_at < $1 AND files_deleted = FALSE"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Mark a job's on-disk artifacts as deleted.
    pub async fn mark_files_deleted(pool: &PgPool, id: JobId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE jobs SET files_deleted = TRUE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete rows that are both marked `files_deleted` and older than
    /// `cutoff`. Returns the deleted ids so cache and snapshot tiers can
    /// be evicted.
    pub async fn delete_older_than(
        pool: &PgPool,
        cutoff: stemd_core::types::Timestamp,
    ) -> Result<Vec<JobId>, sqlx::Error> {
        sqlx::query_scalar::<_, JobId>(
            "DELETE FROM jobs \
             WHERE files_deleted = TRUE AND created_at < $1 \
             RETURNING id",
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await
    }

    /// Mark every non-terminal job as `error`. Runs once at startup:
    /// in-flight tasks do not survive a process restart, so anything still
    /// `queued`, `waiting`, or `processing` can never finish.
    pub async fn fail_unfinished(pool: &PgPool, error: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $1, error = $2, \
                 processing_completed_at = NOW(), updated_at = NOW() \
             WHERE status_id IN ($3, $4, $5)",
        )
        .bind(JobStatus::Error.id())
        .bind(error)
        .bind(JobStatus::Queued.id())
        .bind(JobStatus::Waiting.id())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Re-insert a full job snapshot recovered from the fallback store.
    /// Existing rows win: the durable store is authoritative.
    pub async fn insert_snapshot(pool: &PgPool, job: &Job) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO jobs \
                 (id, status_id, progress, message, error, \
                  input_path, output_dir, stems, original_filename, file_size, \
                  user_id, ip_address, stem_files, \
                  processing_started_at, processing_completed_at, processing_duration_secs, \
                  created_at, updated_at, auto_cleanup_at, files_deleted) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
                     $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(job.id)
        .bind(job.status_id)
        .bind(job.progress)
        .bind(&job.message)
        .bind(&job.error)
        .bind(&job.input_path)
        .bind(&job.output_dir)
        .bind(job.stems)
        .bind(&job.original_filename)
        .bind(job.file_size)
        .bind(&job.user_id)
        .bind(&job.ip_address)
        .bind(&job.stem_files)
        .bind(job.processing_started_at)
        .bind(job.processing_completed_at)
        .bind(job.processing_duration_secs)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.auto_cleanup_at)
        .bind(job.files_deleted)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
