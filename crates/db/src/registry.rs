//! Write-through job registry over three tiers.
//!
//! The database is authoritative. Every mutation also updates an in-memory
//! cache (fast status reads) and rewrites an on-disk JSON snapshot (crash
//! recovery). Reads prefer the database and fall back tier by tier when it
//! is unavailable.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use stemd_core::queue::estimated_wait_secs;
use stemd_core::types::JobId;

use crate::fallback::{FallbackError, FallbackStore};
use crate::models::job::{Job, JobUpdate, NewJob};
use crate::models::status::JobStatus;
use crate::repositories::JobRepo;
use crate::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Fallback store error: {0}")]
    Fallback(#[from] FallbackError),

    #[error("Job {0} not found")]
    NotFound(JobId),
}

/// Point-in-time view of the queue for status responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub jobs_ahead: i64,
    pub currently_processing: bool,
    pub position: i64,
    pub estimated_wait_seconds: i64,
}

/// Shared handle over the three storage tiers.
#[derive(Clone)]
pub struct JobRegistry {
    pool: DbPool,
    cache: Arc<RwLock<HashMap<JobId, Job>>>,
    fallback: Arc<FallbackStore>,
    auto_cleanup_days: i64,
}

impl JobRegistry {
    pub fn new(pool: DbPool, fallback: FallbackStore, auto_cleanup_days: i64) -> Self {
        Self {
            pool,
            cache: Arc::new(RwLock::new(HashMap::new())),
            fallback: Arc::new(fallback),
            auto_cleanup_days,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn cache_put(&self, job: &Job) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(job.id, job.clone());
        }
    }

    fn cache_get(&self, id: JobId) -> Option<Job> {
        self.cache.read().ok()?.get(&id).cloned()
    }

    fn snapshot_write(&self, job: &Job) {
        // Snapshot writes are best-effort: the database already holds the
        // authoritative row.
        if let Err(e) = self.fallback.write(job) {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to write fallback snapshot");
        }
    }

    /// Create a job in all three tiers.
    pub async fn create(&self, input: &NewJob) -> Result<Job, RegistryError> {
        let job = JobRepo::create(&self.pool, input, self.auto_cleanup_days).await?;
        self.cache_put(&job);
        self.snapshot_write(&job);
        Ok(job)
    }

    /// Look up a job, preferring the database, then the cache, then the
    /// on-disk snapshot. A hit in a lower tier is promoted into the cache.
    pub async fn get(&self, id: JobId) -> Result<Option<Job>, RegistryError> {
        match JobRepo::find_by_id(&self.pool, id).await {
            Ok(Some(job)) => {
                self.cache_put(&job);
                return Ok(Some(job));
            }
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Database lookup failed, trying cache");
            }
        }

        if let Some(job) = self.cache_get(id) {
            return Ok(Some(job));
        }

        if let Some(job) = self.fallback.read(id)? {
            self.cache_put(&job);
            return Ok(Some(job));
        }

        Ok(None)
    }

    /// Apply a partial update, writing through to all tiers.
    pub async fn update(&self, id: JobId, update: &JobUpdate) -> Result<Job, RegistryError> {
        let job = JobRepo::update(&self.pool, id, update)
            .await?
            .ok_or(RegistryError::NotFound(id))?;
        self.cache_put(&job);
        self.snapshot_write(&job);
        Ok(job)
    }

    /// List a user's jobs, newest first.
    pub async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<Job>, RegistryError> {
        Ok(JobRepo::list_by_user(&self.pool, user_id, limit).await?)
    }

    /// Build the queue view reported on queued jobs: the total queued
    /// count (the polling job included), whether the GPU is busy, and the
    /// derived wait estimate.
    pub async fn queue_snapshot(
        &self,
        avg_job_secs: i64,
        remainder_secs: i64,
    ) -> Result<QueueSnapshot, RegistryError> {
        let jobs_ahead = JobRepo::count_by_status(&self.pool, JobStatus::Queued).await?;
        let processing = JobRepo::count_by_status(&self.pool, JobStatus::Processing).await?;

        Ok(QueueSnapshot {
            jobs_ahead,
            currently_processing: processing > 0,
            position: jobs_ahead,
            estimated_wait_seconds: estimated_wait_secs(
                jobs_ahead,
                processing,
                avg_job_secs,
                remainder_secs,
            ),
        })
    }

    /// Delete job rows past retention whose artifacts are already gone,
    /// evicting them from the cache and snapshot tiers as well. Returns
    /// the number of rows removed.
    pub async fn purge_older_than(
        &self,
        retention: chrono::Duration,
    ) -> Result<usize, RegistryError> {
        let cutoff = Utc::now() - retention;
        let ids = JobRepo::delete_older_than(&self.pool, cutoff).await?;

        if let Ok(mut cache) = self.cache.write() {
            for id in &ids {
                cache.remove(id);
            }
        }
        for id in &ids {
            if let Err(e) = self.fallback.remove(*id) {
                tracing::warn!(job_id = %id, error = %e, "Failed to remove fallback snapshot");
            }
        }

        Ok(ids.len())
    }

    /// Sweep stale snapshot files by age. Delegates to the fallback tier.
    pub fn purge_snapshots_older_than(&self, max_age: Duration) -> Result<usize, RegistryError> {
        Ok(self.fallback.purge_older_than(max_age)?)
    }

    /// Startup reconciliation. Snapshots missing from the database (a
    /// crash between tiers) are re-inserted, then every job still in a
    /// non-terminal state is failed: its task did not survive the restart.
    pub async fn recover(&self, restart_error: &str) -> Result<RecoveryReport, RegistryError> {
        let mut restored = 0;
        for job in self.fallback.snapshots()? {
            if JobRepo::insert_snapshot(&self.pool, &job).await? {
                restored += 1;
            }
        }

        let failed = JobRepo::fail_unfinished(&self.pool, restart_error).await?;

        Ok(RecoveryReport { restored, failed })
    }
}

/// What startup recovery did, for the boot log.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryReport {
    pub restored: usize,
    pub failed: u64,
}
