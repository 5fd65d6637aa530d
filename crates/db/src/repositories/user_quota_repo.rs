//! Repository for the `user_quotas` table.
//!
//! The admission decision itself is pure (`stemd_core::quota::evaluate`);
//! this repo owns the stateful parts: lazy row creation, per-user
//! serialization via `SELECT ... FOR UPDATE`, fixed-window counter resets,
//! and usage increments.

use chrono::Utc;
use sqlx::PgPool;
use stemd_core::quota::{evaluate, QuotaDecision};

use crate::models::user_quota::UserQuota;

/// Column list for `user_quotas` queries.
const COLUMNS: &str = "\
    id, user_id, jobs_per_hour, jobs_per_day, max_file_size_mb, \
    jobs_last_hour, jobs_last_day, hour_window_started_at, \
    day_window_started_at, last_job_at, created_at, updated_at";

/// Fixed hourly counter window, in seconds.
const HOUR_WINDOW_SECS: i64 = 3600;

/// Fixed daily counter window, in seconds.
const DAY_WINDOW_SECS: i64 = 86_400;

/// Manages per-user admission quotas.
pub struct UserQuotaRepo;

impl UserQuotaRepo {
    /// Fetch a user's quota row, creating one with default limits on first
    /// sight.
    pub async fn get_or_create(pool: &PgPool, user_id: &str) -> Result<UserQuota, sqlx::Error> {
        sqlx::query("INSERT INTO user_quotas (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(pool)
            .await?;

        let query = format!("SELECT {COLUMNS} FROM user_quotas WHERE user_id = $1");
        sqlx::query_as::<_, UserQuota>(&query)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Check whether `user_id` may submit a job with the given input size.
    ///
    /// The row is locked for the duration of the check so concurrent
    /// admissions for the same user cannot interleave their
    /// read-modify-write cycles. Expired counter windows are reset before
    /// the limits are evaluated. Counters are NOT incremented here; call
    /// [`UserQuotaRepo::record_usage`] once the job has actually been
    /// created.
    pub async fn check(
        pool: &PgPool,
        user_id: &str,
        requested_file_size_mb: f64,
    ) -> Result<QuotaDecision, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("INSERT INTO user_quotas (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let query = format!("SELECT {COLUMNS} FROM user_quotas WHERE user_id = $1 FOR UPDATE");
        let mut quota = sqlx::query_as::<_, UserQuota>(&query)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        let now = Utc::now();

        if (now - quota.hour_window_started_at).num_seconds() >= HOUR_WINDOW_SECS {
            sqlx::query(
                "UPDATE user_quotas \
                 SET jobs_last_hour = 0, hour_window_started_at = $2, updated_at = $2 \
                 WHERE user_id = $1",
            )
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            quota.jobs_last_hour = 0;
        }

        if (now - quota.day_window_started_at).num_seconds() >= DAY_WINDOW_SECS {
            sqlx::query(
                "UPDATE user_quotas \
                 SET jobs_last_day = 0, day_window_started_at = $2, updated_at = $2 \
                 WHERE user_id = $1",
            )
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            quota.jobs_last_day = 0;
        }

        let decision = evaluate(&quota.state(), requested_file_size_mb);
        tx.commit().await?;

        Ok(decision)
    }

    /// Increment both window counters by exactly 1 and stamp the last-job
    /// time. Called once per admitted job, after the job record exists.
    pub async fn record_usage(pool: &PgPool, user_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE user_quotas \
             SET jobs_last_hour = jobs_last_hour + 1, \
                 jobs_last_day = jobs_last_day + 1, \
                 last_job_at = NOW(), updated_at = NOW() \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
