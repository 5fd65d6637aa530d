//! Per-user rate-limit state.

use sqlx::FromRow;
use stemd_core::quota::QuotaState;
use stemd_core::types::{DbId, Timestamp};

/// A row from the `user_quotas` table.
///
/// `user_id` is the authenticated subject, or `anon:<ip>` for
/// unauthenticated callers. Counters are fixed-window: each window start
/// is stored alongside its counter and reset when the window expires.
#[derive(Debug, Clone, FromRow)]
pub struct UserQuota {
    pub id: DbId,
    pub user_id: String,

    pub jobs_per_hour: i32,
    pub jobs_per_day: i32,
    pub max_file_size_mb: i32,

    pub jobs_last_hour: i32,
    pub jobs_last_day: i32,
    pub hour_window_started_at: Timestamp,
    pub day_window_started_at: Timestamp,
    pub last_job_at: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UserQuota {
    /// Snapshot used by the pure admission decision in `stemd-core`.
    pub fn state(&self) -> QuotaState {
        QuotaState {
            jobs_per_hour: self.jobs_per_hour,
            jobs_per_day: self.jobs_per_day,
            max_file_size_mb: self.max_file_size_mb,
            jobs_last_hour: self.jobs_last_hour,
            jobs_last_day: self.jobs_last_day,
        }
    }
}
