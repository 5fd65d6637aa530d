//! Per-user admission control decisions.
//!
//! Pure functions only: the database side (row locking, lazy creation,
//! window resets) lives in `stemd-db::repositories::UserQuotaRepo`. Keeping
//! the decision itself here makes the fixed evaluation order testable
//! without a database.

use std::fmt;

/// Default number of jobs a user may submit per hour.
pub const DEFAULT_JOBS_PER_HOUR: i32 = 5;

/// Default number of jobs a user may submit per day.
pub const DEFAULT_JOBS_PER_DAY: i32 = 20;

/// Default maximum input file size in megabytes.
pub const DEFAULT_MAX_FILE_SIZE_MB: i32 = 25;

/// Machine-readable rejection reason, in fixed evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaReason {
    FileTooLarge,
    HourlyLimit,
    DailyLimit,
}

impl QuotaReason {
    /// Wire format used in error responses.
    pub fn as_str(self) -> &'static str {
        match self {
            QuotaReason::FileTooLarge => "FILE_TOO_LARGE",
            QuotaReason::HourlyLimit => "HOURLY_LIMIT",
            QuotaReason::DailyLimit => "DAILY_LIMIT",
        }
    }
}

impl fmt::Display for QuotaReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a user's limits and current-window counters.
#[derive(Debug, Clone)]
pub struct QuotaState {
    pub jobs_per_hour: i32,
    pub jobs_per_day: i32,
    pub max_file_size_mb: i32,
    pub jobs_last_hour: i32,
    pub jobs_last_day: i32,
}

/// Outcome of a quota check.
#[derive(Debug, Clone, PartialEq)]
pub enum QuotaDecision {
    Admitted,
    Rejected {
        reason: QuotaReason,
        limit: i64,
        current: i64,
    },
}

/// Evaluate an admission request against a quota snapshot.
///
/// Rules are checked in a fixed order and the first violation wins:
/// file size, then hourly counter, then daily counter. The size rule is
/// stateless, so an oversized request is rejected before any counter is
/// even looked at and never consumes a rate-limit slot.
pub fn evaluate(state: &QuotaState, requested_file_size_mb: f64) -> QuotaDecision {
    if requested_file_size_mb > state.max_file_size_mb as f64 {
        return QuotaDecision::Rejected {
            reason: QuotaReason::FileTooLarge,
            limit: state.max_file_size_mb as i64,
            current: requested_file_size_mb.ceil() as i64,
        };
    }

    if state.jobs_last_hour >= state.jobs_per_hour {
        return QuotaDecision::Rejected {
            reason: QuotaReason::HourlyLimit,
            limit: state.jobs_per_hour as i64,
            current: state.jobs_last_hour as i64,
        };
    }

    if state.jobs_last_day >= state.jobs_per_day {
        return QuotaDecision::Rejected {
            reason: QuotaReason::DailyLimit,
            limit: state.jobs_per_day as i64,
            current: state.jobs_last_day as i64,
        };
    }

    QuotaDecision::Admitted
}
