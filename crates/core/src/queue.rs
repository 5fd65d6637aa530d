//! Queue-wait estimation.
//!
//! The per-job time is a static configured estimate, not measured from
//! metric history. The fixed remainder covers the tail of the job that is
//! currently holding the accelerator, if any.

/// Default estimated duration of one separation job, in seconds.
pub const DEFAULT_AVG_JOB_SECS: i64 = 240;

/// Default estimate for the remaining time of an in-flight job, in seconds.
pub const DEFAULT_PROCESSING_REMAINDER_SECS: i64 = 60;

/// Estimate how long a newly queued job will wait before processing starts.
pub fn estimated_wait_secs(
    jobs_ahead: i64,
    currently_processing: i64,
    avg_job_secs: i64,
    remainder_secs: i64,
) -> i64 {
    let remainder = if currently_processing > 0 {
        remainder_secs
    } else {
        0
    };
    jobs_ahead * avg_job_secs + remainder
}
