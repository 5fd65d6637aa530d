pub mod job;
pub mod job_metric;
pub mod status;
pub mod user_quota;
