pub mod job_metric_repo;
pub mod job_repo;
pub mod user_quota_repo;

pub use job_metric_repo::JobMetricRepo;
pub use job_repo::JobRepo;
pub use user_quota_repo::UserQuotaRepo;
