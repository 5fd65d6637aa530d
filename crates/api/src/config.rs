use std::path::PathBuf;

use stemd_core::quota::DEFAULT_MAX_FILE_SIZE_MB;
use stemd_core::queue::{DEFAULT_AVG_JOB_SECS, DEFAULT_PROCESSING_REMAINDER_SECS};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,

    /// Directory where uploaded inputs are stored.
    pub upload_dir: PathBuf,
    /// Directory where the separation tool writes its output tree.
    pub output_dir: PathBuf,
    /// Directory for on-disk job snapshots (crash recovery).
    pub snapshot_dir: PathBuf,
    /// Hard cap on a single upload, in megabytes. Per-user quotas may be
    /// tighter but never looser than this.
    pub max_upload_size_mb: u64,

    /// Assumed average job duration for queue wait estimates, in seconds.
    pub avg_job_secs: i64,
    /// Extra wait added when a job is currently on the device, in seconds.
    pub processing_remainder_secs: i64,
    /// How long a job may wait for device access before failing.
    /// `None` (unset) means wait indefinitely.
    pub gate_timeout_secs: Option<u64>,

    /// How often the cleanup sweeper runs, in seconds (default: daily).
    pub cleanup_interval_secs: u64,
    /// Days a job's files and record are retained (default: `7`).
    pub retention_days: i64,

    /// Separation tool binary (default: `demucs`).
    pub separator_binary: String,
    /// Separation model name (default: `htdemucs`).
    pub separator_model: String,
    /// Segment length passed to the tool, in seconds (default: `10`).
    pub separator_segment: u32,
    /// Prediction shifts passed to the tool (default: `1`).
    pub separator_shifts: u32,

    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default      |
    /// |-----------------------------|--------------|
    /// | `HOST`                      | `0.0.0.0`    |
    /// | `PORT`                      | `8000`       |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`         |
    /// | `UPLOAD_DIR`                | `uploads`    |
    /// | `OUTPUT_DIR`                | `separated`  |
    /// | `SNAPSHOT_DIR`              | `job_snapshots` |
    /// | `MAX_UPLOAD_SIZE_MB`        | `25`         |
    /// | `AVG_JOB_SECS`              | `240`        |
    /// | `PROCESSING_REMAINDER_SECS` | `60`         |
    /// | `GATE_TIMEOUT_SECS`         | unset (wait indefinitely) |
    /// | `CLEANUP_INTERVAL_SECS`     | `86400`      |
    /// | `RETENTION_DAYS`            | `7`          |
    /// | `SEPARATOR_BINARY`          | `demucs`     |
    /// | `SEPARATOR_MODEL`           | `htdemucs`   |
    /// | `SEPARATOR_SEGMENT`         | `10`         |
    /// | `SEPARATOR_SHIFTS`          | `1`          |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let upload_dir = PathBuf::from(std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()));
        let output_dir =
            PathBuf::from(std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "separated".into()));
        let snapshot_dir = PathBuf::from(
            std::env::var("SNAPSHOT_DIR").unwrap_or_else(|_| "job_snapshots".into()),
        );

        let max_upload_size_mb: u64 = std::env::var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|_| DEFAULT_MAX_FILE_SIZE_MB.to_string())
            .parse()
            .expect("MAX_UPLOAD_SIZE_MB must be a valid u64");

        let avg_job_secs: i64 = std::env::var("AVG_JOB_SECS")
            .unwrap_or_else(|_| DEFAULT_AVG_JOB_SECS.to_string())
            .parse()
            .expect("AVG_JOB_SECS must be a valid i64");

        let processing_remainder_secs: i64 = std::env::var("PROCESSING_REMAINDER_SECS")
            .unwrap_or_else(|_| DEFAULT_PROCESSING_REMAINDER_SECS.to_string())
            .parse()
            .expect("PROCESSING_REMAINDER_SECS must be a valid i64");

        let gate_timeout_secs: Option<u64> = std::env::var("GATE_TIMEOUT_SECS")
            .ok()
            .map(|v| v.parse().expect("GATE_TIMEOUT_SECS must be a valid u64"));

        let cleanup_interval_secs: u64 = std::env::var("CLEANUP_INTERVAL_SECS")
            .unwrap_or_else(|_| "86400".into())
            .parse()
            .expect("CLEANUP_INTERVAL_SECS must be a valid u64");

        let retention_days: i64 = std::env::var("RETENTION_DAYS")
            .unwrap_or_else(|_| "7".into())
            .parse()
            .expect("RETENTION_DAYS must be a valid i64");

        let separator_binary =
            std::env::var("SEPARATOR_BINARY").unwrap_or_else(|_| "demucs".into());
        let separator_model =
            std::env::var("SEPARATOR_MODEL").unwrap_or_else(|_| "htdemucs".into());

        let separator_segment: u32 = std::env::var("SEPARATOR_SEGMENT")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("SEPARATOR_SEGMENT must be a valid u32");

        let separator_shifts: u32 = std::env::var("SEPARATOR_SHIFTS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("SEPARATOR_SHIFTS must be a valid u32");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            upload_dir,
            output_dir,
            snapshot_dir,
            max_upload_size_mb,
            avg_job_secs,
            processing_remainder_secs,
            gate_timeout_secs,
            cleanup_interval_secs,
            retention_days,
            separator_binary,
            separator_model,
            separator_segment,
            separator_shifts,
            jwt,
        }
    }
}
