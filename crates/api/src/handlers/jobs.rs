//! Handlers for job submission and status queries.

use std::path::Path;
use std::sync::Arc;

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use stemd_core::error::CoreError;
use stemd_core::quota::QuotaDecision;
use stemd_core::types::{JobId, Timestamp};
use stemd_db::models::job::{Job, NewJob};
use stemd_db::models::status::JobStatus;
use stemd_db::registry::QueueSnapshot;
use stemd_db::repositories::UserQuotaRepo;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::Identity;
use crate::state::AppState;

/// Default page size for job listings.
const DEFAULT_LIST_LIMIT: i64 = 50;

/// Request body for `POST /separate`.
#[derive(Debug, Deserialize, Validate)]
pub struct SeparationRequest {
    /// Path to the input audio file (as returned by `POST /upload`).
    #[validate(length(min = 1, message = "input_path must not be empty"))]
    pub input_path: String,
    /// Where the separation tool writes its output tree. Defaults to the
    /// server's configured output directory.
    pub output_dir: Option<String>,
    /// Number of stems to produce (2 = vocals/accompaniment).
    #[validate(range(min = 2, max = 6, message = "stems must be between 2 and 6"))]
    pub stems: Option<i32>,
}

/// Response body for `POST /separate`.
#[derive(Debug, Serialize)]
pub struct SeparationResponse {
    pub job_id: JobId,
}

/// One job as reported by the status and listing endpoints.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job_id: JobId,
    pub status: &'static str,
    pub progress: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stem name -> output path. Present once the job has completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stems: Option<serde_json::Value>,
    /// Queue position details. Present only while the job is queued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueSnapshot>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl JobResponse {
    fn from_job(job: &Job, queue: Option<QueueSnapshot>) -> Self {
        let status = job.status();
        Self {
            job_id: job.id,
            status: status.label(),
            progress: job.progress,
            message: job.message.clone(),
            error: job.error.clone(),
            stems: if status == JobStatus::Completed {
                job.stem_files.clone()
            } else {
                None
            },
            queue,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// POST /separate -- admit a separation job for an already-uploaded file.
///
/// Admission order: request validation, then the per-user quota check
/// (size before rate limits), then job creation. Counters are only
/// consumed for admitted jobs.
pub async fn start_separation(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<SeparationRequest>,
) -> AppResult<(StatusCode, Json<SeparationResponse>)> {
    request
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;

    let stems = request.stems.unwrap_or(2);
    let output_dir = request
        .output_dir
        .unwrap_or_else(|| state.config.output_dir.to_string_lossy().into_owned());

    let metadata = tokio::fs::metadata(&request.input_path).await.map_err(|_| {
        AppError::BadRequest(format!("Input file not found: {}", request.input_path))
    })?;
    let file_size = metadata.len();
    let file_size_mb = file_size as f64 / (1024.0 * 1024.0);

    let decision = UserQuotaRepo::check(&state.pool, &identity.user_id, file_size_mb).await?;
    if let QuotaDecision::Rejected {
        reason,
        limit,
        current,
    } = decision
    {
        return Err(CoreError::QuotaExceeded {
            reason,
            limit,
            current,
        }
        .into());
    }

    let original_filename = Path::new(&request.input_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    let job = state
        .registry
        .create(&NewJob {
            id: Uuid::new_v4(),
            user_id: identity.user_id.clone(),
            input_path: request.input_path,
            output_dir,
            stems,
            original_filename,
            file_size: Some(file_size as i64),
            ip_address: identity.ip_address.clone(),
        })
        .await?;

    UserQuotaRepo::record_usage(&state.pool, &identity.user_id).await?;

    tokio::spawn(Arc::clone(&state.runner).run(job.id));
    tracing::info!(job_id = %job.id, user_id = %identity.user_id, stems, "Job admitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(SeparationResponse { job_id: job.id }),
    ))
}

/// GET /status/{job_id} -- current state of one job.
pub async fn get_status(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<JobId>,
) -> AppResult<Json<JobResponse>> {
    let job = state
        .registry
        .get(job_id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "job",
            id: job_id.to_string(),
        })?;

    let queue = if job.status() == JobStatus::Queued {
        Some(
            state
                .registry
                .queue_snapshot(
                    state.config.avg_job_secs,
                    state.config.processing_remainder_secs,
                )
                .await?,
        )
    } else {
        None
    };

    Ok(Json(JobResponse::from_job(&job, queue)))
}

/// Query parameters for `GET /jobs`.
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub limit: Option<i64>,
}

/// GET /jobs -- the requesting identity's jobs, newest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<ListJobsParams>,
) -> AppResult<Json<Vec<JobResponse>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let jobs = state.registry.list_for_user(&identity.user_id, limit).await?;

    Ok(Json(
        jobs.iter().map(|job| JobResponse::from_job(job, None)).collect(),
    ))
}
