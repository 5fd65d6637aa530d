//! Drives an admitted job through its lifecycle:
//! queued -> waiting -> processing -> completed | error.
//!
//! The runner is spawned as a detached task per job. It never returns an
//! error to its caller; every failure path ends with the job record in
//! the `error` state and a metric row written.

use std::path::Path;
use std::sync::Arc;

use stemd_db::models::job::{Job, JobUpdate};
use stemd_db::models::status::JobStatus;
use stemd_db::registry::JobRegistry;
use stemd_db::repositories::JobMetricRepo;
use stemd_db::models::job_metric::NewJobMetric;
use stemd_core::types::JobId;
use tokio::sync::mpsc;

use crate::gate::{DeviceGate, GateError};
use crate::progress;
use crate::separator::{Separator, SeparatorError};

const WAITING_MESSAGE: &str = "Waiting for GPU access...";
const PROCESSING_MESSAGE: &str = "Separating stems...";
const COMPLETED_MESSAGE: &str = "Separation complete.";

/// Executes separation jobs against the shared device gate.
#[derive(Clone)]
pub struct JobRunner {
    registry: JobRegistry,
    gate: DeviceGate,
    separator: Separator,
}

impl JobRunner {
    pub fn new(registry: JobRegistry, gate: DeviceGate, separator: Separator) -> Self {
        Self {
            registry,
            gate,
            separator,
        }
    }

    pub fn gate(&self) -> &DeviceGate {
        &self.gate
    }

    /// Run one job to a terminal state. Infallible from the caller's
    /// perspective; failures are recorded on the job itself.
    pub async fn run(self: Arc<Self>, job_id: JobId) {
        let job = match self.registry.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::error!(%job_id, "Runner started for unknown job");
                return;
            }
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Failed to load job for processing");
                return;
            }
        };

        if let Err(e) = self.process(&job).await {
            tracing::error!(%job_id, error = %e, "Job failed");
            self.fail(&job, &e).await;
        }
    }

    async fn process(&self, job: &Job) -> Result<(), RunError> {
        self.registry
            .update(
                job.id,
                &JobUpdate {
                    status: Some(JobStatus::Waiting),
                    message: Some(WAITING_MESSAGE.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        // Held until the end of this function; released on every exit path.
        let _guard = self.gate.acquire().await?;

        self.registry
            .update(
                job.id,
                &JobUpdate {
                    status: Some(JobStatus::Processing),
                    message: Some(PROCESSING_MESSAGE.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        let (progress_tx, mut progress_rx) = mpsc::channel::<i16>(32);
        let progress_task = {
            let registry = self.registry.clone();
            let job_id = job.id;
            tokio::spawn(async move {
                while let Some(value) = progress_rx.recv().await {
                    let update = JobUpdate {
                        progress: Some(value),
                        message: Some(progress::message_for(value)),
                        ..Default::default()
                    };
                    if let Err(e) = registry.update(job_id, &update).await {
                        tracing::warn!(%job_id, error = %e, "Failed to persist progress update");
                    }
                }
            })
        };

        let result = self
            .separator
            .run(
                Path::new(&job.input_path),
                Path::new(&job.output_dir),
                job.stems,
                progress_tx,
            )
            .await;

        // The sender is consumed by run(), so the consumer drains and exits.
        if let Err(e) = progress_task.await {
            tracing::warn!(job_id = %job.id, error = %e, "Progress task panicked");
        }

        let stems = result?;
        let stem_files = serde_json::to_value(&stems)
            .map_err(|e| RunError::Internal(e.to_string()))?;

        let completed = self
            .registry
            .update(
                job.id,
                &JobUpdate {
                    status: Some(JobStatus::Completed),
                    progress: Some(100),
                    message: Some(COMPLETED_MESSAGE.to_string()),
                    stem_files: Some(stem_files),
                    ..Default::default()
                },
            )
            .await?;

        self.record_metric(&completed, true, None).await;
        tracing::info!(job_id = %job.id, stems = stems.len(), "Separation complete");
        Ok(())
    }

    /// Move the job to `error` and record a failure metric. Best-effort:
    /// if even the error write fails there is nothing left to do but log.
    async fn fail(&self, job: &Job, error: &RunError) {
        let update = JobUpdate {
            status: Some(JobStatus::Error),
            error: Some(error.to_string()),
            ..Default::default()
        };
        match self.registry.update(job.id, &update).await {
            Ok(failed) => {
                self.record_metric(&failed, false, Some(error.kind()))
                    .await;
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to record job failure");
            }
        }
    }

    async fn record_metric(&self, job: &Job, success: bool, error_type: Option<&'static str>) {
        let metric = NewJobMetric {
            job_id: job.id,
            file_size_mb: job.file_size.map(|b| b as f64 / (1024.0 * 1024.0)),
            processing_time_secs: job.processing_duration_secs,
            success,
            error_type: error_type.map(str::to_string),
            model_name: self.separator.config().model.clone(),
            stems_count: job.stems,
            gpu_used: Some(self.separator.config().device.is_gpu()),
            max_memory_mb: None,
        };
        if let Err(e) = JobMetricRepo::record(self.registry.pool(), &metric).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to record job metric");
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Registry(#[from] stemd_db::registry::RegistryError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Separator(#[from] SeparatorError),

    #[error("{0}")]
    Internal(String),
}

impl RunError {
    /// Stable classification string stored in `job_metrics.error_type`.
    fn kind(&self) -> &'static str {
        match self {
            RunError::Registry(_) => "registry",
            RunError::Gate(GateError::Timeout(_)) => "gate_timeout",
            RunError::Gate(GateError::Closed) => "gate_closed",
            RunError::Separator(SeparatorError::InputMissing(_)) => "input_missing",
            RunError::Separator(SeparatorError::Spawn(_)) => "spawn_failed",
            RunError::Separator(SeparatorError::NonZeroExit { .. }) => "nonzero_exit",
            RunError::Separator(SeparatorError::MissingOutput(_)) => "missing_output",
            RunError::Separator(SeparatorError::Io(_)) => "io",
            RunError::Internal(_) => "internal",
        }
    }
}
