//! Periodic cleanup of expired jobs and their on-disk artifacts.
//!
//! Two-phase sweep on a fixed interval:
//! 1. For jobs past retention whose files still exist, delete the input
//!    file and every output stem, then mark the row `files_deleted`.
//! 2. Purge rows already marked `files_deleted` that are past retention,
//!    along with their cache entries and fallback snapshots.
//!
//! Runs until `cancel` is triggered.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use stemd_db::models::job::Job;
use stemd_db::registry::JobRegistry;
use stemd_db::repositories::JobRepo;
use tokio_util::sync::CancellationToken;

/// Run the cleanup loop.
pub async fn run(
    registry: JobRegistry,
    interval: Duration,
    retention_days: i64,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_days,
        interval_secs = interval.as_secs(),
        "Cleanup sweeper started"
    );

    let mut interval = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Cleanup sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                sweep(&registry, retention_days).await;
            }
        }
    }
}

/// One full cleanup pass. Per-job failures are logged and skipped so one
/// bad path cannot stall the sweep.
pub async fn sweep(registry: &JobRegistry, retention_days: i64) {
    let retention = chrono::Duration::days(retention_days);
    let cutoff = Utc::now() - retention;

    // Phase 1: delete artifacts of expired jobs.
    match JobRepo::find_stale(registry.pool(), cutoff).await {
        Ok(stale) => {
            let count = stale.len();
            for job in stale {
                delete_artifacts(&job).await;
                if let Err(e) = JobRepo::mark_files_deleted(registry.pool(), job.id).await {
                    tracing::error!(job_id = %job.id, error = %e, "Cleanup: failed to mark files deleted");
                }
            }
            if count > 0 {
                tracing::info!(count, "Cleanup: deleted artifacts of expired jobs");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Cleanup: failed to list stale jobs");
        }
    }

    // Phase 2: purge expired rows (and their cache/snapshot entries).
    match registry.purge_older_than(retention).await {
        Ok(purged) if purged > 0 => {
            tracing::info!(purged, "Cleanup: purged expired job records");
        }
        Ok(_) => {
            tracing::debug!("Cleanup: no job records to purge");
        }
        Err(e) => {
            tracing::error!(error = %e, "Cleanup: record purge failed");
        }
    }

    // Orphaned snapshot files (e.g. written while the database was down
    // for jobs that never made it back) age out on the same horizon.
    let max_age = Duration::from_secs((retention_days as u64) * 86_400);
    match registry.purge_snapshots_older_than(max_age) {
        Ok(removed) if removed > 0 => {
            tracing::info!(removed, "Cleanup: removed stale fallback snapshots");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, "Cleanup: snapshot purge failed");
        }
    }
}

/// Remove a job's input file and output stems. Missing files are fine;
/// the sweep may be retrying after a partial earlier pass.
async fn delete_artifacts(job: &Job) {
    remove_file_logged(Path::new(&job.input_path), job).await;

    if let Some(stems) = job.stem_files.as_ref().and_then(|v| v.as_object()) {
        for path in stems.values().filter_map(|v| v.as_str()) {
            remove_file_logged(Path::new(path), job).await;
        }
        // The per-track output directory is empty once its stems are gone.
        if let Some(dir) = stems
            .values()
            .filter_map(|v| v.as_str())
            .next()
            .and_then(|p| Path::new(p).parent())
        {
            if let Err(e) = tokio::fs::remove_dir(dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(job_id = %job.id, dir = %dir.display(), error = %e, "Cleanup: output dir not removed");
                }
            }
        }
    }
}

async fn remove_file_logged(path: &Path, job: &Job) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(job_id = %job.id, path = %path.display(), error = %e, "Cleanup: failed to delete file");
        }
    }
}
