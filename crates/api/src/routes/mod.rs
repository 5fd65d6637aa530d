pub mod health;
pub mod jobs;
pub mod upload;

use axum::Router;

use crate::state::AppState;

/// Build the full route tree.
///
/// ```text
/// /health               service, device, and database health (GET)
///
/// /separate             admit a separation job (POST)
/// /status/{job_id}      job status, queue info, stems (GET)
/// /jobs                 the caller's jobs, newest first (GET)
///
/// /upload               store an audio file (POST, multipart)
/// /upload/constraints   size/format/quota limits for the caller (GET)
/// ```
pub fn api_routes(config: &crate::config::ServerConfig) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(jobs::router())
        .merge(upload::router(config))
}
