use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Mount job submission and status routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/separate", post(jobs::start_separation))
        .route("/status/{job_id}", get(jobs::get_status))
        .route("/jobs", get(jobs::list_jobs))
}
