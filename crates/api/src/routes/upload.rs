use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::config::ServerConfig;
use crate::handlers::upload;
use crate::state::AppState;

/// Slack on top of the file size cap for multipart framing overhead.
/// The real limit is enforced incrementally while streaming to disk.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Mount upload routes. The body limit is raised above axum's 2 MB
/// default to admit files up to the configured cap.
pub fn router(config: &ServerConfig) -> Router<AppState> {
    let body_limit =
        (config.max_upload_size_mb as usize) * 1024 * 1024 + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route(
            "/upload",
            post(upload::upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/upload/constraints", get(upload::constraints))
}
