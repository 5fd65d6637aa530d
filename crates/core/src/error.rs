use crate::quota::QuotaReason;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A per-user admission limit was hit. `current` is the counter value
    /// for rate limits, or the requested size in MB for the size limit.
    #[error("Quota exceeded: {reason} (limit {limit}, current {current})")]
    QuotaExceeded {
        reason: QuotaReason,
        limit: i64,
        current: i64,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
