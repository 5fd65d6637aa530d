/// Serial primary keys (metrics, quotas) are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Job identifiers are UUIDv4, generated at submission time.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
