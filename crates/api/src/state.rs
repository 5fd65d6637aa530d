use std::sync::Arc;

use stemd_db::registry::JobRegistry;
use stemd_engine::device::Device;
use stemd_engine::runner::JobRunner;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: stemd_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Three-tier job store (database, cache, on-disk snapshots).
    pub registry: JobRegistry,
    /// Executes separation jobs against the device gate.
    pub runner: Arc<JobRunner>,
    /// Compute device detected at startup.
    pub device: Device,
}
