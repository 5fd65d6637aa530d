//! Single-permit gate serializing access to the separation device.
//!
//! Jobs run the external tool one at a time regardless of how many are
//! admitted. A job holds the permit for its whole processing phase and
//! releases it on drop, including on panic or task abort.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Timed out waiting for device access after {0:?}")]
    Timeout(Duration),

    #[error("Device gate is closed")]
    Closed,
}

impl From<AcquireError> for GateError {
    fn from(_: AcquireError) -> Self {
        GateError::Closed
    }
}

/// Cloneable handle to the single device permit.
#[derive(Clone)]
pub struct DeviceGate {
    semaphore: Arc<Semaphore>,
    acquire_timeout: Option<Duration>,
}

impl DeviceGate {
    /// Create a gate with one permit. `acquire_timeout` of `None` means
    /// waiters queue indefinitely.
    pub fn new(acquire_timeout: Option<Duration>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            acquire_timeout,
        }
    }

    /// Wait for exclusive device access. Waiters are served in FIFO order.
    pub async fn acquire(&self) -> Result<GateGuard, GateError> {
        let permit = match self.acquire_timeout {
            Some(timeout) => tokio::time::timeout(
                timeout,
                Arc::clone(&self.semaphore).acquire_owned(),
            )
            .await
            .map_err(|_| GateError::Timeout(timeout))??,
            None => Arc::clone(&self.semaphore).acquire_owned().await?,
        };
        Ok(GateGuard { _permit: permit })
    }

    /// Whether the device is currently held by a job.
    pub fn is_busy(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

/// Exclusive hold on the device. Dropping it releases the gate.
pub struct GateGuard {
    _permit: OwnedSemaphorePermit,
}
