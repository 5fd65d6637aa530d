//! Separation engine: device detection, the GPU gate, the external
//! separator process wrapper, and the job runner that drives a job
//! through its lifecycle.

pub mod device;
pub mod gate;
pub mod progress;
pub mod runner;
pub mod separator;
