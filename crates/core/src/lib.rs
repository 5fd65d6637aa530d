//! Pure domain logic shared by every stemd crate.
//!
//! No I/O and no internal dependencies live here: error taxonomy, shared
//! type aliases, quota admission decisions, and queue-wait estimation.

pub mod error;
pub mod queue;
pub mod quota;
pub mod types;
