//! Job lifecycle status mapping to a SMALLINT column.
//!
//! Variant discriminants follow the lifecycle order; the database stores
//! the raw id, the API serializes the lowercase label.

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Separation job lifecycle status.
///
/// The only legal path is
/// `Queued -> Waiting -> Processing -> {Completed | Error}`; there is no
/// path out of a terminal state.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued = 1,
    Waiting = 2,
    Processing = 3,
    Completed = 4,
    Error = 5,
}

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Map a raw database id back to a status.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(JobStatus::Queued),
            2 => Some(JobStatus::Waiting),
            3 => Some(JobStatus::Processing),
            4 => Some(JobStatus::Completed),
            5 => Some(JobStatus::Error),
            _ => None,
        }
    }

    /// Lowercase wire label used in API responses and snapshots.
    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Waiting => "waiting",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// Completed and Error are terminal; nothing transitions out of them.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}
