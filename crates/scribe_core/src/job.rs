use std::fmt;
use std::str::FromStr;

/// Identifies one observation session. Every message produced by
/// asynchronous work carries the id of the observation that requested it.
pub type ObservationId = u64;

/// Opaque, server-assigned job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Client-only: the submission call is in flight and no job id exists yet.
    Uploading,
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Uploading => "UPLOADING",
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    /// Case-sensitive: `"completed"` is not a status.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "UPLOADING" => Ok(JobStatus::Uploading),
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Caller-visible view of one tracked job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub status_message: Option<String>,
    /// Present only once the job is COMPLETED and its snapshot was retrieved.
    pub transcript: Option<String>,
    /// RFC 3339 timestamp recorded when the observation started.
    pub created_at: String,
}

impl Job {
    pub(crate) fn new(id: JobId, status: JobStatus, created_at: String) -> Self {
        Self {
            id,
            status,
            status_message: None,
            transcript: None,
            created_at,
        }
    }
}

/// One decoded status event from a live channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub status: JobStatus,
    pub message: Option<String>,
}

impl StatusEvent {
    pub fn new(status: JobStatus, message: Option<String>) -> Self {
        Self { status, message }
    }
}

/// Point-in-time server view of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub message: Option<String>,
    pub transcript: Option<String>,
}

/// Read-only projection of a past job, as listed by the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: JobId,
    pub status: JobStatus,
    pub created_at: String,
}
