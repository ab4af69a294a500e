use crate::{JobId, JobSnapshot, JobStatus, ObservationId, StatusEvent, SubmissionRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Caller asked to submit a new source. `requested_at` becomes the job's `created_at`.
    SubmitRequested {
        request: SubmissionRequest,
        requested_at: String,
    },
    /// Submission call returned a job id.
    SubmitSucceeded {
        observation: ObservationId,
        job_id: JobId,
        status: JobStatus,
    },
    /// Submission call failed before any job existed.
    SubmitFailed {
        observation: ObservationId,
        reason: String,
    },
    /// Caller asked to observe an existing job, e.g. one picked from history.
    /// `known_status` of `None` means "look it up first".
    ObserveRequested {
        job_id: JobId,
        known_status: Option<JobStatus>,
        created_at: String,
    },
    /// Live channel delivered a status event.
    ChannelEvent {
        observation: ObservationId,
        event: StatusEvent,
    },
    /// Live channel failed at the transport level.
    ChannelLost {
        observation: ObservationId,
        reason: String,
    },
    SnapshotFetched {
        observation: ObservationId,
        snapshot: JobSnapshot,
    },
    SnapshotFailed {
        observation: ObservationId,
        reason: String,
    },
    /// Caller asked to retry a failed snapshot fetch.
    RetrySnapshot,
    /// Caller abandoned the observation.
    CancelRequested { observation: ObservationId },
}
