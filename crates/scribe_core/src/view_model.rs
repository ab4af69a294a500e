use crate::{Job, JobStatus, ObservationError, ObservationId, Phase};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionView {
    pub observation: Option<ObservationId>,
    pub phase: Phase,
    pub job: Option<Job>,
    pub error: Option<ObservationError>,
    pub awaiting_snapshot: bool,
}

impl SessionView {
    /// Status shown to the user; UPLOADING while the submission is in flight.
    pub fn status(&self) -> Option<JobStatus> {
        match self.phase {
            Phase::Uploading => Some(JobStatus::Uploading),
            _ => self.job.as_ref().map(|job| job.status),
        }
    }

    pub fn transcript(&self) -> Option<&str> {
        self.job.as_ref().and_then(|job| job.transcript.as_deref())
    }

    /// Nothing further will happen without a caller action: the job is
    /// terminal with no fetch outstanding, an error is visible, or the
    /// observation was cancelled.
    pub fn is_settled(&self) -> bool {
        match self.phase {
            Phase::Idle | Phase::Cancelled => true,
            Phase::Uploading => false,
            Phase::Observing => {
                if self.awaiting_snapshot {
                    return false;
                }
                self.error.is_some()
                    || self
                        .job
                        .as_ref()
                        .is_some_and(|job| job.status.is_terminal())
            }
        }
    }
}
