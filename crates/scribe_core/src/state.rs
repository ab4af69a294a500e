use crate::view_model::SessionView;
use crate::{Job, JobId, JobSnapshot, JobStatus, ObservationError, ObservationId};

/// Failure reason used when the server reports FAILED without a message.
pub const UNKNOWN_FAILURE: &str = "Unknown error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Submission in flight, no job id yet.
    Uploading,
    /// A job id is known and its lifecycle is being tracked (terminal included).
    Observing,
    /// The caller abandoned the observation; the job is frozen.
    Cancelled,
}

/// Why a snapshot fetch is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPurpose {
    /// The job reached COMPLETED; fetch the transcript.
    Transcript,
    /// Resuming an existing job; the snapshot decides whether a channel is needed.
    Resolve,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    next_observation: ObservationId,
    current: Option<ObservationId>,
    phase: Phase,
    pending_created_at: Option<String>,
    job: Option<Job>,
    pending_snapshot: Option<SnapshotPurpose>,
    error: Option<ObservationError>,
    dirty: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            observation: self.current,
            phase: self.phase,
            job: self.job.clone(),
            error: self.error.clone(),
            awaiting_snapshot: self.pending_snapshot.is_some(),
        }
    }

    pub fn current_observation(&self) -> Option<ObservationId> {
        self.current
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn error(&self) -> Option<&ObservationError> {
        self.error.as_ref()
    }

    pub fn pending_snapshot(&self) -> Option<SnapshotPurpose> {
        self.pending_snapshot
    }

    /// Returns whether state changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// True only for messages belonging to the live (non-cancelled) observation.
    pub(crate) fn is_current(&self, observation: ObservationId) -> bool {
        self.current == Some(observation)
    }

    pub(crate) fn job_is_terminal(&self) -> bool {
        self.job
            .as_ref()
            .is_some_and(|job| job.status.is_terminal())
    }

    fn next_observation_id(&mut self) -> ObservationId {
        self.next_observation += 1;
        self.next_observation
    }

    fn reset_for(&mut self, observation: ObservationId, phase: Phase) {
        self.current = Some(observation);
        self.phase = phase;
        self.pending_created_at = None;
        self.job = None;
        self.pending_snapshot = None;
        self.error = None;
        self.mark_dirty();
    }

    pub(crate) fn begin_upload(&mut self, requested_at: String) -> ObservationId {
        let observation = self.next_observation_id();
        self.reset_for(observation, Phase::Uploading);
        self.pending_created_at = Some(requested_at);
        observation
    }

    pub(crate) fn begin_tracking(&mut self, job_id: JobId, status: JobStatus) {
        let created_at = self.pending_created_at.take().unwrap_or_default();
        self.job = Some(Job::new(job_id, status, created_at));
        self.phase = Phase::Observing;
        self.mark_dirty();
    }

    pub(crate) fn fail_submission(&mut self, reason: String) {
        self.current = None;
        self.phase = Phase::Idle;
        self.pending_created_at = None;
        self.job = None;
        self.error = Some(ObservationError::Submission(reason));
        self.mark_dirty();
    }

    pub(crate) fn begin_observation(
        &mut self,
        job_id: JobId,
        status: JobStatus,
        created_at: String,
    ) -> ObservationId {
        let observation = self.next_observation_id();
        self.reset_for(observation, Phase::Observing);
        self.job = Some(Job::new(job_id, status, created_at));
        observation
    }

    pub(crate) fn request_snapshot(&mut self, purpose: SnapshotPurpose) {
        self.pending_snapshot = Some(purpose);
        self.mark_dirty();
    }

    pub(crate) fn take_pending_snapshot(&mut self) -> Option<SnapshotPurpose> {
        self.pending_snapshot.take()
    }

    pub(crate) fn apply_message(&mut self, message: Option<String>) {
        if let (Some(job), Some(message)) = (self.job.as_mut(), message) {
            if job.status_message.as_deref() != Some(message.as_str()) {
                job.status_message = Some(message);
                self.dirty = true;
            }
        }
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) {
        if let Some(job) = self.job.as_mut() {
            if job.status != status {
                job.status = status;
                self.dirty = true;
            }
        }
    }

    pub(crate) fn mark_failed(&mut self, message: Option<String>) {
        let reason = message
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_FAILURE.to_string());
        self.set_status(JobStatus::Failed);
        if let Some(job) = self.job.as_mut() {
            job.status_message = Some(reason.clone());
        }
        self.error = Some(ObservationError::JobFailed(reason));
        self.mark_dirty();
    }

    /// Stores the transcript from a COMPLETED snapshot; reports a fetch error
    /// when the server returned nothing to show.
    pub(crate) fn apply_completed_snapshot(&mut self, snapshot: JobSnapshot) {
        self.set_status(JobStatus::Completed);
        self.apply_message(snapshot.message);
        match snapshot.transcript.filter(|text| !text.is_empty()) {
            Some(transcript) => {
                if let Some(job) = self.job.as_mut() {
                    job.transcript = Some(transcript);
                }
                self.error = None;
            }
            None => {
                self.error = Some(ObservationError::SnapshotFetch(
                    "server returned no transcript for a completed job".to_string(),
                ));
            }
        }
        self.mark_dirty();
    }

    pub(crate) fn set_error(&mut self, error: ObservationError) {
        self.error = Some(error);
        self.mark_dirty();
    }

    pub(crate) fn clear_error(&mut self) {
        if self.error.take().is_some() {
            self.mark_dirty();
        }
    }

    pub(crate) fn cancel(&mut self) {
        self.current = None;
        self.pending_created_at = None;
        self.pending_snapshot = None;
        self.phase = Phase::Cancelled;
        self.mark_dirty();
    }
}
