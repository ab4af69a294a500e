use crate::{JobId, ObservationId, SubmissionRequest};

/// Work requested by [`crate::update`]. Effects are executed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Close the active channel subscription, if any. Always precedes a new observation.
    CloseSubscription,
    Submit {
        observation: ObservationId,
        request: SubmissionRequest,
    },
    OpenChannel {
        observation: ObservationId,
        job_id: JobId,
    },
    FetchSnapshot {
        observation: ObservationId,
        job_id: JobId,
    },
}
