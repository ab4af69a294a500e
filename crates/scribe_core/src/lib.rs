//! Scribe core: pure job-lifecycle state machine and view-model helpers.
mod effect;
mod error;
mod job;
mod msg;
mod options;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use error::ObservationError;
pub use job::{
    HistoryEntry, Job, JobId, JobSnapshot, JobStatus, ObservationId, StatusEvent, UnknownStatus,
};
pub use msg::Msg;
pub use options::{
    ExportFormat, Language, Model, ParseOptionError, SubmissionOptions, SubmissionRequest,
    SubmissionSource, Task,
};
pub use state::{Phase, SessionState, SnapshotPurpose, UNKNOWN_FAILURE};
pub use update::update;
pub use view_model::SessionView;
