/// Caller-visible failure conditions of an observation session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObservationError {
    /// The submission call failed; no job exists.
    #[error("submission failed: {0}")]
    Submission(String),
    /// The live channel dropped or delivered garbage. The job id is still
    /// valid server-side and may be observed again.
    #[error("status channel lost: {0}")]
    ChannelTransport(String),
    /// The job completed but its transcript could not be retrieved.
    #[error("could not retrieve transcript: {0}")]
    SnapshotFetch(String),
    /// Server-reported terminal failure.
    #[error("transcription failed: {0}")]
    JobFailed(String),
}
