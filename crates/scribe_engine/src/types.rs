use std::fmt;

use scribe_core::{HistoryEntry, JobId, JobSnapshot, JobStatus, StatusEvent};
use serde::Deserialize;

/// Returned by both submit calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// Authenticated caller as reported by the current-user endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: FailureKind,
    pub message: String,
    /// Error payload returned by the server, when it sent one.
    pub body: Option<String>,
}

impl TransportError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            body: None,
        }
    }

    pub(crate) fn http_status(code: u16, message: impl Into<String>, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body).trim().to_string();
        Self {
            kind: FailureKind::HttpStatus(code),
            message: message.into(),
            body: (!text.is_empty()).then_some(text),
        }
    }

    /// Human-readable reason: the server's own payload when present.
    pub fn reason(&self) -> String {
        match &self.body {
            Some(body) => body.clone(),
            None => self.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected before any request was made (empty payload, empty url, bad header).
    InvalidInput,
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    /// Response body was not the expected JSON shape.
    Decode,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidInput => write!(f, "invalid input"),
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "decode error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ChannelError {
    pub kind: ChannelFailure,
    pub message: String,
}

impl ChannelError {
    pub(crate) fn new(kind: ChannelFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelFailure {
    Connect,
    HttpStatus(u16),
    /// Connection ended or broke before a terminal status arrived.
    Dropped,
    /// Undecodable frame, payload or status value.
    Malformed,
    /// A polling snapshot fetch failed.
    Poll,
}

impl fmt::Display for ChannelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelFailure::Connect => write!(f, "connect failed"),
            ChannelFailure::HttpStatus(code) => write!(f, "http status {code}"),
            ChannelFailure::Dropped => write!(f, "connection dropped"),
            ChannelFailure::Malformed => write!(f, "malformed event"),
            ChannelFailure::Poll => write!(f, "poll failed"),
        }
    }
}

fn parse_status(raw: &str) -> Result<JobStatus, String> {
    raw.parse::<JobStatus>().map_err(|err| err.to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitResponse {
    job_id: String,
    status: String,
}

impl SubmitResponse {
    pub(crate) fn into_receipt(self) -> Result<SubmitReceipt, String> {
        if self.job_id.trim().is_empty() {
            return Err("server returned an empty job id".to_string());
        }
        Ok(SubmitReceipt {
            job_id: JobId::new(self.job_id),
            status: parse_status(&self.status)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SnapshotResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    transcript: Option<String>,
}

impl SnapshotResponse {
    pub(crate) fn into_snapshot(self) -> Result<JobSnapshot, String> {
        Ok(JobSnapshot {
            status: parse_status(&self.status)?,
            message: self.message,
            transcript: self.transcript,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HistoryItem {
    id: String,
    status: String,
    #[serde(default)]
    created_at: Option<String>,
}

impl HistoryItem {
    pub(crate) fn into_entry(self) -> Result<HistoryEntry, String> {
        Ok(HistoryEntry {
            id: JobId::new(self.id),
            status: parse_status(&self.status)?,
            created_at: self.created_at.unwrap_or_default(),
        })
    }
}

/// JSON `data` of a `status-update` event. Extra fields (e.g. `jobId`) are ignored.
#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

pub(crate) fn decode_status_event(data: &str) -> Result<StatusEvent, ChannelError> {
    let payload: StatusPayload = serde_json::from_str(data)
        .map_err(|err| ChannelError::new(ChannelFailure::Malformed, err.to_string()))?;
    let status = parse_status(&payload.status)
        .map_err(|err| ChannelError::new(ChannelFailure::Malformed, err))?;
    Ok(StatusEvent::new(status, payload.message))
}
