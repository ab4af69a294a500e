use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use scribe_core::{
    ExportFormat, HistoryEntry, JobId, JobSnapshot, SubmissionOptions, SubmissionRequest,
    SubmissionSource,
};
use scribe_logging::{scribe_debug, scribe_info};
use serde::de::DeserializeOwned;

use crate::types::{HistoryItem, SnapshotResponse, SubmitResponse};
use crate::{CurrentUser, FailureKind, SubmitReceipt, TransportError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// API root, e.g. `http://localhost:8080/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applies to request/response calls; never to the live status stream.
    pub request_timeout: Duration,
    /// Raw `Cookie` header value carrying the authenticated session.
    pub session_cookie: Option<String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            session_cookie: None,
        }
    }
}

/// Request surface of the transcription server. No retries at this layer.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn submit_upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        options: &SubmissionOptions,
    ) -> Result<SubmitReceipt, TransportError>;

    async fn submit_link(
        &self,
        url: &str,
        options: &SubmissionOptions,
    ) -> Result<SubmitReceipt, TransportError>;

    async fn fetch_snapshot(&self, job_id: &JobId) -> Result<JobSnapshot, TransportError>;

    /// Caller-scoped past jobs, in whatever order the server returns them.
    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, TransportError>;

    /// `Ok(None)` when the session is not authenticated.
    async fn current_user(&self) -> Result<Option<CurrentUser>, TransportError>;

    async fn download_export(
        &self,
        job_id: &JobId,
        format: ExportFormat,
    ) -> Result<Vec<u8>, TransportError>;

    /// Pure URL construction; does not check that the job exists.
    fn download_url(&self, job_id: &JobId, format: ExportFormat) -> String;
}

/// Dispatches a submission request to the matching transport call.
pub async fn submit_request(
    transport: &dyn Transport,
    request: SubmissionRequest,
) -> Result<SubmitReceipt, TransportError> {
    let SubmissionRequest { source, options } = request;
    match source {
        SubmissionSource::Upload { filename, bytes } => {
            transport.submit_upload(&filename, bytes, &options).await
        }
        SubmissionSource::Link { url } => transport.submit_link(&url, &options).await,
    }
}

/// Server endpoints derived from the configured API root.
#[derive(Debug, Clone)]
pub(crate) struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub(crate) fn parse(base_url: &str) -> Result<Self, TransportError> {
        let base = Url::parse(base_url.trim())
            .map_err(|err| TransportError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::new(
                FailureKind::InvalidUrl,
                format!("{base_url} cannot be used as an API root"),
            ));
        }
        Ok(Self { base })
    }

    /// Appends path segments; each segment is percent-encoded.
    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `parse` rejected cannot-be-a-base urls, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub(crate) fn upload(&self) -> Url {
        self.join(&["transcribe"])
    }

    pub(crate) fn link(&self) -> Url {
        self.join(&["transcribe-link"])
    }

    pub(crate) fn status(&self, job_id: &JobId) -> Url {
        self.join(&["status", job_id.as_str()])
    }

    pub(crate) fn status_events(&self, job_id: &JobId) -> Url {
        self.join(&["status", "events", job_id.as_str()])
    }

    pub(crate) fn history(&self) -> Url {
        self.join(&["history"])
    }

    pub(crate) fn current_user(&self) -> Url {
        self.join(&["auth", "me"])
    }

    pub(crate) fn download(&self, job_id: &JobId, format: ExportFormat) -> Url {
        let mut url = self.join(&["download", job_id.as_str()]);
        url.query_pairs_mut().append_pair("format", format.as_str());
        url
    }
}

/// Builds a client carrying the session cookie. `request_timeout` of `None`
/// leaves the response body unbounded in time, as the status stream needs.
pub(crate) fn build_client(
    settings: &TransportSettings,
    request_timeout: Option<Duration>,
) -> Result<Client, TransportError> {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = settings.session_cookie.as_deref() {
        let value = HeaderValue::from_str(cookie)
            .map_err(|err| TransportError::new(FailureKind::InvalidInput, err.to_string()))?;
        headers.insert(COOKIE, value);
    }

    let mut builder = Client::builder()
        .connect_timeout(settings.connect_timeout)
        .default_headers(headers);
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|err| TransportError::new(FailureKind::Network, err.to_string()))
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    endpoints: Endpoints,
}

impl ReqwestTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(settings, Some(settings.request_timeout))?,
            endpoints: Endpoints::parse(&settings.base_url)?,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, TransportError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn submit_upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        options: &SubmissionOptions,
    ) -> Result<SubmitReceipt, TransportError> {
        if bytes.is_empty() {
            return Err(TransportError::new(
                FailureKind::InvalidInput,
                "upload payload is empty",
            ));
        }
        scribe_info!("Uploading {} ({} bytes)", filename, bytes.len());

        let mut form = Form::new().part("file", Part::bytes(bytes).file_name(filename.to_string()));
        for (name, value) in options.form_fields() {
            form = form.text(name, value);
        }

        let response = self
            .client
            .post(self.endpoints.upload())
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body: SubmitResponse = read_json(response).await?;
        body.into_receipt()
            .map_err(|err| TransportError::new(FailureKind::Decode, err))
    }

    async fn submit_link(
        &self,
        url: &str,
        options: &SubmissionOptions,
    ) -> Result<SubmitReceipt, TransportError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(TransportError::new(FailureKind::InvalidInput, "url is empty"));
        }
        scribe_info!("Submitting link {}", url);

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("url", url)
            .extend_pairs(options.form_fields())
            .finish();

        let response = self
            .client
            .post(self.endpoints.link())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body: SubmitResponse = read_json(response).await?;
        body.into_receipt()
            .map_err(|err| TransportError::new(FailureKind::Decode, err))
    }

    async fn fetch_snapshot(&self, job_id: &JobId) -> Result<JobSnapshot, TransportError> {
        scribe_debug!("Fetching snapshot for job {}", job_id);
        let body: SnapshotResponse = self.get_json(self.endpoints.status(job_id)).await?;
        body.into_snapshot()
            .map_err(|err| TransportError::new(FailureKind::Decode, err))
    }

    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, TransportError> {
        let items: Vec<HistoryItem> = self.get_json(self.endpoints.history()).await?;
        items
            .into_iter()
            .map(HistoryItem::into_entry)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| TransportError::new(FailureKind::Decode, err))
    }

    async fn current_user(&self) -> Result<Option<CurrentUser>, TransportError> {
        let response = self
            .client
            .get(self.endpoints.current_user())
            .send()
            .await
            .map_err(map_reqwest_error)?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            _ => read_json(response).await.map(Some),
        }
    }

    async fn download_export(
        &self,
        job_id: &JobId,
        format: ExportFormat,
    ) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(self.endpoints.download(job_id, format))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(TransportError::http_status(
                status.as_u16(),
                status.to_string(),
                &body,
            ));
        }
        Ok(body.to_vec())
    }

    fn download_url(&self, job_id: &JobId, format: ExportFormat) -> String {
        self.endpoints.download(job_id, format).to_string()
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
    let status = response.status();
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    if !status.is_success() {
        return Err(TransportError::http_status(
            status.as_u16(),
            status.to_string(),
            &body,
        ));
    }
    serde_json::from_slice(&body)
        .map_err(|err| TransportError::new(FailureKind::Decode, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return TransportError::new(FailureKind::InvalidUrl, err.to_string());
    }
    if err.is_decode() {
        return TransportError::new(FailureKind::Decode, err.to_string());
    }
    TransportError::new(FailureKind::Network, err.to_string())
}
