use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use scribe_core::JobId;
use scribe_logging::{scribe_debug, scribe_info, scribe_trace, scribe_warn};

use super::sse::SseDecoder;
use super::{ChannelGuard, ChannelListener, Delivery, StatusChannel, Subscription};
use crate::transport::{build_client, Endpoints};
use crate::types::decode_status_event;
use crate::{ChannelError, ChannelFailure, TransportError, TransportSettings};

/// Name of the server-sent event carrying `{status, message?}`.
pub const STATUS_EVENT_NAME: &str = "status-update";

/// Server-sent events channel on `{base}/status/events/{jobId}`.
#[derive(Debug, Clone)]
pub struct PushChannel {
    client: Client,
    endpoints: Endpoints,
}

impl PushChannel {
    pub fn new(settings: &TransportSettings) -> Result<Self, TransportError> {
        Ok(Self {
            // No overall timeout: the stream stays open for as long as the job runs.
            client: build_client(settings, None)?,
            endpoints: Endpoints::parse(&settings.base_url)?,
        })
    }
}

impl StatusChannel for PushChannel {
    fn open(&self, job_id: &JobId, listener: Arc<dyn ChannelListener>) -> Box<dyn Subscription> {
        let guard = ChannelGuard::default();
        let delivery = guard.delivery(listener);
        let client = self.client.clone();
        let url = self.endpoints.status_events(job_id);
        let task_job_id = job_id.clone();

        scribe_info!("Opening status stream for job {}", job_id);
        tokio::spawn(async move {
            run_stream(client, url, task_job_id, delivery).await;
        });

        Box::new(PushSubscription {
            job_id: job_id.clone(),
            guard,
        })
    }
}

pub struct PushSubscription {
    job_id: JobId,
    guard: ChannelGuard,
}

impl Subscription for PushSubscription {
    fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn close(&self) {
        if !self.guard.is_closed() {
            scribe_debug!("Closing status stream for job {}", self.job_id);
        }
        self.guard.close();
    }

    fn is_closed(&self) -> bool {
        self.guard.is_closed()
    }
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        self.guard.close();
    }
}

async fn run_stream(client: Client, url: Url, job_id: JobId, delivery: Delivery) {
    let token = delivery.token();
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        outcome = stream_events(&client, url, &delivery) => Some(outcome),
    };

    match outcome {
        None => scribe_debug!("Status stream for job {} closed by caller", job_id),
        Some(Ok(())) => {
            scribe_debug!("Status stream for job {} finished", job_id);
            delivery.finish();
        }
        Some(Err(err)) => {
            scribe_warn!("Status stream for job {} failed: {}", job_id, err);
            delivery.fail(err);
        }
    }
}

/// Reads frames until a terminal status has been delivered or the caller closed
/// the subscription. Any other end of stream is a drop.
async fn stream_events(client: &Client, url: Url, delivery: &Delivery) -> Result<(), ChannelError> {
    let response = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|err| ChannelError::new(ChannelFailure::Connect, err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ChannelError::new(
            ChannelFailure::HttpStatus(status.as_u16()),
            status.to_string(),
        ));
    }

    let mut decoder = SseDecoder::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|err| ChannelError::new(ChannelFailure::Dropped, err.to_string()))?;
        let batch = decoder.feed(&chunk);
        for frame in batch.frames {
            if frame.event != STATUS_EVENT_NAME {
                scribe_trace!("Ignoring event {:?}", frame.event);
                continue;
            }
            let event = decode_status_event(&frame.data)?;
            let terminal = event.status.is_terminal();
            if !delivery.event(event) || terminal {
                return Ok(());
            }
        }
        if let Some(err) = batch.error {
            return Err(err);
        }
    }

    Err(ChannelError::new(
        ChannelFailure::Dropped,
        "stream ended before a terminal status",
    ))
}
