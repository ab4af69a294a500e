use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use pretty_assertions::assert_eq;
use scribe_core::{
    ExportFormat, HistoryEntry, JobId, JobSnapshot, JobStatus, Model, ObservationError, Phase,
    SessionView, StatusEvent, SubmissionOptions, SubmissionRequest, Task,
};
use scribe_engine::{
    ChannelListener, CurrentUser, FailureKind, ManagerSettings, StatusChannel, SubmitReceipt,
    Subscription, SubscriptionManager, Transport, TransportError, TransportSettings,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(scribe_logging::initialize_for_tests);
}

const NOW: &str = "2026-01-01T10:00:00Z";

fn options() -> SubmissionOptions {
    SubmissionOptions {
        model: Model::Small,
        task: Task::Transcribe,
        ..SubmissionOptions::default()
    }
}

fn transport_error(kind: FailureKind, body: Option<&str>) -> TransportError {
    TransportError {
        kind,
        message: "request failed".to_string(),
        body: body.map(str::to_string),
    }
}

fn snapshot(status: JobStatus, transcript: Option<&str>) -> JobSnapshot {
    JobSnapshot {
        status,
        message: None,
        transcript: transcript.map(str::to_string),
    }
}

#[derive(Default)]
struct FakeTransport {
    receipt: Mutex<Option<Result<SubmitReceipt, TransportError>>>,
    snapshots: Mutex<VecDeque<Result<JobSnapshot, TransportError>>>,
    links: Mutex<Vec<(String, SubmissionOptions)>>,
    snapshot_calls: AtomicUsize,
}

impl FakeTransport {
    fn accepting(job_id: &str, status: JobStatus) -> Self {
        let fake = Self::default();
        *fake.receipt.lock().unwrap() = Some(Ok(SubmitReceipt {
            job_id: JobId::new(job_id),
            status,
        }));
        fake
    }

    fn rejecting(error: TransportError) -> Self {
        let fake = Self::default();
        *fake.receipt.lock().unwrap() = Some(Err(error));
        fake
    }

    fn with_snapshots(
        self,
        snapshots: impl IntoIterator<Item = Result<JobSnapshot, TransportError>>,
    ) -> Self {
        self.snapshots.lock().unwrap().extend(snapshots);
        self
    }

    fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    fn take_receipt(&self) -> Result<SubmitReceipt, TransportError> {
        self.receipt
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(transport_error(FailureKind::Network, None)))
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn submit_upload(
        &self,
        _filename: &str,
        _bytes: Vec<u8>,
        _options: &SubmissionOptions,
    ) -> Result<SubmitReceipt, TransportError> {
        self.take_receipt()
    }

    async fn submit_link(
        &self,
        url: &str,
        options: &SubmissionOptions,
    ) -> Result<SubmitReceipt, TransportError> {
        self.links
            .lock()
            .unwrap()
            .push((url.to_string(), options.clone()));
        self.take_receipt()
    }

    async fn fetch_snapshot(&self, _job_id: &JobId) -> Result<JobSnapshot, TransportError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        self.snapshots
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(transport_error(FailureKind::HttpStatus(404), None)))
    }

    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, TransportError> {
        Ok(Vec::new())
    }

    async fn current_user(&self) -> Result<Option<CurrentUser>, TransportError> {
        Ok(None)
    }

    async fn download_export(
        &self,
        _job_id: &JobId,
        _format: ExportFormat,
    ) -> Result<Vec<u8>, TransportError> {
        Ok(Vec::new())
    }

    fn download_url(&self, job_id: &JobId, format: ExportFormat) -> String {
        format!("fake://{job_id}/{}", format.as_str())
    }
}

struct FakeSubscription {
    job_id: JobId,
    closed: Arc<AtomicBool>,
}

impl Subscription for FakeSubscription {
    fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct OpenedChannel {
    job_id: JobId,
    listener: Arc<dyn ChannelListener>,
    closed: Arc<AtomicBool>,
}

/// Records every open and lets the test push events through the listener.
#[derive(Default)]
struct FakeChannel {
    opened: Mutex<Vec<OpenedChannel>>,
    max_live_at_open: AtomicUsize,
}

impl FakeChannel {
    fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    fn job_id(&self, index: usize) -> JobId {
        self.opened.lock().unwrap()[index].job_id.clone()
    }

    fn is_closed(&self, index: usize) -> bool {
        self.opened.lock().unwrap()[index].closed.load(Ordering::SeqCst)
    }

    fn listener(&self, index: usize) -> Arc<dyn ChannelListener> {
        self.opened.lock().unwrap()[index].listener.clone()
    }

    fn emit(&self, index: usize, status: JobStatus, message: Option<&str>) {
        self.listener(index)
            .on_event(StatusEvent::new(status, message.map(str::to_string)));
    }
}

impl StatusChannel for FakeChannel {
    fn open(&self, job_id: &JobId, listener: Arc<dyn ChannelListener>) -> Box<dyn Subscription> {
        let mut opened = self.opened.lock().unwrap();
        let live = opened
            .iter()
            .filter(|channel| !channel.closed.load(Ordering::SeqCst))
            .count();
        self.max_live_at_open.fetch_max(live, Ordering::SeqCst);

        let closed = Arc::new(AtomicBool::new(false));
        opened.push(OpenedChannel {
            job_id: job_id.clone(),
            listener,
            closed: closed.clone(),
        });
        Box::new(FakeSubscription {
            job_id: job_id.clone(),
            closed,
        })
    }
}

fn manager_with(transport: &Arc<FakeTransport>, channel: &Arc<FakeChannel>) -> SubscriptionManager {
    init_logging();
    SubscriptionManager::new(transport.clone(), channel.clone())
        .with_clock(Arc::new(|| NOW.to_string()))
}

async fn settle(manager: &mut SubscriptionManager) -> SessionView {
    tokio::time::timeout(Duration::from_secs(5), manager.settle())
        .await
        .expect("session should settle")
}

#[tokio::test]
async fn link_submission_runs_to_transcript() {
    let transport = Arc::new(
        FakeTransport::accepting("abc123", JobStatus::Pending)
            .with_snapshots([Ok(snapshot(JobStatus::Completed, Some("Hello world")))]),
    );
    let channel = Arc::new(FakeChannel::default());
    let mut manager = manager_with(&transport, &channel);

    let handle = manager
        .submit(SubmissionRequest::link("https://x/video", options()))
        .expect("accepted");
    assert_eq!(manager.view().status(), Some(JobStatus::Uploading));

    let view = manager.next_update().await.expect("receipt applied");
    assert_eq!(view.status(), Some(JobStatus::Pending));
    assert_eq!(channel.open_count(), 1);
    assert_eq!(channel.job_id(0), JobId::new("abc123"));

    channel.emit(0, JobStatus::Processing, Some("Transcribing"));
    let view = manager.next_update().await.expect("processing applied");
    assert_eq!(view.status(), Some(JobStatus::Processing));
    assert_eq!(
        view.job.as_ref().and_then(|job| job.status_message.as_deref()),
        Some("Transcribing")
    );

    channel.emit(0, JobStatus::Completed, None);
    let view = settle(&mut manager).await;

    let job = view.job.expect("job tracked");
    assert_eq!(job.id, JobId::new("abc123"));
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.transcript.as_deref(), Some("Hello world"));
    assert_eq!(job.created_at, NOW);
    assert_eq!(view.error, None);
    assert_eq!(view.observation, Some(handle.id()));
    assert_eq!(transport.snapshot_calls(), 1);
    assert!(channel.is_closed(0));
    assert!(!manager.has_live_subscription());
    assert_eq!(
        transport.links.lock().unwrap().clone(),
        vec![("https://x/video".to_string(), options())]
    );
}

#[tokio::test]
async fn failed_job_reports_message_without_fetch() {
    let transport = Arc::new(FakeTransport::accepting("abc123", JobStatus::Pending));
    let channel = Arc::new(FakeChannel::default());
    let mut manager = manager_with(&transport, &channel);

    manager.submit(SubmissionRequest::link("https://x/video", options()));
    manager.next_update().await;
    channel.emit(0, JobStatus::Failed, Some("Model crashed"));
    let view = settle(&mut manager).await;

    assert_eq!(view.status(), Some(JobStatus::Failed));
    assert_eq!(
        view.error,
        Some(ObservationError::JobFailed("Model crashed".to_string()))
    );
    assert_eq!(view.transcript(), None);
    assert_eq!(transport.snapshot_calls(), 0);
    assert!(channel.is_closed(0));
}

#[tokio::test]
async fn submission_error_surfaces_server_payload() {
    let transport = Arc::new(FakeTransport::rejecting(transport_error(
        FailureKind::HttpStatus(401),
        Some("User session expired or not authenticated"),
    )));
    let channel = Arc::new(FakeChannel::default());
    let mut manager = manager_with(&transport, &channel);

    manager.submit(SubmissionRequest::link("https://x/video", options()));
    let view = settle(&mut manager).await;

    assert_eq!(
        view.error,
        Some(ObservationError::Submission(
            "User session expired or not authenticated".to_string()
        ))
    );
    assert_eq!(view.job, None);
    assert_eq!(channel.open_count(), 0);
}

#[tokio::test]
async fn second_submission_while_uploading_is_ignored() {
    let transport = Arc::new(FakeTransport::accepting("abc123", JobStatus::Pending));
    let channel = Arc::new(FakeChannel::default());
    let mut manager = manager_with(&transport, &channel);

    let first = manager.submit(SubmissionRequest::link("https://x/one", options()));
    let second = manager.submit(SubmissionRequest::link("https://x/two", options()));

    assert!(first.is_some());
    assert_eq!(second, None);
    manager.next_update().await;
    assert_eq!(transport.links.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn resuming_completed_job_fetches_once_without_channel() {
    let transport = Arc::new(
        FakeTransport::default()
            .with_snapshots([Ok(snapshot(JobStatus::Completed, Some("Ayubowan")))]),
    );
    let channel = Arc::new(FakeChannel::default());
    let mut manager = manager_with(&transport, &channel);

    let handle = manager
        .resume(&HistoryEntry {
            id: JobId::new("old1"),
            status: JobStatus::Completed,
            created_at: "2025-12-31T09:00:00".to_string(),
        })
        .expect("resumed");
    let view = settle(&mut manager).await;

    assert_eq!(view.observation, Some(handle.id()));

    let job = view.job.expect("job tracked");
    assert_eq!(job.transcript.as_deref(), Some("Ayubowan"));
    assert_eq!(job.created_at, "2025-12-31T09:00:00");
    assert_eq!(transport.snapshot_calls(), 1);
    assert_eq!(channel.open_count(), 0);
}

#[tokio::test]
async fn observing_unknown_status_resolves_then_streams() {
    let transport = Arc::new(
        FakeTransport::default().with_snapshots([
            Ok(snapshot(JobStatus::Processing, None)),
            Ok(snapshot(JobStatus::Completed, Some("Hello world"))),
        ]),
    );
    let channel = Arc::new(FakeChannel::default());
    let mut manager = manager_with(&transport, &channel);

    manager.observe(JobId::new("abc123"), None);
    let view = manager.next_update().await.expect("resolved");
    assert_eq!(view.status(), Some(JobStatus::Processing));
    assert_eq!(channel.open_count(), 1);

    channel.emit(0, JobStatus::Completed, None);
    let view = settle(&mut manager).await;
    assert_eq!(view.transcript(), Some("Hello world"));
    assert_eq!(transport.snapshot_calls(), 2);
}

#[tokio::test]
async fn cancel_freezes_the_view() {
    let transport = Arc::new(FakeTransport::default());
    let channel = Arc::new(FakeChannel::default());
    let mut manager = manager_with(&transport, &channel);

    let handle = manager
        .observe(JobId::new("abc123"), Some(JobStatus::Processing))
        .expect("observation started");
    assert_eq!(channel.open_count(), 1);

    manager.cancel(&handle);
    assert!(channel.is_closed(0));
    assert_eq!(manager.view().phase, Phase::Cancelled);
    let frozen = manager.view();

    channel.emit(0, JobStatus::Completed, None);
    assert_eq!(manager.next_update().await, None);
    assert_eq!(manager.view(), frozen);
    assert_eq!(transport.snapshot_calls(), 0);
}

#[tokio::test]
async fn superseded_observation_is_closed_before_next_opens() {
    let transport = Arc::new(FakeTransport::default());
    let channel = Arc::new(FakeChannel::default());
    let mut manager = manager_with(&transport, &channel);

    let first = manager
        .observe(JobId::new("a"), Some(JobStatus::Pending))
        .expect("first observation");
    let second = manager
        .observe(JobId::new("b"), Some(JobStatus::Processing))
        .expect("second observation");

    assert_ne!(first, second);
    assert_eq!(manager.view().observation, Some(second.id()));
    assert_eq!(channel.open_count(), 2);
    assert!(channel.is_closed(0));
    assert!(!channel.is_closed(1));
    assert_eq!(channel.max_live_at_open.load(Ordering::SeqCst), 0);

    // Late event from the first job does not touch the second.
    channel.emit(0, JobStatus::Failed, Some("late"));
    assert_eq!(manager.next_update().await, None);
    let view = manager.view();
    assert_eq!(view.job.map(|job| job.id), Some(JobId::new("b")));
    assert_eq!(view.error, None);

    // Cancelling with a superseded handle is a no-op.
    manager.cancel(&first);
    assert_eq!(manager.view().phase, Phase::Observing);
    assert!(manager.has_live_subscription());
}

#[tokio::test]
async fn channel_loss_is_reported_and_closes_subscription() {
    let transport = Arc::new(FakeTransport::default());
    let channel = Arc::new(FakeChannel::default());
    let mut manager = manager_with(&transport, &channel);

    manager.observe(JobId::new("abc123"), Some(JobStatus::Pending));
    channel.listener(0).on_transport_error(scribe_engine::ChannelError {
        kind: scribe_engine::ChannelFailure::Dropped,
        message: "stream ended before a terminal status".to_string(),
    });
    let view = settle(&mut manager).await;

    assert!(matches!(
        view.error,
        Some(ObservationError::ChannelTransport(_))
    ));
    assert_eq!(view.status(), Some(JobStatus::Pending));
    assert!(channel.is_closed(0));
}

#[tokio::test]
async fn snapshot_failure_can_be_retried() {
    let transport = Arc::new(FakeTransport::accepting("abc123", JobStatus::Pending).with_snapshots([
        Err(transport_error(FailureKind::Timeout, None)),
        Ok(snapshot(JobStatus::Completed, Some("Hello world"))),
    ]));
    let channel = Arc::new(FakeChannel::default());
    let mut manager = manager_with(&transport, &channel);

    manager.submit(SubmissionRequest::link("https://x/video", options()));
    manager.next_update().await;
    channel.emit(0, JobStatus::Completed, None);
    let view = settle(&mut manager).await;

    assert!(matches!(view.error, Some(ObservationError::SnapshotFetch(_))));
    assert_eq!(view.status(), Some(JobStatus::Completed));
    assert_eq!(view.transcript(), None);

    manager.retry_snapshot();
    let view = settle(&mut manager).await;
    assert_eq!(view.error, None);
    assert_eq!(view.transcript(), Some("Hello world"));
    assert_eq!(transport.snapshot_calls(), 2);
}

#[tokio::test]
async fn push_channel_end_to_end_over_http() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/transcribe-link"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"jobId":"abc123","status":"PENDING"}"#, "application/json"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/status/events/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            concat!(
                "event: status-update\ndata: {\"status\":\"PROCESSING\",\"message\":\"Transcribing\"}\n\n",
                "event: status-update\ndata: {\"status\":\"COMPLETED\"}\n\n",
            ),
            "text/event-stream",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/status/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"status":"COMPLETED","transcript":"Hello world"}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let transport_settings = TransportSettings {
        base_url: format!("{}/api", server.uri()),
        ..TransportSettings::default()
    };
    let mut manager =
        SubscriptionManager::connect(&transport_settings, &ManagerSettings::default())
            .expect("manager");

    manager.submit(SubmissionRequest::link("https://x/video", options()));
    let view = settle(&mut manager).await;

    assert_eq!(view.status(), Some(JobStatus::Completed));
    assert_eq!(view.transcript(), Some("Hello world"));
    assert_eq!(view.error, None);
}
