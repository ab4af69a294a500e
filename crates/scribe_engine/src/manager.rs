use std::sync::Arc;
use std::time::Duration;

use scribe_core::{
    update, Effect, HistoryEntry, JobId, JobStatus, Msg, ObservationId, Phase, SessionState,
    SessionView, StatusEvent, SubmissionRequest,
};
use scribe_logging::{scribe_debug, scribe_info, scribe_warn};
use tokio::sync::mpsc;

use crate::channel::{
    ChannelKind, ChannelListener, PollChannel, PushChannel, StatusChannel, Subscription,
    DEFAULT_POLL_INTERVAL,
};
use crate::transport::submit_request;
use crate::{ChannelError, ReqwestTransport, Transport, TransportError, TransportSettings};

/// Produces RFC 3339 timestamps for `Job::created_at`.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub channel: ChannelKind,
    pub poll_interval: Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            channel: ChannelKind::Push,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Caller's token for one observation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationHandle {
    observation: ObservationId,
}

impl ObservationHandle {
    pub fn id(&self) -> ObservationId {
        self.observation
    }
}

/// Owns one observation session at a time and the single live channel behind it.
///
/// All state changes happen inside [`SubscriptionManager::next_update`] on the
/// caller's task. Network calls and channels run on spawned tasks and only
/// report back through the message queue, tagged with their observation id so
/// that results for a cancelled or superseded observation are discarded.
pub struct SubscriptionManager {
    state: SessionState,
    transport: Arc<dyn Transport>,
    channel: Arc<dyn StatusChannel>,
    subscription: Option<Box<dyn Subscription>>,
    msg_tx: mpsc::UnboundedSender<Msg>,
    msg_rx: mpsc::UnboundedReceiver<Msg>,
    clock: Clock,
}

impl SubscriptionManager {
    pub fn new(transport: Arc<dyn Transport>, channel: Arc<dyn StatusChannel>) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        Self {
            state: SessionState::new(),
            transport,
            channel,
            subscription: None,
            msg_tx,
            msg_rx,
            clock: Arc::new(|| chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Builds the HTTP transport and the configured channel variant.
    pub fn connect(
        transport_settings: &TransportSettings,
        settings: &ManagerSettings,
    ) -> Result<Self, TransportError> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(transport_settings)?);
        let channel: Arc<dyn StatusChannel> = match settings.channel {
            ChannelKind::Push => Arc::new(PushChannel::new(transport_settings)?),
            ChannelKind::Poll => Arc::new(PollChannel::new(
                transport.clone(),
                settings.poll_interval,
            )),
        };
        Ok(Self::new(transport, channel))
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn view(&self) -> SessionView {
        self.state.view()
    }

    pub fn has_live_subscription(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|subscription| !subscription.is_closed())
    }

    /// Starts a submission. Returns `None` while another submission is in flight.
    pub fn submit(&mut self, request: SubmissionRequest) -> Option<ObservationHandle> {
        if self.state.phase() == Phase::Uploading {
            scribe_warn!("Submission ignored: another submission is in flight");
            return None;
        }
        let requested_at = (self.clock)();
        self.dispatch(Msg::SubmitRequested {
            request,
            requested_at,
        });
        self.current_handle()
    }

    /// Observes an existing job. A terminal `known_status` skips the live
    /// channel and fetches one snapshot; `None` looks the status up first.
    /// Returns `None` if no observation was started.
    pub fn observe(
        &mut self,
        job_id: JobId,
        known_status: Option<JobStatus>,
    ) -> Option<ObservationHandle> {
        let created_at = (self.clock)();
        self.observe_at(job_id, known_status, created_at)
    }

    /// Resumes a job picked from history, keeping its original creation time.
    pub fn resume(&mut self, entry: &HistoryEntry) -> Option<ObservationHandle> {
        self.observe_at(entry.id.clone(), Some(entry.status), entry.created_at.clone())
    }

    fn observe_at(
        &mut self,
        job_id: JobId,
        known_status: Option<JobStatus>,
        created_at: String,
    ) -> Option<ObservationHandle> {
        scribe_info!("Observing job {} (known status {:?})", job_id, known_status);
        self.dispatch(Msg::ObserveRequested {
            job_id,
            known_status,
            created_at,
        });
        self.current_handle()
    }

    /// Abandons the observation. No-op for a handle that was already superseded.
    pub fn cancel(&mut self, handle: &ObservationHandle) {
        self.dispatch(Msg::CancelRequested {
            observation: handle.observation,
        });
    }

    /// Retries the final snapshot fetch after a snapshot error.
    pub fn retry_snapshot(&mut self) {
        self.dispatch(Msg::RetrySnapshot);
    }

    /// Waits for the next queued message and applies it. Returns the new view
    /// when it changed, `None` when the message was stale or a no-op.
    pub async fn next_update(&mut self) -> Option<SessionView> {
        let msg = self.msg_rx.recv().await?;
        self.dispatch(msg).then(|| self.state.view())
    }

    /// Drives updates until nothing further happens without caller action.
    /// There is no processing timeout; wrap in `tokio::time::timeout` if needed.
    pub async fn settle(&mut self) -> SessionView {
        while !self.state.view().is_settled() {
            self.next_update().await;
        }
        self.state.view()
    }

    fn current_handle(&self) -> Option<ObservationHandle> {
        self.state
            .current_observation()
            .map(|observation| ObservationHandle { observation })
    }

    /// Applies one message and runs its effects. Returns whether state changed.
    fn dispatch(&mut self, msg: Msg) -> bool {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        for effect in effects {
            self.run_effect(effect);
        }
        self.state.consume_dirty()
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::CloseSubscription => self.close_subscription(),
            Effect::Submit {
                observation,
                request,
            } => {
                scribe_info!("Submitting {:?} (observation {})", request.source, observation);
                let transport = self.transport.clone();
                let tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    let msg = match submit_request(transport.as_ref(), request).await {
                        Ok(receipt) => {
                            scribe_info!("Job {} accepted as {}", receipt.job_id, receipt.status);
                            Msg::SubmitSucceeded {
                                observation,
                                job_id: receipt.job_id,
                                status: receipt.status,
                            }
                        }
                        Err(err) => {
                            scribe_warn!("Submission failed: {}", err);
                            Msg::SubmitFailed {
                                observation,
                                reason: err.reason(),
                            }
                        }
                    };
                    let _ = tx.send(msg);
                });
            }
            Effect::OpenChannel {
                observation,
                job_id,
            } => {
                // Never two live channels: the old one goes first.
                self.close_subscription();
                let listener = Arc::new(QueueListener {
                    observation,
                    tx: self.msg_tx.clone(),
                });
                self.subscription = Some(self.channel.open(&job_id, listener));
            }
            Effect::FetchSnapshot {
                observation,
                job_id,
            } => {
                let transport = self.transport.clone();
                let tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    let msg = match transport.fetch_snapshot(&job_id).await {
                        Ok(snapshot) => Msg::SnapshotFetched {
                            observation,
                            snapshot,
                        },
                        Err(err) => {
                            scribe_warn!("Snapshot fetch for job {} failed: {}", job_id, err);
                            Msg::SnapshotFailed {
                                observation,
                                reason: err.reason(),
                            }
                        }
                    };
                    let _ = tx.send(msg);
                });
            }
        }
    }

    fn close_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            scribe_debug!("Releasing subscription for job {}", subscription.job_id());
            subscription.close();
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.close_subscription();
    }
}

/// Forwards channel callbacks into the manager's queue.
struct QueueListener {
    observation: ObservationId,
    tx: mpsc::UnboundedSender<Msg>,
}

impl ChannelListener for QueueListener {
    fn on_event(&self, event: StatusEvent) {
        let _ = self.tx.send(Msg::ChannelEvent {
            observation: self.observation,
            event,
        });
    }

    fn on_transport_error(&self, error: ChannelError) {
        let _ = self.tx.send(Msg::ChannelLost {
            observation: self.observation,
            reason: error.to_string(),
        });
    }
}
