use std::sync::Arc;
use std::time::Duration;

use scribe_core::{JobId, StatusEvent};
use scribe_logging::{scribe_debug, scribe_info, scribe_warn};
use tokio::time::MissedTickBehavior;

use super::{ChannelGuard, ChannelListener, Delivery, StatusChannel, Subscription};
use crate::{ChannelError, ChannelFailure, Transport};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Snapshot polling with the same contract as the push channel. An event is
/// delivered whenever status or message differs from the last one delivered.
#[derive(Clone)]
pub struct PollChannel {
    transport: Arc<dyn Transport>,
    interval: Duration,
}

impl PollChannel {
    pub fn new(transport: Arc<dyn Transport>, interval: Duration) -> Self {
        Self {
            transport,
            interval: interval.max(MIN_POLL_INTERVAL),
        }
    }
}

impl StatusChannel for PollChannel {
    fn open(&self, job_id: &JobId, listener: Arc<dyn ChannelListener>) -> Box<dyn Subscription> {
        let guard = ChannelGuard::default();
        let delivery = guard.delivery(listener);
        let transport = self.transport.clone();
        let interval = self.interval;
        let task_job_id = job_id.clone();

        scribe_info!("Polling job {} every {:?}", job_id, interval);
        tokio::spawn(async move {
            run_poll(transport, task_job_id, interval, delivery).await;
        });

        Box::new(PollSubscription {
            job_id: job_id.clone(),
            guard,
        })
    }
}

pub struct PollSubscription {
    job_id: JobId,
    guard: ChannelGuard,
}

impl Subscription for PollSubscription {
    fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn close(&self) {
        if !self.guard.is_closed() {
            scribe_debug!("Stopping poller for job {}", self.job_id);
        }
        self.guard.close();
    }

    fn is_closed(&self) -> bool {
        self.guard.is_closed()
    }
}

impl Drop for PollSubscription {
    fn drop(&mut self) {
        self.guard.close();
    }
}

async fn run_poll(
    transport: Arc<dyn Transport>,
    job_id: JobId,
    interval: Duration,
    delivery: Delivery,
) {
    let token = delivery.token();
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        outcome = poll_until_terminal(transport.as_ref(), &job_id, interval, &delivery) => Some(outcome),
    };

    match outcome {
        None => scribe_debug!("Poller for job {} closed by caller", job_id),
        Some(Ok(())) => delivery.finish(),
        Some(Err(err)) => {
            scribe_warn!("Poller for job {} failed: {}", job_id, err);
            delivery.fail(err);
        }
    }
}

async fn poll_until_terminal(
    transport: &dyn Transport,
    job_id: &JobId,
    interval: Duration,
    delivery: &Delivery,
) -> Result<(), ChannelError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<StatusEvent> = None;

    loop {
        ticker.tick().await;
        let snapshot = transport
            .fetch_snapshot(job_id)
            .await
            .map_err(|err| ChannelError::new(ChannelFailure::Poll, err.to_string()))?;

        let event = StatusEvent::new(snapshot.status, snapshot.message);
        if last.as_ref() == Some(&event) {
            continue;
        }
        let terminal = event.status.is_terminal();
        if !delivery.event(event.clone()) || terminal {
            return Ok(());
        }
        last = Some(event);
    }
}
