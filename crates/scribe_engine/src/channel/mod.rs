//! Live status channels: one listener, one job, one cancelable subscription.
mod poll;
mod push;
mod sse;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use scribe_core::{JobId, StatusEvent};
use tokio_util::sync::CancellationToken;

use crate::ChannelError;

pub use poll::{PollChannel, PollSubscription, DEFAULT_POLL_INTERVAL};
pub use push::{PushChannel, PushSubscription, STATUS_EVENT_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelKind {
    /// Server-sent events stream.
    #[default]
    Push,
    /// Periodic snapshot fetches, for servers or proxies without streaming.
    Poll,
}

/// Receives status events in server order, then at most one transport error.
/// Nothing is delivered after the subscription is closed.
pub trait ChannelListener: Send + Sync {
    fn on_event(&self, event: StatusEvent);
    fn on_transport_error(&self, error: ChannelError);
}

/// Uniform handle over push and poll channels.
pub trait Subscription: Send {
    fn job_id(&self) -> &JobId;

    /// Idempotent; safe after the remote end or the channel itself finished.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

pub trait StatusChannel: Send + Sync {
    /// Starts delivering events for `job_id`. Must be called within a tokio runtime.
    fn open(&self, job_id: &JobId, listener: Arc<dyn ChannelListener>) -> Box<dyn Subscription>;
}

/// Shared lifetime state between a subscription handle and its task.
#[derive(Debug, Clone, Default)]
pub(crate) struct ChannelGuard {
    token: CancellationToken,
    finished: Arc<AtomicBool>,
}

impl ChannelGuard {
    pub(crate) fn close(&self) {
        self.token.cancel();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.token.is_cancelled() || self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn delivery(&self, listener: Arc<dyn ChannelListener>) -> Delivery {
        Delivery {
            listener,
            guard: self.clone(),
        }
    }
}

/// Task-side listener wrapper. Consuming `fail`/`finish` makes the error
/// callback happen at most once, and every callback is skipped once closed.
pub(crate) struct Delivery {
    listener: Arc<dyn ChannelListener>,
    guard: ChannelGuard,
}

impl Delivery {
    pub(crate) fn token(&self) -> CancellationToken {
        self.guard.token.clone()
    }

    /// Returns `false` when the subscription was closed and the event dropped.
    pub(crate) fn event(&self, event: StatusEvent) -> bool {
        if self.guard.token.is_cancelled() {
            return false;
        }
        self.listener.on_event(event);
        true
    }

    pub(crate) fn fail(self, error: ChannelError) {
        if !self.guard.token.is_cancelled() {
            self.listener.on_transport_error(error);
        }
        self.finish();
    }

    pub(crate) fn finish(self) {
        self.guard.finished.store(true, Ordering::Release);
        self.guard.token.cancel();
    }
}
