//! Scribe engine: transport, live status channels and the subscription manager.
pub mod channel;
mod manager;
mod persist;
mod transport;
mod types;

pub use channel::{
    ChannelKind, ChannelListener, PollChannel, PollSubscription, PushChannel, PushSubscription,
    StatusChannel, Subscription, DEFAULT_POLL_INTERVAL, STATUS_EVENT_NAME,
};
pub use manager::{Clock, ManagerSettings, ObservationHandle, SubscriptionManager};
pub use persist::{ensure_output_dir, export_filename, save_export, AtomicFileWriter, PersistError};
pub use transport::{
    submit_request, ReqwestTransport, Transport, TransportSettings, DEFAULT_BASE_URL,
};
pub use types::{
    ChannelError, ChannelFailure, CurrentUser, FailureKind, SubmitReceipt, TransportError,
};
