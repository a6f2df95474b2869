//! ferry-services — the router core: connector session registry, request
//! broker with the pending-request table, the stream chunk pipe, and the
//! observability counters.

pub mod broker;
pub mod metrics;
pub mod session;
pub mod stream;

pub use broker::{
    BrokerSettings, Pattern, PendingRequest, RequestBroker, RequestState, StatusSnapshot,
    UnaryOutcome, Waiter,
};
pub use metrics::{Metrics, MetricsSnapshot};
pub use session::{
    ConnectorSession, Registration, SessionInfo, SessionRegistry, SessionSendError,
    TryEnqueueError,
};
pub use stream::{StreamConsumer, StreamItem};
