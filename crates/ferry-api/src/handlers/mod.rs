//! HTTP handlers, split by caller role.

pub mod app;
pub mod connect;
pub mod connector;

use std::time::{Duration, Instant};

use ferry_core::config::FerryConfig;
use ferry_core::RequestError;
use ferry_services::{Metrics, RequestBroker, SessionRegistry};

/// Shared state for every handler.
#[derive(Clone)]
pub struct ApiState {
    pub registry: SessionRegistry,
    pub broker: RequestBroker,
    pub metrics: Metrics,
    pub keepalive_interval: Duration,
    pub max_buffered_bytes: u64,
    pub max_chunk_size: u64,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(
        config: &FerryConfig,
        registry: SessionRegistry,
        broker: RequestBroker,
        metrics: Metrics,
    ) -> Self {
        Self {
            registry,
            broker,
            metrics,
            keepalive_interval: Duration::from_secs(config.channel.keepalive_interval_s),
            max_buffered_bytes: config.transfer.max_buffered_bytes,
            max_chunk_size: config.transfer.max_chunk_size,
            started_at: Instant::now(),
        }
    }
}

/// Cancels a pending request when the application handler's future is
/// dropped mid-wait. A no-op once the request is terminal, so completing
/// normally costs nothing.
pub(crate) struct CancelOnDisconnect {
    broker: RequestBroker,
    request_id: String,
}

impl CancelOnDisconnect {
    pub(crate) fn new(broker: RequestBroker, request_id: String) -> Self {
        Self { broker, request_id }
    }
}

impl Drop for CancelOnDisconnect {
    fn drop(&mut self) {
        let _ = self
            .broker
            .cancel(&self.request_id, RequestError::AppDisconnected);
    }
}

/// Node identifiers are MAC addresses by convention: lowercase,
/// hyphen-separated. Accept colon-separated input and fold case so both
/// sides of a transfer agree on the key.
pub(crate) fn normalize_mac(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace(':', "-")
}
