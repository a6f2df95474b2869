//! Request broker — allocates request identifiers, publishes pending
//! requests, and rendezvous connector uploads with waiting applications.
//!
//! The pending table is the critical datum. Each entry carries a small
//! mutex-guarded state block; every mutation goes through that critical
//! section, which is what enforces the single-transition-to-terminal
//! invariant. The waitable is a oneshot sender taken under the lock, so
//! it is released exactly once no matter how delivery, deadline expiry,
//! and cancellation race. First writer wins; losers see `unknown_request`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use ferry_core::config::FerryConfig;
use ferry_core::frame::{Command, CommandFrame, PushFrame};
use ferry_core::timing::RequestTimings;
use ferry_core::RequestError;

use crate::metrics::Metrics;
use crate::session::{SessionRegistry, SessionSendError};
use crate::stream::{stream_pipe, EnqueueError, StreamConsumer, StreamProducer};

/// Transfer pattern of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Buffered: the connector uploads the whole payload in one POST.
    Sync,
    /// Streamed: the connector uploads ordered chunks, relayed live.
    Stream,
    /// Offloaded: the connector uploads to the object store and hands
    /// back a URL.
    Offload,
}

impl Pattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::Sync => "sync",
            Pattern::Stream => "stream",
            Pattern::Offload => "offload",
        }
    }

    fn command(&self) -> Command {
        match self {
            Pattern::Sync => Command::GetDataset,
            Pattern::Stream => Command::GetDatasetStream,
            Pattern::Offload => Command::GetDatasetOffload,
        }
    }
}

/// Lifecycle state of a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Streaming,
    Fulfilled,
    Failed,
    TimedOut,
    Cancelled,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Pending => "pending",
            RequestState::Streaming => "streaming",
            RequestState::Fulfilled => "fulfilled",
            RequestState::Failed => "failed",
            RequestState::TimedOut => "timed_out",
            RequestState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Fulfilled
                | RequestState::Failed
                | RequestState::TimedOut
                | RequestState::Cancelled
        )
    }
}

/// What a fulfilled sync/offload request resolves to.
#[derive(Debug)]
pub enum UnaryOutcome {
    Data(Bytes),
    Offload {
        download_url: String,
        size_bytes: u64,
        expires_at: Option<String>,
    },
}

/// The handle an application-facing handler blocks on.
#[derive(Debug)]
pub enum Waiter {
    Unary(oneshot::Receiver<Result<UnaryOutcome, RequestError>>),
    Stream(StreamConsumer),
}

/// One pending request. Immutable identity fields plus a mutex-guarded
/// state block.
#[derive(Debug)]
pub struct PendingRequest {
    pub id: String,
    pub mac: String,
    pub dataset: String,
    pub pattern: Pattern,
    pub created_at: Instant,
    pub deadline: Instant,
    pub processing_delay_ms: Option<u64>,
    inner: StdMutex<RequestInner>,
}

#[derive(Debug)]
struct RequestInner {
    state: RequestState,
    error: Option<RequestError>,
    unary_tx: Option<oneshot::Sender<Result<UnaryOutcome, RequestError>>>,
    producer: Option<Arc<AsyncMutex<StreamProducer>>>,
    timings: RequestTimings,
    dispatched_generation: Option<u64>,
    size_bytes: Option<u64>,
    total_chunks: Option<u64>,
    terminal_at: Option<Instant>,
}

impl PendingRequest {
    fn lock(&self) -> MutexGuard<'_, RequestInner> {
        // a poisoned entry lock means a panic mid-transition; the state
        // block is plain data, continuing is safe
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> RequestState {
        self.lock().state
    }

    pub fn timings(&self) -> RequestTimings {
        self.lock().timings
    }
}

/// Status endpoint row.
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub request_id: String,
    pub mac: String,
    pub dataset: String,
    pub pattern: &'static str,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub timings: RequestTimings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub error: &'static str,
    pub message: String,
}

/// Tunables the broker needs, lifted out of the full config.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub request_timeout: Duration,
    pub max_buffered_bytes: u64,
    pub max_chunk_size: u64,
    pub stream_queue_depth: usize,
    pub chunk_enqueue_wait: Duration,
    pub status_retention: Duration,
    pub object_store_url: Option<String>,
}

impl BrokerSettings {
    pub fn from_config(config: &FerryConfig) -> Self {
        let t = &config.transfer;
        Self {
            request_timeout: Duration::from_secs(t.request_timeout_s),
            max_buffered_bytes: t.max_buffered_bytes,
            max_chunk_size: t.max_chunk_size,
            stream_queue_depth: t.stream_queue_depth,
            chunk_enqueue_wait: Duration::from_millis(t.chunk_enqueue_wait_ms),
            status_retention: Duration::from_secs(t.status_retention_s),
            object_store_url: if config.offload.object_store_url.is_empty() {
                None
            } else {
                Some(config.offload.object_store_url.clone())
            },
        }
    }
}

#[derive(Clone)]
pub struct RequestBroker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    table: DashMap<String, Arc<PendingRequest>>,
    registry: SessionRegistry,
    metrics: Metrics,
    settings: BrokerSettings,
    draining: AtomicBool,
}

impl RequestBroker {
    pub fn new(registry: SessionRegistry, metrics: Metrics, settings: BrokerSettings) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                table: DashMap::new(),
                registry,
                metrics,
                settings,
                draining: AtomicBool::new(false),
            }),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    // ── Rendezvous primitives ─────────────────────────────────────────────

    /// Insert a pending record and hand back the waitable.
    pub fn begin(
        &self,
        mac: &str,
        dataset: &str,
        pattern: Pattern,
        timeout_override: Option<Duration>,
        processing_delay_ms: Option<u64>,
    ) -> Result<(Arc<PendingRequest>, Waiter), RequestError> {
        if self.inner.draining.load(Ordering::Relaxed) {
            return Err(RequestError::Shutdown);
        }

        let timeout = timeout_override.unwrap_or(self.inner.settings.request_timeout);
        let now = Instant::now();

        let (unary_tx, producer, waiter) = match pattern {
            Pattern::Sync | Pattern::Offload => {
                let (tx, rx) = oneshot::channel();
                (Some(tx), None, Waiter::Unary(rx))
            }
            Pattern::Stream => {
                let (producer, consumer) = stream_pipe(self.inner.settings.stream_queue_depth);
                (
                    None,
                    Some(Arc::new(AsyncMutex::new(producer))),
                    Waiter::Stream(consumer),
                )
            }
        };

        let mut timings = RequestTimings::default();
        timings.mark_recv();

        let request = Arc::new(PendingRequest {
            id: new_request_id(),
            mac: mac.to_string(),
            dataset: dataset.to_string(),
            pattern,
            created_at: now,
            deadline: now + timeout,
            processing_delay_ms,
            inner: StdMutex::new(RequestInner {
                state: RequestState::Pending,
                error: None,
                unary_tx,
                producer,
                timings,
                dispatched_generation: None,
                size_bytes: None,
                total_chunks: None,
                terminal_at: None,
            }),
        });

        self.inner
            .table
            .insert(request.id.clone(), request.clone());
        self.inner.metrics.request_started(pattern);

        tracing::debug!(
            request_id = %request.id,
            mac,
            dataset,
            pattern = pattern.as_str(),
            timeout_s = timeout.as_secs(),
            "request registered"
        );

        // deadline enforcement; cancel no-ops if the request settled first
        let broker = self.clone();
        let id = request.id.clone();
        let deadline = request.deadline;
        tokio::spawn(async move {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
            let _ = broker.cancel(&id, RequestError::Timeout);
        });

        Ok((request, waiter))
    }

    /// Send the command frame for a pending record over its connector's
    /// push channel. An absent or dead session fails the record.
    pub async fn dispatch(&self, request: &Arc<PendingRequest>) -> Result<(), RequestError> {
        let frame = PushFrame::Command(CommandFrame {
            command: request.pattern.command(),
            request_id: request.id.clone(),
            dataset_name: request.dataset.clone(),
            processing_delay_ms: request.processing_delay_ms,
            object_store_url: match request.pattern {
                Pattern::Offload => self.inner.settings.object_store_url.clone(),
                _ => None,
            },
        });

        match self.inner.registry.send(&request.mac, frame).await {
            Ok(generation) => {
                let mut inner = request.lock();
                if !inner.state.is_terminal() {
                    inner.dispatched_generation = Some(generation);
                    inner.timings.mark_dispatch();
                }
                tracing::debug!(
                    request_id = %request.id,
                    mac = %request.mac,
                    generation,
                    "command dispatched"
                );
                Ok(())
            }
            Err(SessionSendError::NoSuchConnector) => {
                let err = RequestError::NoSuchConnector;
                self.settle_err(request, err.clone());
                Err(err)
            }
            Err(SessionSendError::SendFailed) => {
                let err = RequestError::ConnectorDisconnected;
                self.settle_err(request, err.clone());
                Err(err)
            }
        }
    }

    /// Sync upload: the whole payload in one delivery.
    pub fn deliver_data(&self, id: &str, data: Bytes) -> Result<(), RequestError> {
        let request = self.entry(id)?;
        if request.state().is_terminal() {
            return Err(RequestError::UnknownRequest);
        }
        if request.pattern != Pattern::Sync {
            return Err(RequestError::ProtocolViolation(format!(
                "buffered upload for a {} request",
                request.pattern.as_str()
            )));
        }

        if data.len() as u64 > self.inner.settings.max_buffered_bytes {
            // the request fails; the partial body is not stored
            self.settle_err(&request, RequestError::PayloadTooLarge);
            return Err(RequestError::PayloadTooLarge);
        }

        let size = data.len() as u64;
        {
            let mut inner = request.lock();
            if inner.state.is_terminal() {
                return Err(RequestError::UnknownRequest);
            }
            inner.timings.mark_result_recv();
            inner.size_bytes = Some(size);
            inner.state = RequestState::Fulfilled;
            inner.terminal_at = Some(Instant::now());
            if let Some(tx) = inner.unary_tx.take() {
                let _ = tx.send(Ok(UnaryOutcome::Data(data)));
            }
        }

        self.inner.metrics.request_fulfilled();
        self.inner.metrics.buffered_bytes(size);
        tracing::info!(request_id = %id, size_bytes = size, "sync result delivered");
        Ok(())
    }

    /// Offload upload: the connector hands back an object-store URL.
    pub fn deliver_offload(
        &self,
        id: &str,
        download_url: String,
        size_bytes: u64,
        expires_at: Option<String>,
    ) -> Result<(), RequestError> {
        let request = self.entry(id)?;
        if request.state().is_terminal() {
            return Err(RequestError::UnknownRequest);
        }
        if request.pattern != Pattern::Offload {
            return Err(RequestError::ProtocolViolation(format!(
                "offload upload for a {} request",
                request.pattern.as_str()
            )));
        }

        {
            let mut inner = request.lock();
            if inner.state.is_terminal() {
                return Err(RequestError::UnknownRequest);
            }
            inner.timings.mark_result_recv();
            inner.size_bytes = Some(size_bytes);
            inner.state = RequestState::Fulfilled;
            inner.terminal_at = Some(Instant::now());
            if let Some(tx) = inner.unary_tx.take() {
                let _ = tx.send(Ok(UnaryOutcome::Offload {
                    download_url,
                    size_bytes,
                    expires_at,
                }));
            }
        }

        self.inner.metrics.request_fulfilled();
        self.inner.metrics.offload_handoff();
        tracing::info!(request_id = %id, size_bytes, "offload URL delivered");
        Ok(())
    }

    /// The connector reported failure instead of a result.
    pub fn deliver_failure(&self, id: &str, message: String) -> Result<(), RequestError> {
        let request = self.entry(id)?;
        if !self.settle_err(&request, RequestError::OffloadFailed(message)) {
            return Err(RequestError::UnknownRequest);
        }
        Ok(())
    }

    /// Transition a non-terminal record to its terminal state and release
    /// the waitable. `unknown_request` if absent or already terminal.
    pub fn cancel(&self, id: &str, reason: RequestError) -> Result<(), RequestError> {
        let request = self.entry(id)?;
        if self.settle_err(&request, reason) {
            Ok(())
        } else {
            Err(RequestError::UnknownRequest)
        }
    }

    /// Observation only.
    pub fn get(&self, id: &str) -> Option<StatusSnapshot> {
        let request = self.entry(id).ok()?;
        let inner = request.lock();
        Some(StatusSnapshot {
            request_id: request.id.clone(),
            mac: request.mac.clone(),
            dataset: request.dataset.clone(),
            pattern: request.pattern.as_str(),
            state: inner.state.as_str(),
            error: inner.error.as_ref().map(|e| ErrorDetail {
                error: e.kind(),
                message: e.to_string(),
            }),
            timings: inner.timings,
            size_bytes: inner.size_bytes,
            total_chunks: inner.total_chunks,
        })
    }

    /// Record that the application response finished.
    pub fn mark_responded(&self, request: &PendingRequest) {
        request.lock().timings.mark_respond();
    }

    // ── Stream operations ─────────────────────────────────────────────────

    /// `POST /datasets/stream/init` — mark the record streaming-active.
    pub fn stream_init(
        &self,
        id: &str,
        total_size: Option<u64>,
        chunk_size: Option<u64>,
    ) -> Result<(), RequestError> {
        let request = self.entry(id)?;
        {
            let mut inner = request.lock();
            if inner.state.is_terminal() {
                return Err(stream_terminal_error(inner.state));
            }
            if request.pattern != Pattern::Stream {
                return Err(RequestError::ProtocolViolation(format!(
                    "stream init for a {} request",
                    request.pattern.as_str()
                )));
            }
            if inner.state == RequestState::Streaming {
                // connector retry; nothing to redo
                return Ok(());
            }
            inner.state = RequestState::Streaming;
            inner.timings.mark_result_recv();
        }

        self.inner.metrics.stream_opened();
        tracing::debug!(request_id = %id, ?total_size, ?chunk_size, "stream opened");
        Ok(())
    }

    /// `POST /datasets/stream/chunk` — enqueue one chunk, blocking up to
    /// the configured wait when the pipe is full.
    pub async fn stream_chunk(&self, id: &str, seq: u64, data: Bytes) -> Result<(), RequestError> {
        let request = self.entry(id)?;

        if data.len() as u64 > self.inner.settings.max_chunk_size {
            self.settle_err(&request, RequestError::PayloadTooLarge);
            return Err(RequestError::PayloadTooLarge);
        }

        let producer = self.stream_producer(&request)?;
        let size = data.len() as u64;

        let mut producer = producer.lock().await;
        match producer
            .push_chunk(seq, data, self.inner.settings.chunk_enqueue_wait)
            .await
        {
            Ok(()) => {
                drop(producer);
                let mut inner = request.lock();
                *inner.size_bytes.get_or_insert(0) += size;
                drop(inner);
                self.inner.metrics.stream_chunk(size);
                Ok(())
            }
            Err(EnqueueError::Gap { expected, got }) => {
                drop(producer);
                let err = RequestError::ProtocolViolation(format!(
                    "chunk sequence gap: expected {expected}, got {got}"
                ));
                self.settle_err(&request, err.clone());
                Err(err)
            }
            Err(EnqueueError::Full) => Err(RequestError::Backpressure),
            Err(EnqueueError::Closed) => {
                drop(producer);
                self.settle_err(&request, RequestError::AppDisconnected);
                Err(RequestError::StreamGone)
            }
            Err(EnqueueError::Finished) => Err(RequestError::ProtocolViolation(
                "chunk after stream completion".to_string(),
            )),
        }
    }

    /// `POST /datasets/stream/complete` — enqueue the terminal sentinel.
    pub async fn stream_complete(&self, id: &str, total_chunks: u64) -> Result<(), RequestError> {
        let request = self.entry(id)?;
        let producer = self.stream_producer(&request)?;

        let mut producer = producer.lock().await;
        match producer
            .finish(total_chunks, self.inner.settings.chunk_enqueue_wait)
            .await
        {
            Ok(()) => {
                drop(producer);
                let fulfilled = {
                    let mut inner = request.lock();
                    if inner.state.is_terminal() {
                        false
                    } else {
                        inner.state = RequestState::Fulfilled;
                        inner.total_chunks = Some(total_chunks);
                        inner.terminal_at = Some(Instant::now());
                        true
                    }
                };
                if fulfilled {
                    self.inner.metrics.request_fulfilled();
                    self.inner.metrics.stream_closed();
                    tracing::info!(request_id = %id, total_chunks, "stream completed");
                }
                Ok(())
            }
            Err(EnqueueError::Gap { expected, got }) => {
                drop(producer);
                let err = RequestError::ProtocolViolation(format!(
                    "completion total {got} does not match {expected} accepted chunks"
                ));
                self.settle_err(&request, err.clone());
                Err(err)
            }
            Err(EnqueueError::Full) => Err(RequestError::Backpressure),
            Err(EnqueueError::Closed) => {
                drop(producer);
                self.settle_err(&request, RequestError::AppDisconnected);
                Err(RequestError::StreamGone)
            }
            Err(EnqueueError::Finished) => Err(RequestError::ProtocolViolation(
                "duplicate stream completion".to_string(),
            )),
        }
    }

    /// `POST /datasets/stream/error` — terminal error sentinel.
    pub async fn stream_error(&self, id: &str, message: String) -> Result<(), RequestError> {
        let request = self.entry(id)?;
        let producer = self.stream_producer(&request)?;

        let mut producer = producer.lock().await;
        match producer
            .fail(message.clone(), self.inner.settings.chunk_enqueue_wait)
            .await
        {
            Ok(()) => {
                drop(producer);
                self.settle_err(&request, RequestError::OffloadFailed(message));
                Ok(())
            }
            Err(EnqueueError::Full) => Err(RequestError::Backpressure),
            Err(EnqueueError::Closed) => {
                drop(producer);
                self.settle_err(&request, RequestError::AppDisconnected);
                Err(RequestError::StreamGone)
            }
            Err(EnqueueError::Finished | EnqueueError::Gap { .. }) => Err(
                RequestError::ProtocolViolation("error after stream completion".to_string()),
            ),
        }
    }

    // ── Session-loss and shutdown paths ───────────────────────────────────

    /// Fail every non-terminal request that was dispatched to `mac` on a
    /// generation at or below `generation`. Requests dispatched to a
    /// replacement session are untouched.
    pub fn fail_all_for_connector(&self, mac: &str, generation: u64, reason: RequestError) {
        let victims: Vec<Arc<PendingRequest>> = self
            .inner
            .table
            .iter()
            .filter(|entry| {
                let req = entry.value();
                if req.mac != mac {
                    return false;
                }
                let inner = req.lock();
                !inner.state.is_terminal()
                    && inner
                        .dispatched_generation
                        .is_some_and(|g| g <= generation)
            })
            .map(|entry| entry.value().clone())
            .collect();

        for request in victims {
            self.settle_err(&request, reason.clone());
        }
    }

    /// Shutdown drain: refuse new requests, cancel everything pending.
    pub fn begin_drain(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
        let pending: Vec<Arc<PendingRequest>> = self
            .inner
            .table
            .iter()
            .filter(|e| !e.value().lock().state.is_terminal())
            .map(|e| e.value().clone())
            .collect();
        let count = pending.len();
        for request in pending {
            self.settle_err(&request, RequestError::Shutdown);
        }
        if count > 0 {
            tracing::info!(cancelled = count, "pending requests cancelled for shutdown");
        }
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }

    // ── Janitor ───────────────────────────────────────────────────────────

    /// Drop terminal records older than the retention window.
    pub fn sweep_terminal(&self) {
        let retention = self.inner.settings.status_retention;
        self.inner.table.retain(|_, request| {
            let inner = request.lock();
            match inner.terminal_at {
                Some(at) => at.elapsed() <= retention,
                None => true,
            }
        });
    }

    pub fn spawn_janitor(&self) -> tokio::task::JoinHandle<()> {
        let broker = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                broker.sweep_terminal();
            }
        })
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn entry(&self, id: &str) -> Result<Arc<PendingRequest>, RequestError> {
        self.inner
            .table
            .get(id)
            .map(|e| e.value().clone())
            .ok_or(RequestError::UnknownRequest)
    }

    /// Shared state-check for the stream upload endpoints: hand out the
    /// producer only while the record is streaming-active.
    fn stream_producer(
        &self,
        request: &Arc<PendingRequest>,
    ) -> Result<Arc<AsyncMutex<StreamProducer>>, RequestError> {
        let inner = request.lock();
        if inner.state.is_terminal() {
            return Err(stream_terminal_error(inner.state));
        }
        if request.pattern != Pattern::Stream {
            return Err(RequestError::ProtocolViolation(format!(
                "stream upload for a {} request",
                request.pattern.as_str()
            )));
        }
        if inner.state == RequestState::Pending {
            return Err(RequestError::ProtocolViolation(
                "chunk before stream init".to_string(),
            ));
        }
        inner
            .producer
            .clone()
            .ok_or_else(|| RequestError::Internal("stream pipe missing".to_string()))
    }

    /// The one terminal-transition path for errors. Returns false if the
    /// record was already terminal (first writer won).
    fn settle_err(&self, request: &Arc<PendingRequest>, err: RequestError) -> bool {
        let stream_was_active;
        let terminal_state;
        {
            let mut inner = request.lock();
            if inner.state.is_terminal() {
                return false;
            }
            stream_was_active = inner.state == RequestState::Streaming;
            terminal_state = match err {
                RequestError::Timeout => RequestState::TimedOut,
                RequestError::AppDisconnected | RequestError::Shutdown => RequestState::Cancelled,
                _ => RequestState::Failed,
            };
            inner.state = terminal_state;
            inner.error = Some(err.clone());
            inner.terminal_at = Some(Instant::now());
            inner.timings.mark_respond();
            // closing the pipe: once in-flight uploads release their
            // producer clone, the consumer sees end-of-stream
            inner.producer = None;
            if let Some(tx) = inner.unary_tx.take() {
                let _ = tx.send(Err(err.clone()));
            }
        }

        match terminal_state {
            RequestState::TimedOut => self.inner.metrics.request_timed_out(),
            RequestState::Cancelled => self.inner.metrics.request_cancelled(),
            _ => self.inner.metrics.request_failed(),
        }
        if stream_was_active {
            self.inner.metrics.stream_closed();
        }

        tracing::info!(
            request_id = %request.id,
            mac = %request.mac,
            error = err.kind(),
            state = terminal_state.as_str(),
            "request settled"
        );
        true
    }
}

/// What a stream upload sees when the record is already terminal: the
/// application side is gone for cancelled/expired streams, everything
/// else is indistinguishable from an unknown id.
fn stream_terminal_error(state: RequestState) -> RequestError {
    match state {
        RequestState::Cancelled | RequestState::TimedOut => RequestError::StreamGone,
        _ => RequestError::UnknownRequest,
    }
}

fn new_request_id() -> String {
    let id: u128 = rand::random();
    hex::encode(id.to_be_bytes())
}
