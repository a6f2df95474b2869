//! Observability counters.
//!
//! Every broker and registry state transition calls a hook here. The
//! counters are plain atomics behind a cheap cloneable handle; the
//! metrics backend is external and scrapes the JSON snapshot.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::broker::Pattern;

#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    requests_sync: AtomicU64,
    requests_stream: AtomicU64,
    requests_offload: AtomicU64,
    requests_fulfilled: AtomicU64,
    requests_failed: AtomicU64,
    requests_timed_out: AtomicU64,
    requests_cancelled: AtomicU64,
    buffered_bytes_total: AtomicU64,
    streamed_bytes_total: AtomicU64,
    stream_chunks_total: AtomicU64,
    offload_handoffs_total: AtomicU64,
    sessions_connected_total: AtomicU64,
    active_sessions: AtomicU64,
    active_streams: AtomicU64,
    pending_requests: AtomicU64,
}

/// Point-in-time copy of every counter, as served by GET /metrics.
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub requests_sync: u64,
    pub requests_stream: u64,
    pub requests_offload: u64,
    pub requests_fulfilled: u64,
    pub requests_failed: u64,
    pub requests_timed_out: u64,
    pub requests_cancelled: u64,
    pub buffered_bytes_total: u64,
    pub streamed_bytes_total: u64,
    pub stream_chunks_total: u64,
    pub offload_handoffs_total: u64,
    pub sessions_connected_total: u64,
    pub active_sessions: u64,
    pub active_streams: u64,
    pub pending_requests: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Request lifecycle hooks ───────────────────────────────────────────

    pub fn request_started(&self, pattern: Pattern) {
        let counter = match pattern {
            Pattern::Sync => &self.inner.requests_sync,
            Pattern::Stream => &self.inner.requests_stream,
            Pattern::Offload => &self.inner.requests_offload,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.inner.pending_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_fulfilled(&self) {
        self.inner.requests_fulfilled.fetch_add(1, Ordering::Relaxed);
        self.request_settled();
    }

    pub fn request_failed(&self) {
        self.inner.requests_failed.fetch_add(1, Ordering::Relaxed);
        self.request_settled();
    }

    pub fn request_timed_out(&self) {
        self.inner.requests_timed_out.fetch_add(1, Ordering::Relaxed);
        self.request_settled();
    }

    pub fn request_cancelled(&self) {
        self.inner.requests_cancelled.fetch_add(1, Ordering::Relaxed);
        self.request_settled();
    }

    fn request_settled(&self) {
        saturating_dec(&self.inner.pending_requests);
    }

    // ── Transfer hooks ────────────────────────────────────────────────────

    pub fn buffered_bytes(&self, n: u64) {
        self.inner.buffered_bytes_total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn stream_chunk(&self, bytes: u64) {
        self.inner.stream_chunks_total.fetch_add(1, Ordering::Relaxed);
        self.inner.streamed_bytes_total.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn stream_opened(&self) {
        self.inner.active_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_closed(&self) {
        saturating_dec(&self.inner.active_streams);
    }

    pub fn offload_handoff(&self) {
        self.inner.offload_handoffs_total.fetch_add(1, Ordering::Relaxed);
    }

    // ── Session hooks ─────────────────────────────────────────────────────

    pub fn session_opened(&self) {
        self.inner.sessions_connected_total.fetch_add(1, Ordering::Relaxed);
        self.inner.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        saturating_dec(&self.inner.active_sessions);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let i = &self.inner;
        MetricsSnapshot {
            requests_sync: i.requests_sync.load(Ordering::Relaxed),
            requests_stream: i.requests_stream.load(Ordering::Relaxed),
            requests_offload: i.requests_offload.load(Ordering::Relaxed),
            requests_fulfilled: i.requests_fulfilled.load(Ordering::Relaxed),
            requests_failed: i.requests_failed.load(Ordering::Relaxed),
            requests_timed_out: i.requests_timed_out.load(Ordering::Relaxed),
            requests_cancelled: i.requests_cancelled.load(Ordering::Relaxed),
            buffered_bytes_total: i.buffered_bytes_total.load(Ordering::Relaxed),
            streamed_bytes_total: i.streamed_bytes_total.load(Ordering::Relaxed),
            stream_chunks_total: i.stream_chunks_total.load(Ordering::Relaxed),
            offload_handoffs_total: i.offload_handoffs_total.load(Ordering::Relaxed),
            sessions_connected_total: i.sessions_connected_total.load(Ordering::Relaxed),
            active_sessions: i.active_sessions.load(Ordering::Relaxed),
            active_streams: i.active_streams.load(Ordering::Relaxed),
            pending_requests: i.pending_requests.load(Ordering::Relaxed),
        }
    }
}

/// Decrement a gauge without wrapping below zero if hooks race.
fn saturating_dec(counter: &AtomicU64) {
    let mut current = counter.load(Ordering::Relaxed);
    while current > 0 {
        match counter.compare_exchange_weak(
            current,
            current - 1,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(observed) => current = observed,
        }
    }
}
