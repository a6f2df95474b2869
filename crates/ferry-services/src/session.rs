//! Session registry — tracks live connector push channels.
//!
//! One session per node identifier (MAC), last writer wins. The registry
//! owns only the outbound frame queue of each session; the transport task
//! behind /connect owns the socket and drains the queue, which keeps the
//! registry indifferent to whether a session rides SSE or WebSocket and
//! gives each channel a single writer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{mpsc, Notify};

use ferry_core::frame::PushFrame;

use crate::metrics::Metrics;

/// A live push channel to one connector.
pub struct ConnectorSession {
    pub mac: String,
    /// Monotonic across the registry's lifetime. A replacement session
    /// for the same MAC always has a higher generation, which is what
    /// makes unregister idempotent and lets the broker fail exactly the
    /// requests that were dispatched to the dead channel.
    pub generation: u64,
    pub connected_at: Instant,
    pub connected_at_unix: u64,
    outbound: mpsc::Sender<PushFrame>,
    closed_flag: AtomicBool,
    closed: Notify,
}

impl ConnectorSession {
    /// Queue a frame for the transport task. FIFO per session; concurrent
    /// callers are serialized by the channel.
    pub async fn enqueue(&self, frame: PushFrame) -> Result<(), SessionSendError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| SessionSendError::SendFailed)
    }

    /// Non-blocking enqueue for heartbeats. A full queue is reported
    /// distinctly so the caller can count consecutive stalls.
    pub fn try_enqueue(&self, frame: PushFrame) -> Result<(), TryEnqueueError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TryEnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => TryEnqueueError::Closed,
        })
    }

    /// Tell the channel's tasks to shut down. Called on replacement and
    /// on registry drain. Several tasks may watch one session (transport
    /// pump, heartbeat), hence flag + notify_waiters rather than a
    /// single stored permit.
    pub fn close(&self) {
        self.closed_flag.store(true, Ordering::SeqCst);
        self.closed.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed_flag.load(Ordering::SeqCst)
    }

    /// Resolves when the session has been closed.
    pub async fn closed(&self) {
        let notified = self.closed.notified();
        tokio::pin!(notified);
        // register interest before the flag check so a concurrent close
        // cannot slip between check and await
        notified.as_mut().enable();
        if self.is_closed() {
            return;
        }
        notified.await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionSendError {
    #[error("no connector registered for this node")]
    NoSuchConnector,
    #[error("push channel write failed")]
    SendFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryEnqueueError {
    Full,
    Closed,
}

/// Snapshot row for GET /connectors.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub mac: String,
    pub connected_at: u64,
    pub uptime_s: u64,
}

/// Result of registering a push channel.
pub struct Registration {
    pub session: Arc<ConnectorSession>,
    /// The transport task drains this and writes frames to the socket.
    pub outbound_rx: mpsc::Receiver<PushFrame>,
    /// The session this registration evicted, if any. The caller fails
    /// its in-flight requests with `connector_disconnected`.
    pub replaced: Option<Arc<ConnectorSession>>,
}

#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    sessions: DashMap<String, Arc<ConnectorSession>>,
    next_generation: AtomicU64,
    queue_depth: usize,
    metrics: Metrics,
}

impl SessionRegistry {
    pub fn new(queue_depth: usize, metrics: Metrics) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: DashMap::new(),
                next_generation: AtomicU64::new(1),
                queue_depth,
                metrics,
            }),
        }
    }

    /// Install a session for `mac`, atomically replacing any prior one.
    /// The replaced session's channel is closed here; failing its
    /// outstanding requests is the caller's job.
    pub fn register(&self, mac: &str) -> Registration {
        let (tx, rx) = mpsc::channel(self.inner.queue_depth);
        let session = Arc::new(ConnectorSession {
            mac: mac.to_string(),
            generation: self.inner.next_generation.fetch_add(1, Ordering::Relaxed),
            connected_at: Instant::now(),
            connected_at_unix: unix_now(),
            outbound: tx,
            closed_flag: AtomicBool::new(false),
            closed: Notify::new(),
        });

        let replaced = self
            .inner
            .sessions
            .insert(mac.to_string(), session.clone());
        if let Some(old) = &replaced {
            old.close();
            tracing::info!(
                mac,
                old_generation = old.generation,
                new_generation = session.generation,
                "connector session replaced"
            );
        } else {
            tracing::info!(mac, generation = session.generation, "connector session opened");
        }

        self.inner.metrics.session_opened();
        if replaced.is_some() {
            self.inner.metrics.session_closed();
        }

        Registration {
            session,
            outbound_rx: rx,
            replaced,
        }
    }

    /// Remove a session if it is still the current entry for its MAC.
    /// Idempotent; a replacement that already took the slot is left alone.
    pub fn unregister(&self, session: &ConnectorSession) -> bool {
        let removed = self
            .inner
            .sessions
            .remove_if(&session.mac, |_, current| {
                current.generation == session.generation
            })
            .is_some();
        if removed {
            session.close();
            self.inner.metrics.session_closed();
            tracing::info!(
                mac = %session.mac,
                generation = session.generation,
                "connector session closed"
            );
        }
        removed
    }

    /// Queue a frame on the session for `mac`. Returns the generation the
    /// frame was queued on so the caller can tie the request to this
    /// specific channel. A dead channel is evicted on the spot.
    pub async fn send(&self, mac: &str, frame: PushFrame) -> Result<u64, SessionSendError> {
        // clone out of the map before awaiting; holding a shard guard
        // across the send would block writers
        let session = self
            .inner
            .sessions
            .get(mac)
            .map(|entry| entry.value().clone())
            .ok_or(SessionSendError::NoSuchConnector)?;

        match session.enqueue(frame).await {
            Ok(()) => Ok(session.generation),
            Err(e) => {
                self.unregister(&session);
                Err(e)
            }
        }
    }

    pub fn get(&self, mac: &str) -> Option<Arc<ConnectorSession>> {
        self.inner.sessions.get(mac).map(|e| e.value().clone())
    }

    /// Snapshot for GET /connectors.
    pub fn list(&self) -> Vec<SessionInfo> {
        self.inner
            .sessions
            .iter()
            .map(|e| {
                let s = e.value();
                SessionInfo {
                    mac: s.mac.clone(),
                    connected_at: s.connected_at_unix,
                    uptime_s: s.connected_at.elapsed().as_secs(),
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    /// Shutdown drain: close and remove every session.
    pub fn close_all(&self) {
        let macs: Vec<String> = self.inner.sessions.iter().map(|e| e.key().clone()).collect();
        for mac in macs {
            if let Some((_, session)) = self.inner.sessions.remove(&mac) {
                session.close();
                self.inner.metrics.session_closed();
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
