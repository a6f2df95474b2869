//! The /connect push channel — where connectors dial in and stay.
//!
//! One endpoint, two transports. A request carrying a WebSocket upgrade
//! becomes a bidirectional channel (frames as text messages, pong acks
//! counted for liveness); anything else becomes a server-sent-events
//! stream (one frame per `data:` line, liveness judged by write
//! success). Both drain the same per-session outbound queue, so the
//! registry never needs to know which transport a session rides.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Query, Request, State};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use ferry_core::frame::{ControlFrame, PushFrame};
use ferry_core::RequestError;
use ferry_services::{ConnectorSession, Registration, TryEnqueueError};

use crate::error::ApiError;
use crate::handlers::{normalize_mac, ApiState};

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub mac: Option<String>,
}

pub async fn handle_connect(
    State(state): State<ApiState>,
    Query(params): Query<ConnectParams>,
    req: Request,
) -> Response {
    let mac = params.mac.as_deref().map(normalize_mac).unwrap_or_default();
    if mac.is_empty() {
        return ApiError(RequestError::ProtocolViolation(
            "mac query parameter is required".to_string(),
        ))
        .into_response();
    }

    let (mut parts, _body) = req.into_parts();
    match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => upgrade.on_upgrade(move |socket| ws_session(socket, state, mac)),
        Err(_) => sse_session(state, mac).into_response(),
    }
}

/// Tear-down shared by every exit path. Idempotent: unregister is
/// generation-checked and failing already-terminal requests is a no-op.
fn close_session(state: &ApiState, session: &ConnectorSession) {
    state.registry.unregister(session);
    state.broker.fail_all_for_connector(
        &session.mac,
        session.generation,
        RequestError::ConnectorDisconnected,
    );
}

fn register(state: &ApiState, mac: &str) -> Registration {
    let registration = state.registry.register(mac);
    if let Some(old) = &registration.replaced {
        // requests dispatched to the evicted channel can never complete
        state.broker.fail_all_for_connector(
            mac,
            old.generation,
            RequestError::ConnectorDisconnected,
        );
    }
    registration
}

// ── WebSocket transport ───────────────────────────────────────────────────────

async fn ws_session(socket: WebSocket, state: ApiState, mac: String) {
    let Registration {
        session,
        mut outbound_rx,
        replaced: _,
    } = register(&state, &mac);
    tracing::info!(mac = %mac, generation = session.generation, "websocket push channel established");

    let (mut sender, mut receiver) = socket.split();
    let mut ping_interval = tokio::time::interval(state.keepalive_interval);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping_interval.tick().await; // the immediate first tick carries no information
    let mut unacked_pings: u8 = 0;

    loop {
        tokio::select! {
            _ = session.closed() => break,

            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                if sender.send(Message::Text(frame.to_json().into())).await.is_err() {
                    break;
                }
            }

            _ = ping_interval.tick() => {
                if unacked_pings >= 2 {
                    tracing::warn!(mac = %mac, "connector missed two keepalives, evicting");
                    break;
                }
                if sender.send(Message::Text(PushFrame::ping().to_json().into())).await.is_err() {
                    break;
                }
                unacked_pings += 1;
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if matches!(
                            serde_json::from_str::<ControlFrame>(&text),
                            Ok(ControlFrame::Pong)
                        ) {
                            unacked_pings = 0;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => unacked_pings = 0,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(mac = %mac, error = %e, "websocket read failed");
                        break;
                    }
                }
            }
        }
    }

    close_session(&state, &session);
    tracing::info!(mac = %mac, "websocket push channel closed");
}

// ── SSE transport ─────────────────────────────────────────────────────────────

fn sse_session(state: ApiState, mac: String) -> Sse<SseDrain> {
    let Registration {
        session,
        outbound_rx,
        replaced: _,
    } = register(&state, &mac);
    tracing::info!(mac = %mac, generation = session.generation, "sse push channel established");

    tokio::spawn(sse_heartbeat(state.clone(), session.clone()));

    let closed = {
        let session = session.clone();
        Box::pin(async move { session.closed().await }) as Pin<Box<dyn Future<Output = ()> + Send>>
    };

    Sse::new(SseDrain {
        state,
        session,
        rx: outbound_rx,
        closed,
        done: false,
    })
}

/// SSE is one-directional, so there are no pong acks to count. The
/// heartbeat pings keep frames flowing; a queue that stays full for two
/// intervals means the client stopped reading, and a closed queue means
/// it is gone.
async fn sse_heartbeat(state: ApiState, session: Arc<ConnectorSession>) {
    let mut interval = tokio::time::interval(state.keepalive_interval);
    interval.tick().await;
    let mut stalled: u8 = 0;

    loop {
        tokio::select! {
            _ = session.closed() => return,
            _ = interval.tick() => {
                match session.try_enqueue(PushFrame::ping()) {
                    Ok(()) => stalled = 0,
                    Err(TryEnqueueError::Full) => {
                        stalled += 1;
                        if stalled >= 2 {
                            tracing::warn!(mac = %session.mac, "connector stopped draining, evicting");
                            close_session(&state, &session);
                            return;
                        }
                    }
                    Err(TryEnqueueError::Closed) => {
                        close_session(&state, &session);
                        return;
                    }
                }
            }
        }
    }
}

/// The SSE body: drains the session's outbound queue into events and
/// tears the session down when the stream is dropped (client gone) or
/// the session is closed from elsewhere (replacement, shutdown).
pub struct SseDrain {
    state: ApiState,
    session: Arc<ConnectorSession>,
    rx: mpsc::Receiver<PushFrame>,
    closed: Pin<Box<dyn Future<Output = ()> + Send>>,
    done: bool,
}

impl Stream for SseDrain {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        if this.closed.as_mut().poll(cx).is_ready() {
            this.done = true;
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(frame)) => {
                Poll::Ready(Some(Ok(Event::default().data(frame.to_json()))))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for SseDrain {
    fn drop(&mut self) {
        close_session(&self.state, &self.session);
        tracing::info!(mac = %self.session.mac, "sse push channel closed");
    }
}
