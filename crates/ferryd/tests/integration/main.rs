//! Ferry integration test harness.
//!
//! Every test spins up a full router in-process on a loopback port and
//! drives it purely over HTTP: the application role with plain requests,
//! the connector role through the SSE transport of /connect plus the
//! upload endpoints. No network namespaces, no external processes.

mod offload;
mod sessions;
mod stream;

use std::pin::Pin;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::{Stream, StreamExt};
pub use serde_json::{json, Value};

use ferry_api::ApiState;
use ferry_core::config::FerryConfig;
use ferry_services::{BrokerSettings, Metrics, RequestBroker, SessionRegistry};

// ── Harness ───────────────────────────────────────────────────────────────────

pub struct TestRouter {
    pub base_url: String,
}

/// Start a router with default config (short janitor-independent tests
/// override what they need through `spawn_router_with`).
pub async fn spawn_router() -> TestRouter {
    spawn_router_with(|_| {}).await
}

pub async fn spawn_router_with(tweak: impl FnOnce(&mut FerryConfig)) -> TestRouter {
    let mut config = FerryConfig::default();
    tweak(&mut config);

    let metrics = Metrics::new();
    let registry = SessionRegistry::new(config.channel.outbound_queue_depth, metrics.clone());
    let broker = RequestBroker::new(
        registry.clone(),
        metrics.clone(),
        BrokerSettings::from_config(&config),
    );
    let state = ApiState::new(&config, registry, broker, metrics);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let app = ferry_api::router(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestRouter {
        base_url: format!("http://{addr}"),
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

// ── Connector role ────────────────────────────────────────────────────────────

/// A connector's push channel, riding the SSE transport.
pub struct PushChannel {
    buf: String,
    stream: Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>,
}

impl PushChannel {
    pub async fn connect(base_url: &str, mac: &str) -> Self {
        let resp = client()
            .get(format!("{base_url}/connect?mac={mac}"))
            .send()
            .await
            .expect("open push channel");
        assert!(
            resp.status().is_success(),
            "push channel rejected: {}",
            resp.status()
        );
        Self {
            buf: String::new(),
            stream: Box::pin(resp.bytes_stream()),
        }
    }

    /// Next command frame, skipping keep-alive pings.
    pub async fn next_command(&mut self) -> Value {
        loop {
            if let Some(line) = take_data_line(&mut self.buf) {
                let value: Value = serde_json::from_str(&line).expect("frame is JSON");
                if value.get("type").is_some() {
                    continue; // ping
                }
                return value;
            }
            match tokio::time::timeout(Duration::from_secs(5), self.stream.next()).await {
                Ok(Some(Ok(bytes))) => self.buf.push_str(&String::from_utf8_lossy(&bytes)),
                other => panic!("push channel ended while waiting for a command: {other:?}"),
            }
        }
    }
}

/// Pop the next `data:` line out of the SSE byte buffer, if a full line
/// has arrived.
fn take_data_line(buf: &mut String) -> Option<String> {
    while let Some(pos) = buf.find('\n') {
        let line = buf[..pos].trim_end_matches('\r').to_string();
        buf.drain(..=pos);
        if let Some(data) = line.strip_prefix("data:") {
            return Some(data.trim_start().to_string());
        }
        // blank separators and comment lines
    }
    None
}

// ── Shared helpers ────────────────────────────────────────────────────────────

pub fn b64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn b64_decode(encoded: &str) -> Vec<u8> {
    STANDARD.decode(encoded).expect("valid base64")
}

pub async fn post_json(base_url: &str, path: &str, body: Value) -> reqwest::Response {
    client()
        .post(format!("{base_url}{path}"))
        .json(&body)
        .send()
        .await
        .expect("request reaches router")
}

/// Upload a whole dataset as the connector (sync pattern).
pub async fn upload_result_data(base_url: &str, request_id: &str, data: &[u8]) -> reqwest::Response {
    post_json(
        base_url,
        "/datasets/result",
        json!({ "request_id": request_id, "data": b64(data) }),
    )
    .await
}

/// Stream a dataset as the connector: init, chunks, complete.
pub async fn upload_stream(base_url: &str, request_id: &str, chunks: &[&[u8]]) {
    let total: usize = chunks.iter().map(|c| c.len()).sum();
    let resp = post_json(
        base_url,
        "/datasets/stream/init",
        json!({ "request_id": request_id, "total_size": total }),
    )
    .await;
    assert!(resp.status().is_success(), "init failed: {}", resp.status());

    for (seq, chunk) in chunks.iter().enumerate() {
        let resp = post_json(
            base_url,
            "/datasets/stream/chunk",
            json!({ "request_id": request_id, "seq": seq, "data": b64(chunk) }),
        )
        .await;
        assert!(
            resp.status().is_success(),
            "chunk {seq} failed: {}",
            resp.status()
        );
    }

    let resp = post_json(
        base_url,
        "/datasets/stream/complete",
        json!({ "request_id": request_id, "total_chunks": chunks.len() }),
    )
    .await;
    assert!(resp.status().is_success(), "complete failed: {}", resp.status());
}

pub async fn get_status(base_url: &str, request_id: &str) -> (reqwest::StatusCode, Value) {
    let resp = client()
        .get(format!("{base_url}/datasets/status/{request_id}"))
        .send()
        .await
        .expect("status request");
    let status = resp.status();
    let body = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}
