//! Application-facing handlers — the blocking request surface.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use ferry_core::timing::RequestTimings;
use ferry_core::RequestError;
use ferry_services::{Pattern, SessionInfo, StatusSnapshot, UnaryOutcome, Waiter};

use crate::body::StreamBody;
use crate::error::ApiError;
use crate::handlers::{normalize_mac, ApiState, CancelOnDisconnect};

/// Shared request body for all three patterns.
#[derive(Debug, Deserialize)]
pub struct DatasetRequest {
    pub mac: String,
    pub dataset: String,
    /// Per-request deadline override, seconds.
    pub timeout_s: Option<u64>,
    /// Artificial connector-side delay hint, forwarded verbatim.
    pub processing_delay_ms: Option<u64>,
}

impl DatasetRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.mac.trim().is_empty() {
            return Err(RequestError::ProtocolViolation("mac is required".to_string()).into());
        }
        if self.dataset.trim().is_empty() {
            return Err(RequestError::ProtocolViolation("dataset is required".to_string()).into());
        }
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout_s.map(Duration::from_secs)
    }
}

// ── POST /datasets/request-sync ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct SyncResponse {
    pub status: &'static str,
    pub request_id: String,
    /// Dataset bytes, base64.
    pub data: String,
    pub size_bytes: u64,
    pub timings: RequestTimings,
}

pub async fn handle_request_sync(
    State(state): State<ApiState>,
    Json(req): Json<DatasetRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    req.validate()?;
    let mac = normalize_mac(&req.mac);

    let (request, waiter) = state.broker.begin(
        &mac,
        &req.dataset,
        Pattern::Sync,
        req.timeout(),
        req.processing_delay_ms,
    )?;
    let _guard = CancelOnDisconnect::new(state.broker.clone(), request.id.clone());

    state.broker.dispatch(&request).await?;

    let Waiter::Unary(rx) = waiter else {
        return Err(RequestError::Internal("sync waiter shape".to_string()).into());
    };
    let outcome = rx
        .await
        .map_err(|_| RequestError::Internal("waitable dropped".to_string()))?;

    match outcome? {
        UnaryOutcome::Data(data) => {
            state.broker.mark_responded(&request);
            Ok(Json(SyncResponse {
                status: "success",
                request_id: request.id.clone(),
                size_bytes: data.len() as u64,
                data: BASE64.encode(&data),
                timings: request.timings(),
            }))
        }
        UnaryOutcome::Offload { .. } => {
            Err(RequestError::Internal("offload outcome on sync request".to_string()).into())
        }
    }
}

// ── POST /datasets/request-stream ─────────────────────────────────────────────

pub async fn handle_request_stream(
    State(state): State<ApiState>,
    Json(req): Json<DatasetRequest>,
) -> Result<Response, ApiError> {
    req.validate()?;
    let mac = normalize_mac(&req.mac);

    let (request, waiter) = state.broker.begin(
        &mac,
        &req.dataset,
        Pattern::Stream,
        req.timeout(),
        req.processing_delay_ms,
    )?;
    let Waiter::Stream(consumer) = waiter else {
        return Err(RequestError::Internal("stream waiter shape".to_string()).into());
    };

    // failures here (no connector, dead channel) still get a clean JSON
    // error; once the 200 and headers go out, failures can only abort
    // the body
    state.broker.dispatch(&request).await?;

    let body = StreamBody::new(state.broker.clone(), request.clone(), consumer);
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::TRAILER, crate::body::TIMINGS_TRAILER.as_str())
        .header("x-request-id", request.id.as_str())
        .body(axum::body::Body::new(body))
        .map_err(|e| RequestError::Internal(e.to_string()))?;
    Ok(response)
}

// ── POST /datasets/request-offload ────────────────────────────────────────────

#[derive(Serialize)]
pub struct OffloadResponse {
    pub status: &'static str,
    pub request_id: String,
    pub download_url: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    pub timings: RequestTimings,
}

pub async fn handle_request_offload(
    State(state): State<ApiState>,
    Json(req): Json<DatasetRequest>,
) -> Result<Json<OffloadResponse>, ApiError> {
    req.validate()?;
    let mac = normalize_mac(&req.mac);

    let (request, waiter) = state.broker.begin(
        &mac,
        &req.dataset,
        Pattern::Offload,
        req.timeout(),
        req.processing_delay_ms,
    )?;
    let _guard = CancelOnDisconnect::new(state.broker.clone(), request.id.clone());

    state.broker.dispatch(&request).await?;

    let Waiter::Unary(rx) = waiter else {
        return Err(RequestError::Internal("offload waiter shape".to_string()).into());
    };
    let outcome = rx
        .await
        .map_err(|_| RequestError::Internal("waitable dropped".to_string()))?;

    match outcome? {
        UnaryOutcome::Offload {
            download_url,
            size_bytes,
            expires_at,
        } => {
            state.broker.mark_responded(&request);
            Ok(Json(OffloadResponse {
                status: "success",
                request_id: request.id.clone(),
                download_url,
                size_bytes,
                expires_at,
                timings: request.timings(),
            }))
        }
        UnaryOutcome::Data(_) => {
            Err(RequestError::Internal("data outcome on offload request".to_string()).into())
        }
    }
}

// ── GET /datasets/status/{request_id} ─────────────────────────────────────────

pub async fn handle_status(
    State(state): State<ApiState>,
    Path(request_id): Path<String>,
) -> Result<Json<StatusSnapshot>, ApiError> {
    state
        .broker
        .get(&request_id)
        .map(Json)
        .ok_or_else(|| RequestError::UnknownRequest.into())
}

// ── GET /connectors ───────────────────────────────────────────────────────────

pub async fn handle_connectors(State(state): State<ApiState>) -> Json<Vec<SessionInfo>> {
    Json(state.registry.list())
}

// ── GET /health ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_s: u64,
    pub connectors: usize,
}

pub async fn handle_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_s: state.started_at.elapsed().as_secs(),
        connectors: state.registry.len(),
    })
}

// ── GET /metrics ──────────────────────────────────────────────────────────────

pub async fn handle_metrics(State(state): State<ApiState>) -> Response {
    Json(state.metrics.snapshot()).into_response()
}
