//! Connector-facing handlers — the upload surface.

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use ferry_core::RequestError;

use crate::error::ApiError;
use crate::handlers::ApiState;

#[derive(Serialize)]
pub struct Ack {
    pub ack: bool,
}

fn ack() -> Json<Ack> {
    Json(Ack { ack: true })
}

// ── POST /datasets/result ─────────────────────────────────────────────────────

/// Carries a whole sync payload, an offload URL, or a connector-reported
/// error. Exactly one of the three shapes must be present.
#[derive(Debug, Deserialize)]
pub struct ResultUpload {
    pub request_id: String,
    /// Dataset bytes, base64 (sync pattern).
    pub data: Option<String>,
    /// Object-store URL (offload pattern).
    pub download_url: Option<String>,
    pub size_bytes: Option<u64>,
    pub expires_at: Option<String>,
    /// Connector-side failure report.
    pub error: Option<String>,
}

pub async fn handle_result(
    State(state): State<ApiState>,
    Json(upload): Json<ResultUpload>,
) -> Result<Json<Ack>, ApiError> {
    if let Some(message) = upload.error {
        state.broker.deliver_failure(&upload.request_id, message)?;
        return Ok(ack());
    }

    if let Some(download_url) = upload.download_url {
        let size_bytes = upload.size_bytes.ok_or_else(|| {
            RequestError::ProtocolViolation("offload result without size_bytes".to_string())
        })?;
        state.broker.deliver_offload(
            &upload.request_id,
            download_url,
            size_bytes,
            upload.expires_at,
        )?;
        return Ok(ack());
    }

    if let Some(encoded) = upload.data {
        let data = BASE64.decode(encoded.as_bytes()).map_err(|_| {
            RequestError::ProtocolViolation("data is not valid base64".to_string())
        })?;
        state
            .broker
            .deliver_data(&upload.request_id, Bytes::from(data))?;
        return Ok(ack());
    }

    Err(RequestError::ProtocolViolation(
        "result carries neither data, download_url, nor error".to_string(),
    )
    .into())
}

// ── POST /datasets/stream/init ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StreamInit {
    pub request_id: String,
    pub total_size: Option<u64>,
    pub chunk_size: Option<u64>,
}

pub async fn handle_stream_init(
    State(state): State<ApiState>,
    Json(init): Json<StreamInit>,
) -> Result<Json<Ack>, ApiError> {
    state
        .broker
        .stream_init(&init.request_id, init.total_size, init.chunk_size)?;
    Ok(ack())
}

// ── POST /datasets/stream/chunk ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    pub request_id: String,
    pub seq: u64,
    /// Chunk bytes, base64. Empty string is a valid empty chunk.
    pub data: String,
}

pub async fn handle_stream_chunk(
    State(state): State<ApiState>,
    Json(chunk): Json<StreamChunk>,
) -> Result<Json<Ack>, ApiError> {
    let data = BASE64.decode(chunk.data.as_bytes()).map_err(|_| {
        RequestError::ProtocolViolation("chunk data is not valid base64".to_string())
    })?;
    state
        .broker
        .stream_chunk(&chunk.request_id, chunk.seq, Bytes::from(data))
        .await?;
    Ok(ack())
}

// ── POST /datasets/stream/complete ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StreamComplete {
    pub request_id: String,
    pub total_chunks: u64,
}

pub async fn handle_stream_complete(
    State(state): State<ApiState>,
    Json(complete): Json<StreamComplete>,
) -> Result<Json<Ack>, ApiError> {
    state
        .broker
        .stream_complete(&complete.request_id, complete.total_chunks)
        .await?;
    Ok(ack())
}

// ── POST /datasets/stream/error ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StreamError {
    pub request_id: String,
    pub message: String,
}

pub async fn handle_stream_error(
    State(state): State<ApiState>,
    Json(report): Json<StreamError>,
) -> Result<Json<Ack>, ApiError> {
    state
        .broker
        .stream_error(&report.request_id, report.message)
        .await?;
    Ok(ack())
}
