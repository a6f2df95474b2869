//! Request failure taxonomy.
//!
//! Every way a dataset request can fail, as one enum. The `kind()` string
//! is part of the HTTP surface — clients match on it, so variants keep
//! their wire names stable.

use serde::Serialize;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    /// No live push channel for the requested node.
    #[error("no connector registered for this node")]
    NoSuchConnector,

    /// The connector's push channel died while the request was in flight.
    #[error("connector disconnected before completing the request")]
    ConnectorDisconnected,

    /// Deadline expired before the connector delivered a result.
    #[error("request deadline expired")]
    Timeout,

    /// A sync upload exceeded `max_buffered_bytes`, or a stream chunk
    /// exceeded `max_chunk_size`.
    #[error("payload exceeds the configured size limit")]
    PayloadTooLarge,

    /// Malformed connector behavior: sequence gaps, uploads that do not
    /// match the request's pattern, chunks before init.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The connector reported that its object-store upload failed.
    #[error("offload failed: {0}")]
    OffloadFailed(String),

    /// Upload or status query referenced a request that does not exist
    /// or is already terminal.
    #[error("unknown request")]
    UnknownRequest,

    /// The stream pipe stayed full past the bounded enqueue wait.
    #[error("stream queue full")]
    Backpressure,

    /// The application reader is gone; the stream no longer accepts chunks.
    #[error("stream closed by the application side")]
    StreamGone,

    /// The application disconnected while waiting.
    #[error("application disconnected")]
    AppDisconnected,

    /// Router is draining for shutdown.
    #[error("router shutting down")]
    Shutdown,

    /// Anything that should not happen.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RequestError {
    /// Stable wire name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::NoSuchConnector => "no_such_connector",
            RequestError::ConnectorDisconnected => "connector_disconnected",
            RequestError::Timeout => "timeout",
            RequestError::PayloadTooLarge => "payload_too_large",
            RequestError::ProtocolViolation(_) => "protocol_violation",
            RequestError::OffloadFailed(_) => "offload_failed",
            RequestError::UnknownRequest => "unknown_request",
            RequestError::Backpressure => "backpressure",
            RequestError::StreamGone => "stream_gone",
            RequestError::AppDisconnected => "app_disconnected",
            RequestError::Shutdown => "shutdown",
            RequestError::Internal(_) => "internal_error",
        }
    }
}

/// Wire shape of an error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub error: &'static str,
    pub message: String,
}

impl ErrorBody {
    pub fn from_error(err: &RequestError) -> Self {
        Self {
            status: "error",
            error: err.kind(),
            message: err.to_string(),
        }
    }
}
