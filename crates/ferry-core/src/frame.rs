//! Push-channel framing — the protocol between router and connectors.
//!
//! Every frame is one JSON object. The SSE transport encodes a frame as a
//! single `data:` line; the WebSocket transport sends one frame per text
//! message. Connectors answer pings with `{"type":"pong"}`. These shapes
//! are the protocol — connector implementations parse them field by
//! field, so renames here are breaking changes.

use serde::{Deserialize, Serialize};

/// Commands the router can push to a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Read the dataset and POST it whole to /datasets/result.
    GetDataset,
    /// Read the dataset and stream it through /datasets/stream/*.
    GetDatasetStream,
    /// Upload the dataset to the object store and POST the URL.
    GetDatasetOffload,
}

/// A command frame, router → connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandFrame {
    pub command: Command,
    pub request_id: String,
    pub dataset_name: String,
    /// Hint for connector-side artificial processing delay. Forwarded
    /// verbatim from the application request; connectors may ignore it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_delay_ms: Option<u64>,
    /// Object store base URL for offload commands. Opaque to the router.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_store_url: Option<String>,
}

/// Any frame that can travel on the push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PushFrame {
    Command(CommandFrame),
    Control(ControlFrame),
}

/// Keep-alive control frames, both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Router → connector heartbeat.
    Ping,
    /// Connector → router heartbeat ack.
    Pong,
}

impl PushFrame {
    pub fn ping() -> Self {
        PushFrame::Control(ControlFrame::Ping)
    }

    /// Serialize for the wire. Frames are small; failure here means a bug
    /// in our own types, not bad input.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
