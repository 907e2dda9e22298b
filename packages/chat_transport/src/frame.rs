use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Kind tag carried by every outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// A human message.
    Message,
    /// Ask the remote side to abort the in-flight turn.
    Stop,
    /// Heartbeat.
    Ping,
}

/// Frame written to the socket: `{kind, payload, timestamp}`.
///
/// Heartbeats carry no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub kind: FrameKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl OutboundFrame {
    pub fn new(kind: FrameKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: Some(payload.into()),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn ping() -> Self {
        Self {
            kind: FrameKind::Ping,
            payload: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn encode(&self) -> Result<String, TransportError> {
        Ok(serde_json::to_string(self)?)
    }
}
