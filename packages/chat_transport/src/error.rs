use std::fmt;

use tokio_tungstenite::tungstenite;

/// Errors surfaced by the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the physical connection failed.
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// The established connection reported an error.
    #[error("socket error: {0}")]
    Socket(String),

    /// An outbound frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl TransportError {
    pub fn connect(url: &str, reason: impl fmt::Display) -> Self {
        Self::Connect {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        Self::Socket(err.to_string())
    }
}
