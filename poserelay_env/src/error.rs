//! Error types for the transport boundary.

use thiserror::Error;

/// Errors that can occur at the pub/sub transport boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The outbound channel or stream is closed
    #[error("Transport closed: {0}")]
    Closed(String),

    /// Record serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Creates a closed-transport error.
    pub fn closed(msg: impl Into<String>) -> Self {
        Self::Closed(msg.into())
    }
}
