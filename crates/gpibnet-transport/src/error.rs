use std::time::Duration;

/// Errors that can occur in bridge transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the bridge.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// No byte arrived within the current receive timeout.
    #[error("receive timed out after {0:?}")]
    Timeout(Duration),

    /// The receive timeout must be a non-zero duration.
    #[error("invalid receive timeout {0:?} (must be non-zero)")]
    InvalidTimeout(Duration),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bridge closed the connection.
    #[error("connection closed by bridge")]
    Closed,
}

impl TransportError {
    /// Returns true if this error is a receive timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
