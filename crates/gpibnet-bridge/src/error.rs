use gpibnet_frame::FrameError;

/// Errors that can occur in bridge session operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] gpibnet_transport::TransportError),

    /// Frame-level error. Transport failures surfaced by the frame layer
    /// are reported as [`BridgeError::Transport`] instead.
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// The session configuration is inconsistent.
    #[error("invalid bridge configuration: {0}")]
    InvalidConfig(String),

    /// A read gave up after the configured number of unanswered attempts.
    #[error("no response after {attempts} read attempts")]
    ReadAttemptsExhausted { attempts: u32 },

    /// A read was cancelled through the session's cancel token.
    #[error("read cancelled")]
    Cancelled,

    /// A thread panicked while holding the shared session.
    #[error("shared session lock poisoned")]
    Poisoned,
}

impl From<FrameError> for BridgeError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Transport(err) => BridgeError::Transport(err),
            other => BridgeError::Frame(other),
        }
    }
}

impl BridgeError {
    /// Returns true if the session may hold a half-read response and should
    /// be resynchronized before further use.
    pub fn needs_resync(&self) -> bool {
        matches!(
            self,
            BridgeError::Cancelled | BridgeError::ReadAttemptsExhausted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
