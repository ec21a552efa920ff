/// Errors that can occur during command encoding and response decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The GPIB address is outside the bus range.
    #[error("invalid GPIB address {0} (valid range 0-30)")]
    InvalidAddress(u8),

    /// An escaped buffer ended with a lone escape byte.
    #[error("escaped command ends with a dangling ESC byte")]
    DanglingEscape,

    /// An escaped buffer did not end with the LF terminator.
    #[error("escaped command is missing its LF terminator")]
    MissingTerminator,

    /// An escaped buffer contained an unescaped reserved byte.
    #[error("unescaped reserved byte 0x{byte:02X} at offset {offset}")]
    UnescapedReserved { byte: u8, offset: usize },

    /// The decoder was fed after it already completed a response.
    #[error("response decoder already completed")]
    DecoderFinished,

    /// A transport error occurred while writing commands or directives.
    #[error("frame transport error: {0}")]
    Transport(#[from] gpibnet_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
