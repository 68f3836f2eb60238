/// Errors that can occur during envelope framing and decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The length prefix announced a zero-byte packet.
    #[error("empty packet (zero length prefix)")]
    EmptyFrame,

    /// The envelope exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The frame body is not a valid protobuf envelope.
    #[error("failed to decode envelope: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The JSON header inside a STRING payload could not be parsed.
    #[error("failed to parse payload header: {0}")]
    HeaderUnparsable(#[source] serde_json::Error),

    /// Fewer bytes were written than the frame requires.
    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether this error invalidates the whole stream.
    ///
    /// Decode and header errors concern a single, fully-delimited frame: the
    /// stream is still in sync and the next frame can be read. Everything
    /// else leaves the byte stream in an unknown state.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FrameError::Decode(_) | FrameError::HeaderUnparsable(_))
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
