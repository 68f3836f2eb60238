use std::time::Duration;

use crate::channel::ChannelId;

/// Errors that can occur in connection and channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] castlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] castlink_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No correlated response arrived in time.
    #[error("request {request_id} on {channel} timed out after {elapsed:?}")]
    Timeout {
        request_id: i64,
        channel: ChannelId,
        elapsed: Duration,
    },

    /// The connection has been closed.
    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ConnError>;
