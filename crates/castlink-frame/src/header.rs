use serde::{Deserialize, Serialize};

use crate::envelope::{Envelope, PayloadType};
use crate::error::{FrameError, Result};

/// The JSON discriminant carried by every STRING payload.
///
/// Domain payloads embed this header with `#[serde(flatten)]` and add their
/// own fields next to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadHeader {
    #[serde(rename = "type", default)]
    pub msg_type: String,
    #[serde(
        rename = "requestId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub request_id: Option<i64>,
}

impl PayloadHeader {
    /// A header with only a message type.
    pub fn of_type(msg_type: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            request_id: None,
        }
    }

    /// Parse the header out of an envelope's payload.
    ///
    /// BINARY envelopes carry no JSON and yield an empty header.
    pub fn parse(envelope: &Envelope) -> Result<Self> {
        match envelope.payload_type() {
            PayloadType::String => {
                serde_json::from_str(envelope.payload_utf8()).map_err(FrameError::HeaderUnparsable)
            }
            PayloadType::Binary => Ok(Self::default()),
        }
    }
}
