use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;

use crate::envelope::Envelope;
use crate::error::{FrameError, Result};

/// Frame header: a single big-endian length = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Default maximum envelope size: 64 KiB, the protocol's message ceiling.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

/// Encode an envelope into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────┬──────────────────────────────┐
/// │ Length (4B BE)   │ Envelope (protobuf, Length B) │
/// └──────────────────┴──────────────────────────────┘
/// ```
pub fn encode_frame(envelope: &Envelope, dst: &mut BytesMut) -> Result<()> {
    let len = envelope.encoded_len();
    if len > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + len);
    dst.put_u32(len as u32);
    envelope
        .encode(dst)
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(())
}

/// Split one complete frame body off the front of a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let body_len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

    if body_len == 0 {
        return Err(FrameError::EmptyFrame);
    }
    if body_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: body_len,
            max: max_payload,
        });
    }

    if src.len() < HEADER_SIZE + body_len {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    Ok(Some(src.split_to(body_len).freeze()))
}

/// Decode a frame body into an envelope.
pub fn decode_envelope(body: &[u8]) -> Result<Envelope> {
    Ok(Envelope::decode(body)?)
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum envelope size in bytes. Default: 64 KiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
