//! Length-prefixed envelope framing for the Cast device protocol.
//!
//! This is the only layer of castlink that touches raw bytes. Every message
//! on the wire is:
//! - A 4-byte big-endian length
//! - A protobuf-encoded [`Envelope`] of exactly that length
//!
//! STRING envelopes carry a JSON document whose [`PayloadHeader`] (`type`,
//! optional `requestId`) drives routing in the layers above.
//!
//! The async `FrameReader` and `FrameWriter` need the `async` feature; the
//! codec, envelope and header types do not.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod header;
#[cfg(feature = "async")]
pub mod reader;
#[cfg(feature = "async")]
pub mod writer;

pub use codec::{
    decode_envelope, decode_frame, encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use envelope::{Envelope, PayloadType, ProtocolVersion, BROADCAST_DESTINATION};
pub use error::{FrameError, Result};
pub use header::PayloadHeader;
#[cfg(feature = "async")]
pub use reader::FrameReader;
#[cfg(feature = "async")]
pub use writer::FrameWriter;
