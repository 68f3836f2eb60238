//! The wire-level message unit.
//!
//! Mirrors the protocol's `CastMessage` protobuf (proto2):
//!
//! ```text
//! message CastMessage {
//!   required ProtocolVersion protocol_version = 1;
//!   required string source_id = 2;
//!   required string destination_id = 3;
//!   required string namespace = 4;
//!   required PayloadType payload_type = 5;
//!   optional string payload_utf8 = 6;
//!   optional bytes payload_binary = 7;
//! }
//! ```

/// Destination id meaning "every channel may treat this as addressed to it".
pub const BROADCAST_DESTINATION: &str = "*";

/// Protocol revision carried in every envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ProtocolVersion {
    Castv210 = 0,
}

/// Which payload field of the envelope is populated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum PayloadType {
    String = 0,
    Binary = 1,
}

/// A single addressed protocol message.
///
/// Envelopes are built fresh for every send and decoded fresh for every
/// receive; nothing mutates them in between.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Envelope {
    #[prost(enumeration = "ProtocolVersion", required, tag = "1")]
    pub protocol_version: i32,
    #[prost(string, required, tag = "2")]
    pub source_id: String,
    #[prost(string, required, tag = "3")]
    pub destination_id: String,
    #[prost(string, required, tag = "4")]
    pub namespace: String,
    #[prost(enumeration = "PayloadType", required, tag = "5")]
    pub payload_type: i32,
    #[prost(string, optional, tag = "6")]
    pub payload_utf8: Option<String>,
    #[prost(bytes = "vec", optional, tag = "7")]
    pub payload_binary: Option<Vec<u8>>,
}

impl Envelope {
    /// Create a STRING envelope (the JSON-carrying kind).
    pub fn text(
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
        namespace: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            protocol_version: ProtocolVersion::Castv210 as i32,
            source_id: source_id.into(),
            destination_id: destination_id.into(),
            namespace: namespace.into(),
            payload_type: PayloadType::String as i32,
            payload_utf8: Some(payload.into()),
            payload_binary: None,
        }
    }

    /// Create a BINARY envelope.
    pub fn binary(
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
        namespace: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            protocol_version: ProtocolVersion::Castv210 as i32,
            source_id: source_id.into(),
            destination_id: destination_id.into(),
            namespace: namespace.into(),
            payload_type: PayloadType::Binary as i32,
            payload_utf8: None,
            payload_binary: Some(payload.into()),
        }
    }

    /// True when the destination is the broadcast wildcard.
    pub fn is_broadcast(&self) -> bool {
        self.destination_id == BROADCAST_DESTINATION
    }

    /// Raw payload bytes, whichever field the payload type selects.
    pub fn payload(&self) -> &[u8] {
        match self.payload_type() {
            PayloadType::String => self.payload_utf8().as_bytes(),
            PayloadType::Binary => self.payload_binary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn text_envelope_fields() {
        let env = Envelope::text("sender-0", "receiver-0", "urn:x-cast:test", "{}");
        assert_eq!(env.protocol_version(), ProtocolVersion::Castv210);
        assert_eq!(env.payload_type(), PayloadType::String);
        assert_eq!(env.payload(), b"{}");
        assert!(env.payload_binary.is_none());
        assert!(!env.is_broadcast());
    }

    #[test]
    fn binary_envelope_fields() {
        let env = Envelope::binary("a", "*", "ns", vec![1, 2, 3]);
        assert_eq!(env.payload_type(), PayloadType::Binary);
        assert_eq!(env.payload(), &[1, 2, 3]);
        assert!(env.is_broadcast());
    }

    #[test]
    fn protobuf_field_layout() {
        let env = Envelope::text("s", "d", "n", "p");
        let bytes = env.encode_to_vec();
        // protocol_version (tag 1, varint 0) comes first.
        assert_eq!(&bytes[..2], &[0x08, 0x00]);
        // source_id (tag 2, length-delimited "s").
        assert_eq!(&bytes[2..5], &[0x12, 0x01, b's']);
        assert_eq!(Envelope::decode(bytes.as_slice()).unwrap(), env);
    }
}
