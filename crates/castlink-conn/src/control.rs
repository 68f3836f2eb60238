//! Platform namespaces, message types and well-known endpoint ids.

use castlink_frame::PayloadHeader;

/// Keep-alive namespace.
pub const NAMESPACE_HEARTBEAT: &str = "urn:x-cast:com.google.cast.tp.heartbeat";
/// Virtual-connection namespace.
pub const NAMESPACE_CONNECTION: &str = "urn:x-cast:com.google.cast.tp.connection";

/// Heartbeat message type: keep-alive request.
pub const MSG_PING: &str = "PING";
/// Heartbeat message type: keep-alive reply.
pub const MSG_PONG: &str = "PONG";
/// Connection message type: open a virtual connection.
pub const MSG_CONNECT: &str = "CONNECT";
/// Connection message type: close a virtual connection.
pub const MSG_CLOSE: &str = "CLOSE";

/// Sender id used for the platform channels.
pub const DEFAULT_SENDER: &str = "sender-0";
/// The device's platform receiver.
pub const DEFAULT_RECEIVER: &str = "receiver-0";

pub use castlink_transport::DEFAULT_PORT;

/// Payload for a `PING`.
pub fn ping() -> PayloadHeader {
    PayloadHeader::of_type(MSG_PING)
}

/// Payload for a `PONG`.
pub fn pong() -> PayloadHeader {
    PayloadHeader::of_type(MSG_PONG)
}

/// Payload for a `CONNECT`.
pub fn connect() -> PayloadHeader {
    PayloadHeader::of_type(MSG_CONNECT)
}

/// Payload for a `CLOSE`.
pub fn close() -> PayloadHeader {
    PayloadHeader::of_type(MSG_CLOSE)
}
