//! Channels over a Cast device connection.
//!
//! One [`Connection`] owns a TLS stream and a single receive loop. Logical
//! [`Channel`]s, each a `(source, destination, namespace)` triple, share the
//! stream: they send JSON payloads, correlate responses by `requestId`, and
//! dispatch unsolicited messages by `type`. [`Heartbeat`] and
//! [`VirtualConnection`] implement the platform namespaces, and [`Client`]
//! wires them together for a single device.

pub mod channel;
pub mod client;
pub mod connection;
pub mod control;
pub mod error;
pub mod heartbeat;
pub mod virtual_connection;

pub use channel::{Channel, ChannelId, MessageCallback, RequestPayload};
pub use client::{Client, ClientConfig};
pub use connection::{ConnectConfig, Connection};
pub use control::{
    DEFAULT_PORT, DEFAULT_RECEIVER, DEFAULT_SENDER, MSG_CLOSE, MSG_CONNECT, MSG_PING, MSG_PONG,
    NAMESPACE_CONNECTION, NAMESPACE_HEARTBEAT,
};
pub use error::{ConnError, Result};
pub use heartbeat::{Heartbeat, HeartbeatConfig};
pub use virtual_connection::VirtualConnection;
