//! Secure stream transport to Cast devices.
//!
//! Devices listen for TLS on port 8009 with self-signed certificates.
//! [`connect`] opens the TCP socket, runs the handshake, and hands back a
//! [`CastStream`] that the framing layer reads and writes.

pub mod error;
pub mod tls;

pub use error::{Result, TransportError};
pub use tls::{build_connector, connect, CastStream, TlsConfig, DEFAULT_PORT};
