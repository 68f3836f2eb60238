//! Discover, connect to and talk with Cast devices on the local network.
//!
//! # Crate Structure
//!
//! - [`frame`]: length-prefixed protobuf envelopes and their JSON header
//! - [`transport`]: TLS to devices with self-signed certificates
//! - [`conn`]: connection, channels, request correlation, heartbeat
//! - [`discovery`]: mDNS scanning and deduplication (behind `discovery` feature)
//! - [`logging`]: subscriber setup for binaries (behind `logging` feature)

/// Re-export frame types.
pub mod frame {
    pub use castlink_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use castlink_transport::*;
}

/// Re-export connection and channel types.
pub mod conn {
    pub use castlink_conn::*;
}

/// Re-export discovery types (requires `discovery` feature).
#[cfg(feature = "discovery")]
pub mod discovery {
    pub use castlink_discovery::*;
}

#[cfg(feature = "logging")]
pub mod logging;

pub use castlink_conn::{Channel, Client, ClientConfig, ConnError, Connection};

/// Connect a [`Client`] to a device found by discovery.
#[cfg(feature = "discovery")]
pub async fn connect_device(
    device: &castlink_discovery::DiscoveredDevice,
    config: ClientConfig,
) -> castlink_conn::Result<Client> {
    tracing::info!(device = %device, uuid = %device.uuid, "connecting to discovered device");
    Client::connect(device.address, device.port, config).await
}
