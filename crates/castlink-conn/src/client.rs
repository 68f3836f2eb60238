use std::net::IpAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::channel::Channel;
use crate::connection::{ConnectConfig, Connection};
use crate::control::{DEFAULT_RECEIVER, DEFAULT_SENDER};
use crate::error::Result;
use crate::heartbeat::{Heartbeat, HeartbeatConfig};
use crate::virtual_connection::VirtualConnection;

/// Configuration for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Source id stamped on every channel the client creates.
    pub sender_id: String,
    /// The platform receiver the client connects to.
    pub receiver_id: String,
    pub connect: ConnectConfig,
    pub heartbeat: HeartbeatConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sender_id: DEFAULT_SENDER.to_string(),
            receiver_id: DEFAULT_RECEIVER.to_string(),
            connect: ConnectConfig::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_connect(mut self, connect: ConnectConfig) -> Self {
        self.connect = connect;
        self
    }
}

/// A ready-to-use session with one device.
///
/// Connecting opens the platform virtual connection and starts the
/// heartbeat; callers then create channels for the namespaces they need.
pub struct Client {
    connection: Connection,
    platform: VirtualConnection,
    heartbeat: Heartbeat,
    cancel: CancellationToken,
    config: ClientConfig,
}

impl Client {
    /// Connect to a device over TLS.
    pub async fn connect(address: IpAddr, port: u16, config: ClientConfig) -> Result<Self> {
        let connection = Connection::connect(address, port, &config.connect).await?;
        info!(%address, port, "connected to device");
        Self::start(connection, config).await
    }

    /// Run a client over an already established byte stream.
    pub async fn from_stream<S>(stream: S, config: ClientConfig) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let connection = Connection::from_stream(stream, config.connect.frame.clone());
        Self::start(connection, config).await
    }

    async fn start(connection: Connection, config: ClientConfig) -> Result<Self> {
        let platform = VirtualConnection::new(&connection, &config.sender_id, &config.receiver_id);
        platform.open().await?;

        let heartbeat = Heartbeat::new(
            &connection,
            &config.sender_id,
            &config.receiver_id,
            config.heartbeat.clone(),
        );
        let cancel = CancellationToken::new();
        heartbeat.start(&cancel).await;

        Ok(Self {
            connection,
            platform,
            heartbeat,
            cancel,
            config,
        })
    }

    /// Create a channel from this client's sender id.
    pub fn new_channel(
        &self,
        destination: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Channel {
        self.connection
            .new_channel(&self.config.sender_id, destination, namespace)
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn sender_id(&self) -> &str {
        &self.config.sender_id
    }

    /// Whether the device has closed the platform virtual connection.
    pub fn is_closed_by_device(&self) -> bool {
        self.platform.is_closed_by_peer()
    }

    /// Stop the heartbeat, send `CLOSE` and close the connection.
    pub async fn close(&self) {
        self.cancel.cancel();
        self.heartbeat.stop().await;
        if !self.connection.is_closed() {
            if let Err(err) = self.platform.close().await {
                debug!(error = %err, "could not send CLOSE");
            }
        }
        self.connection.close().await;
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
