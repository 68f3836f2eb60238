use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use castlink_frame::{Envelope, FrameConfig, FrameError, FrameReader, FrameWriter, PayloadHeader};
use castlink_transport::TlsConfig;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelId};
use crate::error::{ConnError, Result};

type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;
type Registry = Arc<RwLock<Vec<Channel>>>;

/// Configuration for [`Connection::connect`].
#[derive(Debug, Clone, Default)]
pub struct ConnectConfig {
    pub tls: TlsConfig,
    pub frame: FrameConfig,
}

/// The single write path shared by a connection and its channels.
///
/// Frames are written whole under the lock, so concurrent senders never
/// interleave bytes on the wire.
pub(crate) struct Outbound {
    writer: tokio::sync::Mutex<FrameWriter<BoxedWrite>>,
    shutdown: CancellationToken,
}

impl Outbound {
    pub(crate) fn new(writer: BoxedWrite, config: FrameConfig, shutdown: CancellationToken) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(FrameWriter::with_config(writer, config)),
            shutdown,
        }
    }

    pub(crate) async fn send(&self, envelope: &Envelope) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(ConnError::Closed);
        }
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(ConnError::Closed),
            result = async {
                let mut writer = self.writer.lock().await;
                writer.send(envelope).await
            } => result.map_err(ConnError::from),
        }
    }
}

struct ConnectionInner {
    outbound: Arc<Outbound>,
    channels: Registry,
    shutdown: CancellationToken,
    closing: AtomicBool,
    receive_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// One secured stream to a device, demultiplexed into [`Channel`]s.
///
/// A single background task reads envelopes and offers each one to every
/// registered channel; channels decide for themselves whether it is theirs.
/// Dropping the last handle stops the receive loop.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Connect to a device over TLS and start the receive loop.
    pub async fn connect(address: IpAddr, port: u16, config: &ConnectConfig) -> Result<Self> {
        let stream = castlink_transport::connect(address, port, &config.tls).await?;
        Ok(Self::from_stream(stream, config.frame.clone()))
    }

    /// Run the protocol over an already established byte stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_stream<S>(stream: S, config: FrameConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let shutdown = CancellationToken::new();
        let channels: Registry = Arc::new(RwLock::new(Vec::new()));

        let outbound = Outbound::new(Box::new(write_half), config.clone(), shutdown.clone());
        let reader = FrameReader::with_config(read_half, config);
        let task = tokio::spawn(receive_loop(
            reader,
            Arc::clone(&channels),
            shutdown.clone(),
        ));

        Self {
            inner: Arc::new(ConnectionInner {
                outbound: Arc::new(outbound),
                channels,
                shutdown,
                closing: AtomicBool::new(false),
                receive_task: Mutex::new(Some(task)),
            }),
        }
    }

    /// Create and register a channel. Valid at any time, including while
    /// messages are flowing.
    pub fn new_channel(
        &self,
        source: impl Into<String>,
        destination: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Channel {
        let id = ChannelId {
            source: source.into(),
            destination: destination.into(),
            namespace: namespace.into(),
        };
        debug!(channel = %id, "channel registered");
        let channel = Channel::new(id, Arc::clone(&self.inner.outbound));
        self.inner
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(channel.clone());
        channel
    }

    /// Write one envelope.
    pub async fn send(&self, envelope: &Envelope) -> Result<()> {
        self.inner.outbound.send(envelope).await
    }

    /// Number of registered channels.
    pub fn channel_count(&self) -> usize {
        self.inner
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the connection has stopped, by `close` or a transport error.
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Resolves once the connection has stopped.
    pub async fn closed(&self) {
        self.inner.shutdown.cancelled().await;
    }

    /// Stop the receive loop and shut down the stream. Idempotent.
    pub async fn close(&self) {
        if self.inner.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown.cancel();

        if let Err(err) = self.inner.outbound.writer.lock().await.shutdown().await {
            debug!(error = %err, "write half already gone");
        }

        let task = self
            .inner
            .receive_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "receive loop ended abnormally");
            }
        }
        info!("connection closed");
    }
}

async fn receive_loop<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    channels: Registry,
    shutdown: CancellationToken,
) {
    loop {
        let envelope = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = reader.read_envelope() => match result {
                Ok(envelope) => envelope,
                Err(FrameError::ConnectionClosed) => {
                    info!("device closed the connection");
                    break;
                }
                Err(err) if err.is_fatal() => {
                    warn!(error = %err, "receive loop stopped on transport error");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "dropping undecodable frame");
                    continue;
                }
            },
        };

        let header = match PayloadHeader::parse(&envelope) {
            Ok(header) => header,
            Err(err) => {
                warn!(
                    source = %envelope.source_id,
                    namespace = %envelope.namespace,
                    error = %err,
                    "dropping message with unparsable payload"
                );
                continue;
            }
        };

        debug!(
            source = %envelope.source_id,
            destination = %envelope.destination_id,
            namespace = %envelope.namespace,
            msg_type = %header.msg_type,
            request_id = ?header.request_id,
            "frame received"
        );

        let snapshot: Vec<Channel> = channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for channel in &snapshot {
            channel.route(&envelope, &header);
        }
    }
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn new_channel_registers() {
        let (local, _device) = tokio::io::duplex(1024);
        let conn = Connection::from_stream(local, FrameConfig::default());
        assert_eq!(conn.channel_count(), 0);
        conn.new_channel("sender-0", "receiver-0", "ns");
        conn.new_channel("sender-0", "receiver-0", "other");
        assert_eq!(conn.channel_count(), 2);
        conn.close().await;
    }

    #[tokio::test]
    async fn close_is_idempotent_and_rejects_sends() {
        let (local, _device) = tokio::io::duplex(1024);
        let conn = Connection::from_stream(local, FrameConfig::default());
        let channel = conn.new_channel("sender-0", "receiver-0", "ns");

        conn.close().await;
        conn.close().await;

        assert!(conn.is_closed());
        let err = channel
            .send(&PayloadHeader::of_type("PING"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnError::Closed));
    }

    #[tokio::test]
    async fn peer_eof_closes_connection() {
        let (local, device) = tokio::io::duplex(1024);
        let conn = Connection::from_stream(local, FrameConfig::default());
        drop(device);

        tokio::time::timeout(Duration::from_secs(1), conn.closed())
            .await
            .unwrap();
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn fatal_frame_error_closes_connection() {
        let (local, mut device) = tokio::io::duplex(1024);
        let conn = Connection::from_stream(local, FrameConfig::default());

        // A zero length prefix is never valid.
        device.write_all(&0u32.to_be_bytes()).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), conn.closed())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dropping_last_handle_stops_loop() {
        let (local, mut device) = tokio::io::duplex(1024);
        let conn = Connection::from_stream(local, FrameConfig::default());
        drop(conn);

        // Once the loop exits its read half is released and writes fail.
        let result = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if device.write_all(&[0u8; 16]).await.is_err() {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(result.is_ok());
    }
}
