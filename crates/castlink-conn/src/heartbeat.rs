use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::connection::Connection;
use crate::control::{self, MSG_PING, MSG_PONG, NAMESPACE_HEARTBEAT};

/// Keep-alive tuning.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Time between outbound `PING`s. Default: 5s.
    pub interval: Duration,
    /// Close the connection when no `PING`/`PONG` has arrived from the
    /// device for this long. Default: disabled.
    pub peer_timeout: Option<Duration>,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            peer_timeout: None,
        }
    }
}

impl HeartbeatConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = Some(timeout);
        self
    }
}

type LastSeen = Arc<Mutex<Instant>>;

fn touch(last_seen: &LastSeen) {
    *last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
}

fn silent_for(last_seen: &LastSeen) -> Duration {
    last_seen
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .elapsed()
}

struct Running {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Keep-alive on the heartbeat namespace.
///
/// Answers every inbound `PING` with one `PONG` from the moment it is
/// created. [`start`](Self::start) additionally sends a `PING` every
/// interval; a failed send closes the connection.
pub struct Heartbeat {
    channel: Channel,
    connection: Connection,
    config: HeartbeatConfig,
    last_seen: LastSeen,
    running: Mutex<Option<Running>>,
}

impl Heartbeat {
    pub fn new(
        connection: &Connection,
        source: impl Into<String>,
        destination: impl Into<String>,
        config: HeartbeatConfig,
    ) -> Self {
        let channel = connection.new_channel(source, destination, NAMESPACE_HEARTBEAT);
        let last_seen: LastSeen = Arc::new(Mutex::new(Instant::now()));

        let seen = Arc::clone(&last_seen);
        channel.on_message(MSG_PING, move |channel, _| {
            touch(&seen);
            let channel = channel.clone();
            tokio::spawn(async move {
                if let Err(err) = channel.send(&control::pong()).await {
                    warn!(channel = %channel.id(), error = %err, "failed to answer PING");
                }
            });
        });

        let seen = Arc::clone(&last_seen);
        channel.on_message(MSG_PONG, move |_, _| touch(&seen));

        Self {
            channel,
            connection: connection.clone(),
            config,
            last_seen,
            running: Mutex::new(None),
        }
    }

    /// The heartbeat channel.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Whether the outbound loop is running.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Start sending `PING`s until `cancel` fires, [`stop`](Self::stop) is
    /// called or the connection closes. A running loop is stopped first.
    pub async fn start(&self, cancel: &CancellationToken) {
        self.stop().await;

        touch(&self.last_seen);
        let token = cancel.child_token();
        let task = tokio::spawn(run(
            self.channel.clone(),
            self.connection.clone(),
            self.config.clone(),
            Arc::clone(&self.last_seen),
            token.clone(),
        ));
        *self.running.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Running { token, task });
        info!(interval = ?self.config.interval, "heartbeat started");
    }

    /// Stop the outbound loop and wait for it to finish.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Running { token, task }) = running {
            token.cancel();
            if let Err(err) = task.await {
                warn!(error = %err, "heartbeat loop ended abnormally");
            }
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        let running = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Running { token, .. }) = running {
            token.cancel();
        }
    }
}

async fn run(
    channel: Channel,
    connection: Connection,
    config: HeartbeatConfig,
    last_seen: LastSeen,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = connection.closed() => break,
            _ = ticker.tick() => {
                if let Some(timeout) = config.peer_timeout {
                    let silent = silent_for(&last_seen);
                    if silent > timeout {
                        warn!(?silent, "device stopped answering heartbeats, closing connection");
                        connection.close().await;
                        break;
                    }
                }
                if let Err(err) = channel.send(&control::ping()).await {
                    warn!(error = %err, "heartbeat failed, closing connection");
                    connection.close().await;
                    break;
                }
            }
        }
    }
    debug!("heartbeat stopped");
}

#[cfg(test)]
mod tests {
    use castlink_frame::{Envelope, FrameConfig, FrameReader, FrameWriter, PayloadHeader};
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    use super::*;

    const RECEIVER_NS: &str = "urn:x-cast:com.google.cast.receiver";

    struct Device {
        reader: FrameReader<ReadHalf<DuplexStream>>,
        writer: FrameWriter<WriteHalf<DuplexStream>>,
    }

    impl Device {
        async fn say(&mut self, msg_type: &str) {
            let payload = serde_json::to_string(&PayloadHeader::of_type(msg_type)).unwrap();
            let env = Envelope::text("receiver-0", "sender-0", NAMESPACE_HEARTBEAT, payload);
            self.writer.send(&env).await.unwrap();
        }

        async fn hear(&mut self) -> String {
            let env = self.reader.read_envelope().await.unwrap();
            assert_eq!(env.namespace, NAMESPACE_HEARTBEAT);
            PayloadHeader::parse(&env).unwrap().msg_type
        }

        async fn is_silent_for(&mut self, window: Duration) -> bool {
            tokio::time::timeout(window, self.reader.read_envelope())
                .await
                .is_err()
        }
    }

    fn setup(config: HeartbeatConfig) -> (Connection, Heartbeat, Device) {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let connection = Connection::from_stream(local, FrameConfig::default());
        let heartbeat = Heartbeat::new(&connection, "sender-0", "receiver-0", config);
        let (read_half, write_half) = tokio::io::split(remote);
        let device = Device {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
        };
        (connection, heartbeat, device)
    }

    #[test]
    fn default_config() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert!(config.peer_timeout.is_none());
    }

    #[tokio::test]
    async fn ping_is_answered_with_exactly_one_pong() {
        let (_connection, _heartbeat, mut device) = setup(HeartbeatConfig::default());

        device.say(MSG_PING).await;

        assert_eq!(device.hear().await, MSG_PONG);
        assert!(device.is_silent_for(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn start_sends_pings_on_interval() {
        let config = HeartbeatConfig::default().with_interval(Duration::from_millis(20));
        let (_connection, heartbeat, mut device) = setup(config);

        heartbeat.start(&CancellationToken::new()).await;
        assert!(heartbeat.is_running());

        assert_eq!(device.hear().await, MSG_PING);
        assert_eq!(device.hear().await, MSG_PING);
        heartbeat.stop().await;
    }

    #[tokio::test]
    async fn stop_halts_pings() {
        let config = HeartbeatConfig::default().with_interval(Duration::from_millis(20));
        let (_connection, heartbeat, mut device) = setup(config);

        heartbeat.start(&CancellationToken::new()).await;
        assert_eq!(device.hear().await, MSG_PING);
        heartbeat.stop().await;

        assert!(!heartbeat.is_running());
        assert!(device.is_silent_for(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn dropping_heartbeat_stops_pings() {
        let config = HeartbeatConfig::default().with_interval(Duration::from_millis(20));
        let (_connection, heartbeat, mut device) = setup(config);

        heartbeat.start(&CancellationToken::new()).await;
        assert_eq!(device.hear().await, MSG_PING);
        drop(heartbeat);

        // A PING already on the wire may still arrive; after that, nothing.
        tokio::time::timeout(Duration::from_secs(1), async {
            while !device.is_silent_for(Duration::from_millis(100)).await {}
        })
        .await
        .expect("PINGs kept flowing after the heartbeat was dropped");
    }

    #[tokio::test]
    async fn pong_does_not_disturb_request_on_other_channel() {
        let (connection, heartbeat, mut device) = setup(HeartbeatConfig::default());
        let receiver = connection.new_channel("sender-0", "receiver-0", RECEIVER_NS);
        let requester = receiver.clone();
        let pending = tokio::spawn(async move {
            let mut payload = PayloadHeader::of_type("GET_STATUS");
            requester.request(&mut payload, Duration::from_secs(5)).await
        });

        let request = device.reader.read_envelope().await.unwrap();
        assert_eq!(request.namespace, RECEIVER_NS);
        let request_id = PayloadHeader::parse(&request).unwrap().request_id.unwrap();

        device.say(MSG_PING).await;
        assert_eq!(device.hear().await, MSG_PONG);
        assert_eq!(receiver.in_flight(), 1);

        let reply = format!(r#"{{"type":"RECEIVER_STATUS","requestId":{request_id}}}"#);
        let env = Envelope::text("receiver-0", "sender-0", RECEIVER_NS, reply);
        device.writer.send(&env).await.unwrap();

        let response = pending.await.unwrap().unwrap();
        assert_eq!(response, env);
        assert_eq!(receiver.in_flight(), 0);
        assert_eq!(heartbeat.channel().in_flight(), 0);
    }

    #[tokio::test]
    async fn parent_cancel_stops_loop() {
        let config = HeartbeatConfig::default().with_interval(Duration::from_millis(20));
        let (_connection, heartbeat, _device) = setup(config);
        let cancel = CancellationToken::new();

        heartbeat.start(&cancel).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), async {
            while heartbeat.is_running() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn restart_replaces_previous_loop() {
        let config = HeartbeatConfig::default().with_interval(Duration::from_millis(50));
        let (_connection, heartbeat, mut device) = setup(config);
        let cancel = CancellationToken::new();

        heartbeat.start(&cancel).await;
        heartbeat.start(&cancel).await;

        // One loop: one PING per interval, not two.
        assert_eq!(device.hear().await, MSG_PING);
        assert!(device.is_silent_for(Duration::from_millis(30)).await);
        heartbeat.stop().await;
    }

    #[tokio::test]
    async fn silent_device_is_disconnected() {
        let config = HeartbeatConfig::default()
            .with_interval(Duration::from_millis(20))
            .with_peer_timeout(Duration::from_millis(60));
        let (connection, heartbeat, _device) = setup(config);

        heartbeat.start(&CancellationToken::new()).await;

        tokio::time::timeout(Duration::from_secs(2), connection.closed())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn answering_device_stays_connected() {
        let config = HeartbeatConfig::default()
            .with_interval(Duration::from_millis(20))
            .with_peer_timeout(Duration::from_millis(60));
        let (connection, heartbeat, mut device) = setup(config);

        heartbeat.start(&CancellationToken::new()).await;
        for _ in 0..10 {
            assert_eq!(device.hear().await, MSG_PING);
            device.say(MSG_PONG).await;
        }

        assert!(!connection.is_closed());
        heartbeat.stop().await;
    }
}
