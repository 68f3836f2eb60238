use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::channel::Channel;
use crate::connection::Connection;
use crate::control::{self, MSG_CLOSE, NAMESPACE_CONNECTION};
use crate::error::Result;

/// A virtual connection between one sender id and one receiver id.
///
/// Devices ignore traffic for a destination until a `CONNECT` has been sent
/// to it, and announce `CLOSE` when they drop the session (app exit, device
/// shutdown).
pub struct VirtualConnection {
    channel: Channel,
    closed_by_peer: Arc<AtomicBool>,
}

impl VirtualConnection {
    pub fn new(
        connection: &Connection,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        let channel = connection.new_channel(source, destination, NAMESPACE_CONNECTION);
        let closed_by_peer = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&closed_by_peer);
        channel.on_message(MSG_CLOSE, move |channel, _| {
            info!(channel = %channel.id(), "device closed the virtual connection");
            flag.store(true, Ordering::SeqCst);
        });

        Self {
            channel,
            closed_by_peer,
        }
    }

    /// Send `CONNECT`.
    pub async fn open(&self) -> Result<()> {
        self.closed_by_peer.store(false, Ordering::SeqCst);
        self.channel.send(&control::connect()).await
    }

    /// Send `CLOSE`.
    pub async fn close(&self) -> Result<()> {
        self.channel.send(&control::close()).await
    }

    /// Whether the device has sent `CLOSE` since the last [`open`](Self::open).
    pub fn is_closed_by_peer(&self) -> bool {
        self.closed_by_peer.load(Ordering::SeqCst)
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}
