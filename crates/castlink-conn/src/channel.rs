use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use castlink_frame::{Envelope, PayloadHeader};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::connection::Outbound;
use crate::error::{ConnError, Result};

/// Callback invoked for unsolicited messages of a registered type.
pub type MessageCallback = dyn Fn(&Channel, &Envelope) + Send + Sync;

/// Addressing triple that identifies a logical channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId {
    pub source: String,
    pub destination: String,
    pub namespace: String,
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} [{}]",
            self.source, self.destination, self.namespace
        )
    }
}

/// A payload that can carry a correlation id.
pub trait RequestPayload: Serialize {
    /// The currently stamped request id, if any.
    fn request_id(&self) -> Option<i64>;

    /// Stamp a freshly allocated request id.
    fn set_request_id(&mut self, id: i64);
}

impl RequestPayload for PayloadHeader {
    fn request_id(&self) -> Option<i64> {
        self.request_id
    }

    fn set_request_id(&mut self, id: i64) {
        self.request_id = Some(id);
    }
}

/// Untyped payloads: the id lives in the top-level `requestId` key.
///
/// Only JSON objects can carry an id; stamping any other value is a no-op.
impl RequestPayload for serde_json::Value {
    fn request_id(&self) -> Option<i64> {
        self.get("requestId").and_then(serde_json::Value::as_i64)
    }

    fn set_request_id(&mut self, id: i64) {
        if let Some(object) = self.as_object_mut() {
            object.insert("requestId".to_string(), id.into());
        }
    }
}

struct Listener {
    msg_type: String,
    callback: Arc<MessageCallback>,
}

struct ChannelInner {
    id: ChannelId,
    outbound: Arc<Outbound>,
    next_request_id: AtomicI64,
    in_flight: Mutex<HashMap<i64, oneshot::Sender<Envelope>>>,
    listeners: RwLock<Vec<Listener>>,
}

impl ChannelInner {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<i64, oneshot::Sender<Envelope>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A logical `(source, destination, namespace)` conversation multiplexed
/// over one [`Connection`](crate::Connection).
///
/// Cheap to clone; all clones share the same in-flight table and listeners.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.inner.id)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Channel {
    pub(crate) fn new(id: ChannelId, outbound: Arc<Outbound>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                id,
                outbound,
                next_request_id: AtomicI64::new(1),
                in_flight: Mutex::new(HashMap::new()),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// This channel's addressing.
    pub fn id(&self) -> &ChannelId {
        &self.inner.id
    }

    /// Number of requests still waiting for a response.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight().len()
    }

    /// Serialize `payload` as JSON and send it on this channel.
    pub async fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let json = serde_json::to_string(payload)?;
        let id = &self.inner.id;
        let envelope = Envelope::text(&id.source, &id.destination, &id.namespace, json);
        self.inner.outbound.send(&envelope).await
    }

    /// Send `payload` stamped with a fresh request id and wait for the
    /// envelope carrying the same id.
    ///
    /// Resolves exactly once: with the response, or with
    /// [`ConnError::Timeout`] after `timeout`. The deadline covers the write
    /// as well as the wait, so a device that stops reading cannot stall the
    /// caller. The in-flight entry is gone by the time this returns, and
    /// also if the future is dropped early.
    pub async fn request<P: RequestPayload>(
        &self,
        payload: &mut P,
        timeout: Duration,
    ) -> Result<Envelope> {
        let request_id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        payload.set_request_id(request_id);

        let (tx, rx) = oneshot::channel();
        self.inner.in_flight().insert(request_id, tx);
        let _slot = InFlightSlot {
            channel: &self.inner,
            request_id,
        };

        let started = Instant::now();
        let exchange = async {
            self.send(&*payload).await?;
            rx.await.map_err(|_| ConnError::Closed)
        };
        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!(channel = %self.inner.id, request_id, "request timed out");
                Err(ConnError::Timeout {
                    request_id,
                    channel: self.inner.id.clone(),
                    elapsed: started.elapsed(),
                })
            }
        }
    }

    /// Register a callback for unsolicited messages whose `type` equals
    /// `msg_type`. Callbacks run on the receive loop in registration order
    /// and must not block.
    pub fn on_message<F>(&self, msg_type: impl Into<String>, callback: F)
    where
        F: Fn(&Channel, &Envelope) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Listener {
                msg_type: msg_type.into(),
                callback: Arc::new(callback),
            });
    }

    /// Whether an inbound envelope is addressed to this channel.
    pub(crate) fn accepts(&self, envelope: &Envelope) -> bool {
        let id = &self.inner.id;
        envelope.is_broadcast()
            || (envelope.source_id == id.destination
                && envelope.destination_id == id.source
                && envelope.namespace == id.namespace)
    }

    /// Deliver an inbound envelope: to its pending request if it carries a
    /// `requestId`, otherwise to the listeners for its type. A `requestId`
    /// with no pending request, including 0, is dropped.
    pub(crate) fn route(&self, envelope: &Envelope, header: &PayloadHeader) {
        if !self.accepts(envelope) {
            return;
        }

        if let Some(request_id) = header.request_id {
            let slot = self.inner.in_flight().remove(&request_id);
            match slot {
                Some(slot) => {
                    if slot.send(envelope.clone()).is_err() {
                        debug!(channel = %self.inner.id, request_id, "requester gone before response");
                    }
                }
                None => {
                    warn!(
                        channel = %self.inner.id,
                        request_id,
                        "dropping response for unknown request"
                    );
                }
            }
            return;
        }

        if header.msg_type.is_empty() {
            warn!(
                channel = %self.inner.id,
                payload = ?envelope.payload_utf8,
                "dropping message without a type"
            );
            return;
        }

        let callbacks: Vec<Arc<MessageCallback>> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|listener| listener.msg_type == header.msg_type)
            .map(|listener| Arc::clone(&listener.callback))
            .collect();

        for callback in callbacks {
            callback(self, envelope);
        }
    }
}

/// Removes an in-flight entry when the request finishes or is abandoned.
struct InFlightSlot<'a> {
    channel: &'a ChannelInner,
    request_id: i64,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.channel.in_flight().remove(&self.request_id);
    }
}
