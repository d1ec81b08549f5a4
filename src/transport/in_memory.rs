//! A transport whose peer lives in the same process.

use super::handler::{empty_response, MessageHandler, MessagingTransport};
use super::message::{CaveMessage, Destination, Endpoint, MessageSender};
use crate::core::Subscription;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};
use uuid::Uuid;

type HandlerSlot = Mutex<Option<(u64, Arc<dyn MessageHandler>)>>;

/// In-process [`MessagingTransport`], for tests and single-process setups.
///
/// Each transport holds at most one active handler: installing a handler
/// replaces the previous one. Messages are serialized to JSON and back on
/// the way to the peer, so the receiver never shares data with the sender.
///
/// ```rust
/// use serde_json::json;
/// use tomekit::transport::{
///     handler_fn, wire_in_memory_transport_pair, CaveMessage, ContextType, Endpoint,
///     InMemoryTransport, MessagingTransport,
/// };
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let content = InMemoryTransport::new(Endpoint::content(1));
/// let background = InMemoryTransport::new(Endpoint::background());
/// wire_in_memory_transport_pair(&content, &background);
///
/// let _sub = background.on_message(handler_fn(|message, _sender| {
///     json!({ "echo": message.message_type })
/// }));
///
/// let response = content
///     .send(ContextType::Background.into(), CaveMessage::new("PING"))
///     .await;
/// assert_eq!(response, json!({ "echo": "PING" }));
/// # });
/// ```
pub struct InMemoryTransport {
    endpoint: Endpoint,
    handler: Arc<HandlerSlot>,
    next_generation: AtomicU64,
    peer: RwLock<Weak<InMemoryTransport>>,
}

impl InMemoryTransport {
    pub fn new(endpoint: Endpoint) -> Arc<Self> {
        Arc::new(Self {
            endpoint,
            handler: Arc::new(Mutex::new(None)),
            next_generation: AtomicU64::new(1),
            peer: RwLock::new(Weak::new()),
        })
    }

    /// Link to `peer`. Held weakly: dropping the peer unwires it.
    pub fn set_peer(&self, peer: &Arc<InMemoryTransport>) {
        *self.peer.write() = Arc::downgrade(peer);
    }

    pub fn unwire(&self) {
        *self.peer.write() = Weak::new();
    }

    pub fn is_wired(&self) -> bool {
        self.peer.read().strong_count() > 0
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().is_some()
    }

    fn current_handler(&self) -> Option<Arc<dyn MessageHandler>> {
        self.handler
            .lock()
            .as_ref()
            .map(|(_, handler)| Arc::clone(handler))
    }

    /// Fill in the fields the sender left out.
    fn normalize(&self, destination: Destination, mut message: CaveMessage) -> CaveMessage {
        message.source.get_or_insert(self.endpoint.context);
        message.target.get_or_insert(destination);
        message
            .trace_id
            .get_or_insert_with(|| Uuid::new_v4().to_string());
        message
    }
}

/// Serialize and deserialize, so nothing is shared across the boundary.
fn cross_boundary(message: &CaveMessage) -> Result<CaveMessage, serde_json::Error> {
    serde_json::to_value(message).and_then(serde_json::from_value)
}

#[async_trait]
impl MessagingTransport for InMemoryTransport {
    fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    async fn send(&self, destination: Destination, message: CaveMessage) -> Value {
        let message = self.normalize(destination, message);
        let trace_id = message.trace_id.clone().unwrap_or_default();

        let Some(peer) = self.peer.read().upgrade() else {
            debug!(from = %self.endpoint.context, trace_id = %trace_id, message = %message.message_type, "no peer wired");
            return empty_response();
        };

        if !destination.matches(&peer.endpoint) {
            warn!(
                from = %self.endpoint.context,
                to = %destination.context(),
                peer = %peer.endpoint.context,
                trace_id = %trace_id,
                "destination does not match the wired peer"
            );
            return empty_response();
        }

        let Some(handler) = peer.current_handler() else {
            debug!(to = %peer.endpoint.context, trace_id = %trace_id, "peer has no handler");
            return empty_response();
        };

        let delivered = match cross_boundary(&message) {
            Ok(delivered) => delivered,
            Err(err) => {
                warn!(trace_id = %trace_id, error = %err, "message could not be serialized");
                return empty_response();
            }
        };

        debug!(from = %self.endpoint.context, to = %peer.endpoint.context, trace_id = %trace_id, message = %delivered.message_type, "delivering message");
        handler
            .handle(delivered, MessageSender::from(self.endpoint))
            .await
    }

    fn on_message(&self, handler: Arc<dyn MessageHandler>) -> Subscription {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let replaced = self
            .handler
            .lock()
            .replace((generation, handler))
            .is_some();
        if replaced {
            debug!(endpoint = %self.endpoint.context, "message handler replaced");
        }

        let slot: Weak<HandlerSlot> = Arc::downgrade(&self.handler);
        Subscription::new(move || {
            let Some(slot) = slot.upgrade() else {
                return;
            };
            let mut slot = slot.lock();
            if matches!(&*slot, Some((current, _)) if *current == generation) {
                *slot = None;
            }
        })
    }
}

impl fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTransport")
            .field("endpoint", &self.endpoint)
            .field("wired", &self.is_wired())
            .field("has_handler", &self.has_handler())
            .finish()
    }
}

/// Wire two transports to each other, so `send` on one reaches the other's handler.
pub fn wire_in_memory_transport_pair(a: &Arc<InMemoryTransport>, b: &Arc<InMemoryTransport>) {
    a.set_peer(b);
    b.set_peer(a);
    debug!(a = %a.endpoint.context, b = %b.endpoint.context, "transports wired");
}
