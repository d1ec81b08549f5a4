//! Message handlers and the transport trait.

use super::message::{CaveMessage, Destination, Endpoint, MessageSender};
use crate::core::Subscription;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Receives messages arriving at a transport and produces the response.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: CaveMessage, sender: MessageSender) -> Value;
}

/// Adapts a synchronous closure into a [`MessageHandler`].
pub fn handler_fn<F>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(CaveMessage, MessageSender) -> Value + Send + Sync + 'static,
{
    Arc::new(FnMessageHandler(f))
}

struct FnMessageHandler<F>(F);

#[async_trait]
impl<F> MessageHandler for FnMessageHandler<F>
where
    F: Fn(CaveMessage, MessageSender) -> Value + Send + Sync + 'static,
{
    async fn handle(&self, message: CaveMessage, sender: MessageSender) -> Value {
        (self.0)(message, sender)
    }
}

/// Request/response messaging between execution contexts.
///
/// `send` never fails: when nothing answers, the response is `{}`.
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    fn endpoint(&self) -> Endpoint;

    async fn send(&self, destination: Destination, message: CaveMessage) -> Value;

    /// Install the handler for incoming messages.
    fn on_message(&self, handler: Arc<dyn MessageHandler>) -> Subscription;
}

/// The canonical "nothing answered" response.
pub fn empty_response() -> Value {
    Value::Object(serde_json::Map::new())
}
