//! Messaging between execution contexts.
//!
//! A [`MessagingTransport`] sends a [`CaveMessage`] to a [`Destination`] and
//! resolves with whatever the receiving handler returns, or `{}` when nobody
//! answers. [`InMemoryTransport`] is the in-process implementation.

mod handler;
mod in_memory;
mod message;

pub use handler::{empty_response, handler_fn, MessageHandler, MessagingTransport};
pub use in_memory::{wire_in_memory_transport_pair, InMemoryTransport};
pub use message::{CaveMessage, ContextType, Destination, Endpoint, MessageSender};
