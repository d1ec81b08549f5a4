//! Event-driven machines built on [`TransitionQueue`](crate::queue::TransitionQueue).
//!
//! A [`Machine`] owns a mailbox, a context and a queue. Its worker maps each
//! incoming [`Event`] to the first matching [`Rule`], runs the rule's effect
//! as a queued transition, and publishes a [`MachineSnapshot`] whenever the
//! queue settles. Actions reach other machines through [`RouteContext`].

mod definition;
mod error;
mod event;
mod route;
mod runtime;

pub use definition::{BoxFuture, MachineContext, MachineDefinition, Rule};
pub(crate) use definition::{Effect, ErrorRoute};
pub use error::DeliveryError;
pub use event::{Event, MachineSnapshot};
pub use route::{Delivery, RouteContext};
pub use runtime::Machine;
