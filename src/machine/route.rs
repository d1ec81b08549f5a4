//! Best-effort routed sends available to transition actions.

use super::event::Event;
use crate::router::{Addressable, MachineRouter};
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of a routed send. Never an error: the sender carries on either way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The event is in the target's mailbox.
    Delivered,
    /// Nothing is registered at the path.
    Unresolved,
    /// The target exists but no longer accepts events.
    Rejected,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// The router as seen from inside one machine's transition.
///
/// Carries the sending machine's name and parent at the time the transition
/// started, so relative paths resolve even if the machine itself has been
/// unregistered since.
#[derive(Clone, Debug)]
pub struct RouteContext {
    router: MachineRouter,
    origin: String,
    parent: Option<String>,
}

impl RouteContext {
    pub fn new(router: MachineRouter, origin: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            router,
            origin: origin.into(),
            parent,
        }
    }

    pub fn router(&self) -> &MachineRouter {
        &self.router
    }

    /// Resolve `path` relative to the sending machine and post an event there.
    pub fn send(&self, path: &str, event_type: &str, payload: Value) -> Delivery {
        let Some(target) = self.router.resolve_relative(path, self) else {
            warn!(machine = %self.origin, path, event = event_type, "routed send dropped: no machine at path");
            return Delivery::Unresolved;
        };

        match target.send(Event::with_payload(event_type, payload)) {
            Ok(()) => {
                debug!(machine = %self.origin, path, target = target.name(), event = event_type, "routed send delivered");
                Delivery::Delivered
            }
            Err(err) => {
                warn!(machine = %self.origin, path, event = event_type, error = %err, "routed send dropped");
                Delivery::Rejected
            }
        }
    }
}

impl Addressable for RouteContext {
    fn name(&self) -> &str {
        &self.origin
    }

    fn parent_name(&self) -> Option<String> {
        self.parent.clone()
    }
}
