//! The surface a machine exposes to the router and to its owner.

use crate::core::Subscription;
use crate::machine::{DeliveryError, Event, MachineSnapshot};
use async_trait::async_trait;

/// Callback handed to [`RoutedMachine::subscribe`].
pub type SnapshotCallback = Box<dyn Fn(&MachineSnapshot) + Send + Sync>;

/// Anything that has a name and, optionally, the name of its parent.
///
/// Parent links are names, never live references: following one always goes
/// back through the router.
pub trait Addressable {
    fn name(&self) -> &str;

    fn parent_name(&self) -> Option<String>;
}

/// A machine as seen through the router: addressable, startable, and able to
/// accept events.
#[async_trait]
pub trait RoutedMachine: Addressable + Send + Sync {
    /// Queue `event` on the machine's mailbox.
    fn send(&self, event: Event) -> Result<(), DeliveryError>;

    fn snapshot(&self) -> MachineSnapshot;

    /// Observe snapshots: once now, then after every settled transition.
    fn subscribe(&self, callback: SnapshotCallback) -> Subscription;

    fn start(&self);

    /// Close the mailbox. Work already accepted still runs to completion.
    fn stop(&self);

    fn set_parent(&self, parent: Option<String>);

    /// No event waiting or running, and the queue is stable.
    fn is_settled(&self) -> bool;

    async fn settled(&self);
}
