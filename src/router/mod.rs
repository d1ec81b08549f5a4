//! Machine registry and path-based addressing.
//!
//! Machines find each other by name. A machine's parent is recorded as a
//! name, so `../Sibling` resolves by walking names through the
//! [`MachineRouter`] rather than following references.

mod addressable;
mod path;
mod registry;

pub use addressable::{Addressable, RoutedMachine, SnapshotCallback};
pub use path::{RoutePath, Segment};
pub use registry::MachineRouter;
