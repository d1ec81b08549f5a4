//! Per-machine transition queues and the view models they maintain.
//!
//! A [`TransitionQueue`] accepts transitions from any number of concurrent
//! callers and settles them one at a time, in order. Each settled entry
//! either advances the current state (`Completed`) or leaves it unchanged
//! (`Error`), and both outcomes land in the view model's log.

mod entry;
mod error;
mod log;
mod transition_queue;
mod view_model;

pub use entry::{QueueEntry, QueueStatus};
pub use error::TransitionError;
pub use log::{LogEntry, LogLevel};
pub use transition_queue::{handler_fn, FnHandler, TransitionHandler, TransitionQueue};
pub use view_model::ViewModel;
