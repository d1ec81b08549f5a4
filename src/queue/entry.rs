//! Queue entries and their processing status.

use crate::core::{State, StateTransition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where an entry is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl QueueStatus {
    /// `Completed` and `Error` are terminal.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// A transition waiting in, or moving through, a machine's queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct QueueEntry<S: State> {
    pub id: Uuid,
    /// Name of the owning machine
    pub machine: String,
    pub transition: StateTransition<S>,
    pub status: QueueStatus,
    /// Handler error text, set when `status` is `Error`
    pub error: Option<String>,
}

impl<S: State> QueueEntry<S> {
    pub(crate) fn pending(machine: &str, transition: StateTransition<S>) -> Self {
        Self {
            id: Uuid::new_v4(),
            machine: machine.to_string(),
            transition,
            status: QueueStatus::Pending,
            error: None,
        }
    }
}
