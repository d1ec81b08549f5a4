//! Transition handler errors.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single transition.
///
/// Never escapes `enqueue_transition`: the queue records it on the entry and
/// in the log, and leaves the current state unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    /// The handler reported a failure; the text is recorded verbatim.
    #[error("{0}")]
    Failed(String),

    /// The handler did not settle within the configured deadline.
    #[error("Transition handler timed out after {0:?}")]
    TimedOut(Duration),

    /// The caller driving the queue was dropped before the handler settled.
    #[error("Transition handler was abandoned before it settled")]
    Abandoned,
}

impl TransitionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<serde_json::Error> for TransitionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Failed(format!("Invalid payload: {err}"))
    }
}
