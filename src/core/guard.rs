//! Guard predicates that gate a transition rule on the machine's current state.

use super::state::State;
use std::fmt;
use std::sync::Arc;

/// Pure predicate evaluated before a rule fires.
///
/// Guards see only the current state; they must be deterministic and free of
/// side effects. Cloning a guard shares the predicate.
///
/// # Example
///
/// ```rust
/// use tomekit::core::{Guard, State};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum Health { Idle, Monitoring, Stopped }
///
/// impl State for Health {
///     fn name(&self) -> &str {
///         match self {
///             Self::Idle => "idle",
///             Self::Monitoring => "monitoring",
///             Self::Stopped => "stopped",
///         }
///     }
///
///     fn is_final(&self) -> bool {
///         matches!(self, Self::Stopped)
///     }
/// }
///
/// let still_running = Guard::new(|s: &Health| !s.is_final());
///
/// assert!(still_running.check(&Health::Monitoring));
/// assert!(!still_running.check(&Health::Stopped));
/// ```
pub struct Guard<S: State> {
    predicate: Arc<dyn Fn(&S) -> bool + Send + Sync>,
}

impl<S: State> Guard<S> {
    /// Create a guard from a predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Whether the guard allows a transition out of `state`.
    pub fn check(&self, state: &S) -> bool {
        (self.predicate)(state)
    }
}

impl<S: State> Clone for Guard<S> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<S: State> fmt::Debug for Guard<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard(..)")
    }
}
