//! Transition records and the ordered history a machine accumulates.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A move from one state to another.
///
/// Immutable once recorded in a [`StateHistory`].
///
/// # Example
///
/// ```rust
/// use tomekit::core::{State, StateTransition};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum Phase { Idle, Editing }
///
/// impl State for Phase {
///     fn name(&self) -> &str {
///         match self {
///             Self::Idle => "idle",
///             Self::Editing => "editing",
///         }
///     }
/// }
///
/// let transition = StateTransition::new(Phase::Idle, Phase::Editing);
/// assert_eq!(transition.label(), "idle -> editing");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State> {
    /// The state being transitioned from
    pub from: S,
    /// The state being transitioned to
    pub to: S,
    /// When the transition was requested
    pub timestamp: DateTime<Utc>,
}

impl<S: State> StateTransition<S> {
    /// Create a transition stamped with the current time.
    pub fn new(from: S, to: S) -> Self {
        Self {
            from,
            to,
            timestamp: Utc::now(),
        }
    }

    /// `"<from> -> <to>"`, used in log messages.
    pub fn label(&self) -> String {
        format!("{} -> {}", self.from.name(), self.to.name())
    }
}

/// Ordered history of completed transitions.
///
/// Only the queue drain loop appends to it; callers see clones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "", transparent)]
pub struct StateHistory<S: State> {
    transitions: Vec<StateTransition<S>>,
}

impl<S: State> Default for StateHistory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> StateHistory<S> {
    /// Create an empty history.
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Append a transition in place.
    pub fn push(&mut self, transition: StateTransition<S>) {
        self.transitions.push(transition);
    }

    /// States traversed: the first `from`, then every `to`.
    pub fn get_path(&self) -> Vec<&S> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    /// All transitions in completion order.
    pub fn transitions(&self) -> &[StateTransition<S>] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum DocState {
        Idle,
        Editing,
        Saving,
    }

    impl State for DocState {
        fn name(&self) -> &str {
            match self {
                Self::Idle => "idle",
                Self::Editing => "editing",
                Self::Saving => "saving",
            }
        }
    }

    fn history_of(steps: &[(DocState, DocState)]) -> StateHistory<DocState> {
        let mut history = StateHistory::new();
        for (from, to) in steps {
            history.push(StateTransition::new(from.clone(), to.clone()));
        }
        history
    }

    #[test]
    fn new_history_is_empty() {
        let history: StateHistory<DocState> = StateHistory::new();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
    }

    #[test]
    fn push_appends_in_place() {
        let mut history = StateHistory::new();
        history.push(StateTransition::new(DocState::Idle, DocState::Editing));
        history.push(StateTransition::new(DocState::Editing, DocState::Saving));

        assert_eq!(history.len(), 2);
        assert_eq!(history.transitions()[1].to, DocState::Saving);
    }

    #[test]
    fn get_path_returns_state_sequence() {
        let history = history_of(&[
            (DocState::Idle, DocState::Editing),
            (DocState::Editing, DocState::Saving),
        ]);

        assert_eq!(
            history.get_path(),
            vec![&DocState::Idle, &DocState::Editing, &DocState::Saving]
        );
    }

    #[test]
    fn label_names_both_ends() {
        let t = StateTransition::new(DocState::Editing, DocState::Saving);
        assert_eq!(t.label(), "editing -> saving");
    }

    #[test]
    fn history_serializes_as_plain_list() {
        let history = history_of(&[(DocState::Idle, DocState::Editing)]);

        let json = serde_json::to_value(&history).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["from"], "Idle");

        let back: StateHistory<DocState> = serde_json::from_value(json).unwrap();
        assert_eq!(back, history);
    }
}
