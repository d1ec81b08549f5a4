//! The externally observable snapshot of a machine.

use super::log::{LogEntry, LogLevel};
use crate::core::{State, StateHistory};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Current state, completed transitions, log and stability of one machine.
///
/// Owned by its queue. Everything handed to callers is a clone, so history
/// cannot be edited out of band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct ViewModel<S: State> {
    pub current_state: S,
    pub transitions: StateHistory<S>,
    pub log_entries: Vec<LogEntry>,
    pub is_stable: bool,
}

impl<S: State> ViewModel<S> {
    pub fn new(initial: S) -> Self {
        Self {
            current_state: initial,
            transitions: StateHistory::new(),
            log_entries: Vec::new(),
            is_stable: true,
        }
    }

    /// The slice of the view model stamped onto each log entry.
    pub fn fragment(&self) -> Value {
        json!({
            "currentState": self.current_state.name(),
            "isStable": self.is_stable,
        })
    }

    pub fn latest_log(&self) -> Option<&LogEntry> {
        self.log_entries.last()
    }

    pub fn logs_at(&self, level: LogLevel) -> impl Iterator<Item = &LogEntry> {
        self.log_entries.iter().filter(move |e| e.level == level)
    }

    /// Append a log entry, dropping the oldest entries beyond `limit`.
    pub(crate) fn append_log(
        &mut self,
        level: LogLevel,
        message: String,
        metadata: Value,
        limit: Option<usize>,
    ) {
        let entry = LogEntry::new(level, message, metadata, self.fragment());
        self.log_entries.push(entry);
        if let Some(limit) = limit {
            let excess = self.log_entries.len().saturating_sub(limit);
            if excess > 0 {
                self.log_entries.drain(..excess);
            }
        }
    }
}
