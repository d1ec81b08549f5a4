//! Append-only machine log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// One line of a machine's log.
///
/// `view_model` is a fragment of the view model at the moment of logging
/// (`currentState` and `isStable`), not a full copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub metadata: Value,
    pub view_model: Value,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, metadata: Value, view_model: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
            metadata,
            view_model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_serializes_with_wire_names() {
        let entry = LogEntry::new(
            LogLevel::Warning,
            "slow handler",
            json!({ "elapsedMs": 1200 }),
            json!({ "currentState": "saving", "isStable": false }),
        );

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "WARNING");
        assert_eq!(json["viewModel"]["currentState"], "saving");
        assert_eq!(json["metadata"]["elapsedMs"], 1200);
    }

    #[test]
    fn entries_get_distinct_ids() {
        let a = LogEntry::new(LogLevel::Info, "a", Value::Null, Value::Null);
        let b = LogEntry::new(LogLevel::Info, "b", Value::Null, Value::Null);
        assert_ne!(a.id, b.id);
    }
}
