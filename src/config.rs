//! Queue and machine tunables.
//!
//! Everything here is opt-in: the default configuration enforces no handler
//! deadline and keeps every log entry.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`TransitionQueue`](crate::queue::TransitionQueue) and
/// the machine that owns it.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tomekit::config::QueueConfig;
///
/// let config = QueueConfig::default()
///     .handler_timeout(Duration::from_secs(5))
///     .max_log_entries(500);
///
/// assert_eq!(config.handler_timeout, Some(Duration::from_secs(5)));
///
/// let loaded = QueueConfig::from_json(r#"{ "max_log_entries": 100 }"#).unwrap();
/// assert_eq!(loaded.max_log_entries, Some(100));
/// assert!(loaded.handler_timeout.is_none());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Deadline for a single transition handler. `None` waits forever.
    pub handler_timeout: Option<Duration>,

    /// Upper bound on retained log entries; the oldest are dropped first.
    pub max_log_entries: Option<usize>,
}

impl QueueConfig {
    /// Set a deadline after which a running handler settles as an error.
    pub fn handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    /// Bound the log to `limit` entries.
    pub fn max_log_entries(mut self, limit: usize) -> Self {
        self.max_log_entries = Some(limit);
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
