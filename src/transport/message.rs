//! Wire types exchanged between execution contexts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The kind of execution context a transport lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    Background,
    Content,
    Popup,
}

impl ContextType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Content => "content",
            Self::Popup => "popup",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one transport: its context type and, for content contexts, its tab.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub context: ContextType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<u32>,
}

impl Endpoint {
    pub fn new(context: ContextType) -> Self {
        Self {
            context,
            tab_id: None,
        }
    }

    pub fn background() -> Self {
        Self::new(ContextType::Background)
    }

    pub fn popup() -> Self {
        Self::new(ContextType::Popup)
    }

    pub fn content(tab_id: u32) -> Self {
        Self {
            context: ContextType::Content,
            tab_id: Some(tab_id),
        }
    }
}

/// Where a message is addressed.
///
/// Serialized as a bare context name (`"background"`) or as
/// `{ "to": "content", "tabId": 7 }`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destination {
    Context(ContextType),
    Instance {
        to: ContextType,
        #[serde(rename = "tabId")]
        tab_id: u32,
    },
}

impl Destination {
    pub fn content(tab_id: u32) -> Self {
        Self::Instance {
            to: ContextType::Content,
            tab_id,
        }
    }

    pub fn context(&self) -> ContextType {
        match self {
            Self::Context(context) => *context,
            Self::Instance { to, .. } => *to,
        }
    }

    /// Whether `endpoint` is addressed by this destination.
    pub fn matches(&self, endpoint: &Endpoint) -> bool {
        match self {
            Self::Context(context) => endpoint.context == *context,
            Self::Instance { to, tab_id } => {
                endpoint.context == *to && endpoint.tab_id == Some(*tab_id)
            }
        }
    }
}

impl From<ContextType> for Destination {
    fn from(context: ContextType) -> Self {
        Self::Context(context)
    }
}

impl From<Endpoint> for Destination {
    fn from(endpoint: Endpoint) -> Self {
        match endpoint.tab_id {
            Some(tab_id) => Self::Instance {
                to: endpoint.context,
                tab_id,
            },
            None => Self::Context(endpoint.context),
        }
    }
}

/// A message crossing a context boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaveMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ContextType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Destination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl CaveMessage {
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            payload: None,
            source: None,
            target: None,
            trace_id: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// Who sent a message, as seen by the receiving handler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSender {
    /// Context name of the sending transport
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<u32>,
}

impl From<Endpoint> for MessageSender {
    fn from(endpoint: Endpoint) -> Self {
        Self {
            id: endpoint.context.to_string(),
            tab_id: endpoint.tab_id,
        }
    }
}
