//! Outbound event definitions
//!
//! Every delivery is an event named after the topic key. On the wire that is
//! a JSON text frame `{"event": <topic>, "payload": <payload>}`, where the
//! payload is one of:
//! - `{"status": true, "method": "update", "data": <document>}`
//! - `{"status": false, "data": <failure reason>}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reason sent to a subscriber whose session is missing or unauthenticated.
pub const NOT_AUTHENTICATED: &str = "not authenticated";

const UPDATE_METHOD: &str = "update";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub data: Value,
}

impl Payload {
    /// A successful document update.
    pub fn update(document: &Value) -> Self {
        Self {
            status: true,
            method: Some(UPDATE_METHOD.to_string()),
            data: document.clone(),
        }
    }

    /// An authorization failure carrying the reason as its data.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            status: false,
            method: None,
            data: Value::String(reason.into()),
        }
    }

    pub fn is_update(&self) -> bool {
        self.status && self.method.as_deref() == Some(UPDATE_METHOD)
    }
}

/// A named event as framed on the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    pub payload: Payload,
}

impl EventFrame {
    pub fn new(event: &str, payload: Payload) -> Self {
        Self {
            event: event.to_string(),
            payload,
        }
    }
}
