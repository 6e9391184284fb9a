use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broker::ConnectionEvent;

/// Frames a client may send, tagged by `type`.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe { topic: String },

    #[serde(rename = "unsubscribe")]
    Unsubscribe { topic: String },

    #[serde(rename = "publish")]
    Publish { topics: Vec<String>, data: Value },
}

impl ClientMessage {
    /// The registry event this frame maps to, if any. Empty topics map to
    /// nothing.
    pub fn into_event(self) -> Option<ConnectionEvent> {
        match self {
            ClientMessage::Subscribe { topic } if !topic.is_empty() => {
                Some(ConnectionEvent::Subscribe(topic))
            }
            ClientMessage::Unsubscribe { topic } if !topic.is_empty() => {
                Some(ConnectionEvent::Unsubscribe(topic))
            }
            _ => None,
        }
    }
}
