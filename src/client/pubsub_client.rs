//! Client representation
//!
//! `Client` models a connected WebSocket client. It holds the sending side
//! of a per-client channel drained by the transport's writer task, the
//! session id presented at connect time, and its lifecycle state.

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use tungstenite::protocol::Message as WsMessage;
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::Utf8Bytes;
use tungstenite::protocol::frame::coding::CloseCode;
use uuid::Uuid;

use super::connection::Connection;
use super::state::ConnectionState;
use crate::broker::message::{EventFrame, Payload};
use crate::broker::topic::ConnectionId;
use crate::utils::error::DeliveryError;

#[derive(Debug)]
pub struct Client {
    pub id: ConnectionId,
    pub session_id: String,
    pub sender: UnboundedSender<WsMessage>,
    state: Mutex<ConnectionState>,
    terminated: Notify,
}

impl Client {
    /// Create an authorized client for a connection whose handshake resolved
    /// `session_id`. The `id` is a fresh UUID.
    pub fn new(session_id: impl Into<String>, sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            sender,
            state: Mutex::new(ConnectionState::Connecting.authorize()),
            terminated: Notify::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Apply `f` to the current state and return the result.
    pub fn transition(
        &self,
        f: impl FnOnce(ConnectionState) -> ConnectionState,
    ) -> ConnectionState {
        let mut state = self.state.lock();
        *state = f(*state);
        *state
    }

    /// Resolves once [`Connection::terminate`] has run, even if it ran
    /// before this was awaited.
    pub async fn terminated(&self) {
        self.terminated.notified().await
    }
}

impl Connection for Client {
    fn id(&self) -> &str {
        &self.id
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn emit(&self, event: &str, payload: &Payload) -> Result<(), DeliveryError> {
        let frame = EventFrame::new(event, payload.clone());
        let text = serde_json::to_string(&frame)?;
        self.sender
            .send(WsMessage::text(text))
            .map_err(|_| DeliveryError::Closed(self.id.clone()))
    }

    fn terminate(&self) {
        let previous = {
            let mut state = self.state.lock();
            let previous = *state;
            *state = previous.terminate();
            previous
        };
        if previous.is_terminated() {
            return;
        }
        debug!("{} terminated from {:?}", self.id, previous);

        let close = WsMessage::Close(Some(CloseFrame {
            code: CloseCode::Policy,
            reason: Utf8Bytes::from_static("session no longer authenticated"),
        }));
        // the writer may already be gone
        let _ = self.sender.send(close);
        self.terminated.notify_one();
    }
}
