use std::sync::Arc;

use crate::broker::message::Payload;
use crate::utils::error::DeliveryError;

/// A live connection as seen by the delivery pipeline.
pub trait Connection: Send + Sync {
    fn id(&self) -> &str;

    /// Session id captured during the handshake.
    fn session_id(&self) -> &str;

    /// Emit an event named `event` carrying `payload`.
    fn emit(&self, event: &str, payload: &Payload) -> Result<(), DeliveryError>;

    /// Move the connection to its terminal state and close it once pending
    /// events are flushed.
    fn terminate(&self);
}

/// Lookup of live connections by id.
pub trait ConnectionDirectory: Send + Sync {
    /// `None` once the connection is gone.
    fn connection(&self, id: &str) -> Option<Arc<dyn Connection>>;
}
