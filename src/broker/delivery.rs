//! Delivery pipeline
//!
//! Runs once per (topic, subscriber) on every publish:
//! 1. resolve the live connection; a missing one is stale and gets purged
//! 2. load the session captured at connect time
//! 3. on a failed load, a missing session or an unauthenticated one, emit a
//!    failure payload, purge the connection from every topic and terminate it
//! 4. otherwise emit the update
//!
//! Sessions are re-read on every delivery, never cached, so a logout or an
//! expiry takes effect on the next publish without any revocation channel.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::broker::message::{NOT_AUTHENTICATED, Payload};
use crate::broker::registry::SubscriptionRegistry;
use crate::client::ConnectionDirectory;
use crate::session::SessionStore;

/// What happened to one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The update was handed to the connection.
    Delivered,
    /// The session failed its check and the connection was purged.
    /// `notified` is whether the failure payload reached its channel.
    Rejected { notified: bool },
    /// The connection was gone; it was purged and nothing was sent.
    Stale,
}

#[derive(Clone)]
pub struct DeliveryPipeline {
    registry: Arc<SubscriptionRegistry>,
    directory: Arc<dyn ConnectionDirectory>,
    sessions: Arc<dyn SessionStore>,
}

impl DeliveryPipeline {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        directory: Arc<dyn ConnectionDirectory>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            registry,
            directory,
            sessions,
        }
    }

    pub async fn deliver(&self, topic: &str, connection_id: &str, document: &Value) -> Delivery {
        let Some(connection) = self.directory.connection(connection_id) else {
            debug!("{connection_id} no longer connected; purging");
            self.purge(connection_id).await;
            return Delivery::Stale;
        };

        if let Err(reason) = self.authorize(connection.session_id()).await {
            warn!("rejecting delivery of {topic} to {connection_id}: {reason}");
            let notified = match connection.emit(topic, &Payload::failure(reason)) {
                Ok(()) => true,
                Err(e) => {
                    debug!("failure payload for {connection_id} not sent: {e}");
                    false
                }
            };
            self.purge(connection_id).await;
            connection.terminate();
            return Delivery::Rejected { notified };
        }

        match connection.emit(topic, &Payload::update(document)) {
            Ok(()) => Delivery::Delivered,
            Err(e) => {
                debug!("delivery of {topic} to {connection_id} failed: {e}; purging");
                self.purge(connection_id).await;
                Delivery::Stale
            }
        }
    }

    /// `Err` carries the reason reported to the client.
    async fn authorize(&self, session_id: &str) -> Result<(), String> {
        match self.sessions.load(session_id).await {
            Ok(Some(session)) if session.authenticated => Ok(()),
            Ok(_) => Err(NOT_AUTHENTICATED.to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn purge(&self, connection_id: &str) {
        if let Err(e) = self.registry.purge(connection_id).await {
            error!("failed to purge {connection_id}: {e}");
        }
    }
}
