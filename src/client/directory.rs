//! Live connection table
//!
//! The transport registers a `Client` once its handshake succeeds and removes
//! it on disconnect. The delivery pipeline only ever reads it through
//! [`ConnectionDirectory`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::connection::{Connection, ConnectionDirectory};
use super::pubsub_client::Client;
use crate::broker::topic::ConnectionId;

#[derive(Debug, Default)]
pub struct ClientDirectory {
    clients: RwLock<HashMap<ConnectionId, Arc<Client>>>,
}

impl ClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, client: Arc<Client>) {
        self.clients.write().insert(client.id.clone(), client);
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Client>> {
        self.clients.write().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Client>> {
        self.clients.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

impl ConnectionDirectory for ClientDirectory {
    fn connection(&self, id: &str) -> Option<Arc<dyn Connection>> {
        self.get(id).map(|client| client as Arc<dyn Connection>)
    }
}
