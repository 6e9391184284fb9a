//! Subscription registry
//!
//! Owns the two subscription indices kept in the shared registry store:
//! - forward: `<topic>` -> set of connection ids
//! - reverse: `socket:<connection id>` -> topic -> reference count
//!
//! A connection id is in a topic's set exactly when its count for that topic
//! is positive. Every write goes through one atomic store operation, so an
//! unsubscribe can never remove a member that a concurrent subscribe has
//! just re-counted.
//!
//! The registry is the only writer of either index.

use std::sync::Arc;

use tracing::debug;

use crate::broker::topic::{ConnectionId, TopicKey, socket_key};
use crate::persistence::RegistryStore;
use crate::utils::error::StoreError;

/// What an unsubscribe did to the (topic, connection) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsubscribed {
    /// Still referenced this many times; membership kept.
    Remaining(i64),
    /// Count reached zero; removed from the topic's subscribers.
    Removed,
    /// There was nothing to release.
    NotSubscribed,
}

#[derive(Debug, Clone)]
pub struct SubscriptionRegistry {
    store: Arc<dyn RegistryStore>,
}

impl SubscriptionRegistry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    /// Reference `topic` once more for `connection_id`. Returns the new count.
    pub async fn subscribe(&self, topic: &str, connection_id: &str) -> Result<i64, StoreError> {
        let count = self
            .store
            .retain(topic, &socket_key(connection_id), connection_id)
            .await?;
        debug!("{connection_id} subscribed to {topic} (count {count})");
        Ok(count)
    }

    /// Drop one reference, leaving the topic when none remain.
    pub async fn unsubscribe(
        &self,
        topic: &str,
        connection_id: &str,
    ) -> Result<Unsubscribed, StoreError> {
        let count = self
            .store
            .release(topic, &socket_key(connection_id), connection_id)
            .await?;
        let outcome = match count {
            n if n > 0 => Unsubscribed::Remaining(n),
            0 => Unsubscribed::Removed,
            _ => Unsubscribed::NotSubscribed,
        };
        debug!("{connection_id} unsubscribed from {topic}: {outcome:?}");
        Ok(outcome)
    }

    /// Remove `connection_id` from every topic regardless of counts and
    /// delete its reverse hash. Safe to repeat. Returns the purged topics.
    pub async fn purge(&self, connection_id: &str) -> Result<Vec<TopicKey>, StoreError> {
        let topics = self
            .store
            .evict(&socket_key(connection_id), connection_id)
            .await?;
        debug!("purged {connection_id} from {} topic(s)", topics.len());
        Ok(topics)
    }

    /// Current subscribers of `topic`.
    pub async fn subscribers(&self, topic: &str) -> Result<Vec<ConnectionId>, StoreError> {
        self.store.set_members(topic).await
    }

    /// Topics `connection_id` holds a reference count for.
    pub async fn topics(&self, connection_id: &str) -> Result<Vec<TopicKey>, StoreError> {
        self.store.hash_keys(&socket_key(connection_id)).await
    }

    /// Reference count of the pair, zero when absent.
    pub async fn count(&self, topic: &str, connection_id: &str) -> Result<i64, StoreError> {
        Ok(self
            .store
            .hash_get(&socket_key(connection_id), topic)
            .await?
            .unwrap_or(0))
    }
}
