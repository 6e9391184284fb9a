//! Broker engine
//!
//! The `Broker` ties the subscription registry to the delivery pipeline:
//! - inbound connection events (subscribe, unsubscribe, disconnect) are
//!   applied to the registry through [`Broker::handle_event`]
//! - application publishes fan out through [`Broker::publish`]
//!
//! Concurrency and usage notes:
//! - The broker holds no lock of its own. It is shared as `Arc<Broker>` and
//!   every method takes `&self`; atomicity lives in the registry store.
//! - A publish never fails. Lookup failures and per-subscriber problems are
//!   logged and counted in the returned [`PublishReport`], and one bad topic
//!   or subscriber never stops delivery to the others.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error};

use crate::broker::delivery::{Delivery, DeliveryPipeline};
use crate::broker::registry::{SubscriptionRegistry, Unsubscribed};
use crate::broker::topic::{TopicKey, distinct_topics};
use crate::client::ConnectionDirectory;
use crate::persistence::RegistryStore;
use crate::session::SessionStore;
use crate::utils::error::StoreError;

/// Inbound events a connection produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Subscribe(TopicKey),
    Unsubscribe(TopicKey),
    Disconnect,
}

/// Registry effect of a [`ConnectionEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Subscribed(i64),
    Unsubscribed(Unsubscribed),
    Purged(Vec<TopicKey>),
}

/// Tally of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub rejected: usize,
    pub stale: usize,
    /// Rejections whose failure payload was actually handed to the client.
    pub failures_sent: usize,
    /// Topics whose subscriber lookup failed.
    pub failed_topics: usize,
}

impl PublishReport {
    fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Delivered => self.delivered += 1,
            Delivery::Rejected { notified } => {
                self.rejected += 1;
                if notified {
                    self.failures_sent += 1;
                }
            }
            Delivery::Stale => self.stale += 1,
        }
    }

    fn merge(mut self, other: PublishReport) -> Self {
        self.delivered += other.delivered;
        self.rejected += other.rejected;
        self.stale += other.stale;
        self.failures_sent += other.failures_sent;
        self.failed_topics += other.failed_topics;
        self
    }

    /// Outbound events emitted: updates plus failure payloads that were sent.
    pub fn emitted(&self) -> usize {
        self.delivered + self.failures_sent
    }
}

#[derive(Clone)]
pub struct Broker {
    registry: Arc<SubscriptionRegistry>,
    pipeline: DeliveryPipeline,
}

impl Broker {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        directory: Arc<dyn ConnectionDirectory>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new(store));
        let pipeline = DeliveryPipeline::new(registry.clone(), directory, sessions);
        Self { registry, pipeline }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Apply one inbound connection event to the registry.
    pub async fn handle_event(
        &self,
        connection_id: &str,
        event: ConnectionEvent,
    ) -> Result<EventOutcome, StoreError> {
        match event {
            ConnectionEvent::Subscribe(topic) => self
                .registry
                .subscribe(&topic, connection_id)
                .await
                .map(EventOutcome::Subscribed),
            ConnectionEvent::Unsubscribe(topic) => self
                .registry
                .unsubscribe(&topic, connection_id)
                .await
                .map(EventOutcome::Unsubscribed),
            ConnectionEvent::Disconnect => self
                .registry
                .purge(connection_id)
                .await
                .map(EventOutcome::Purged),
        }
    }

    /// Push `document` to every current subscriber of each topic.
    ///
    /// Duplicate topics are delivered once. Topics and their subscribers are
    /// processed concurrently.
    pub async fn publish<I, T>(&self, topics: I, document: &Value) -> PublishReport
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let topics = distinct_topics(topics);
        let reports = join_all(
            topics
                .iter()
                .map(|topic| self.publish_topic(topic, document)),
        )
        .await;

        let report = reports
            .into_iter()
            .fold(PublishReport::default(), PublishReport::merge);
        debug!("published to {} topic(s): {report:?}", topics.len());
        report
    }

    /// Single-topic form of [`Broker::publish`].
    pub async fn publish_one(&self, topic: &str, document: &Value) -> PublishReport {
        self.publish([topic], document).await
    }

    async fn publish_topic(&self, topic: &str, document: &Value) -> PublishReport {
        let mut report = PublishReport::default();

        let subscribers = match self.registry.subscribers(topic).await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                error!("failed to read subscribers of {topic}: {e}");
                report.failed_topics += 1;
                return report;
            }
        };

        if subscribers.is_empty() {
            debug!("no subscribers for {topic}");
            return report;
        }

        let deliveries = join_all(
            subscribers
                .iter()
                .map(|connection_id| self.pipeline.deliver(topic, connection_id, document)),
        )
        .await;

        for delivery in deliveries {
            report.record(delivery);
        }
        report
    }
}
