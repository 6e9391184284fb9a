//! The `broker` module is the core of `sockmap`: the reference-counted
//! subscription registry, the broadcast engine and the per-recipient
//! delivery pipeline that re-checks authorization on every send.

pub mod delivery;
pub mod engine;
pub mod message;
pub mod registry;
pub mod topic;

pub use engine::{Broker, ConnectionEvent, EventOutcome, PublishReport};
pub use registry::{SubscriptionRegistry, Unsubscribed};
