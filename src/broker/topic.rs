//! Topic and connection identifiers
//!
//! Both are opaque strings. The helpers here own the persisted registry
//! schema: a topic's forward set lives under the topic key itself, and a
//! connection's reverse hash lives under `socket:<connection id>`.

pub type TopicKey = String;
pub type ConnectionId = String;

const SOCKET_KEY_PREFIX: &str = "socket:";

/// Key of the reverse-index hash for a connection.
pub fn socket_key(connection_id: &str) -> String {
    format!("{SOCKET_KEY_PREFIX}{connection_id}")
}

/// Collapse duplicate topics while keeping first-seen order.
pub fn distinct_topics<I, T>(topics: I) -> Vec<TopicKey>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    topics
        .into_iter()
        .map(|t| t.as_ref().to_string())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
