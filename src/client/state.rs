//! Connection lifecycle
//!
//! `Connecting -> Authorized -> Subscribed(n) -> Terminated`, where `n` is the
//! number of distinct topics the connection currently holds a positive count
//! for. `Subscribed(0)` is never produced; it collapses to `Authorized`.
//! `Terminated` absorbs every further event.

use crate::broker::registry::Unsubscribed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Authorized,
    Subscribed(usize),
    Terminated,
}

impl ConnectionState {
    /// Handshake succeeded and a session id was captured.
    pub fn authorize(self) -> Self {
        match self {
            ConnectionState::Connecting => ConnectionState::Authorized,
            other => other,
        }
    }

    /// A subscribe settled with `count` references on its topic.
    pub fn subscribed(self, count: i64) -> Self {
        let topics = match self {
            ConnectionState::Terminated | ConnectionState::Connecting => return self,
            ConnectionState::Authorized => 0,
            ConnectionState::Subscribed(n) => n,
        };
        if count == 1 {
            ConnectionState::Subscribed(topics + 1)
        } else {
            ConnectionState::Subscribed(topics.max(1))
        }
    }

    pub fn unsubscribed(self, outcome: Unsubscribed) -> Self {
        match (self, outcome) {
            (ConnectionState::Subscribed(n), Unsubscribed::Removed) if n > 1 => {
                ConnectionState::Subscribed(n - 1)
            }
            (ConnectionState::Subscribed(_), Unsubscribed::Removed) => ConnectionState::Authorized,
            (state, _) => state,
        }
    }

    pub fn terminate(self) -> Self {
        ConnectionState::Terminated
    }

    pub fn is_terminated(self) -> bool {
        self == ConnectionState::Terminated
    }

    /// Distinct topics held.
    pub fn topics(self) -> usize {
        match self {
            ConnectionState::Subscribed(n) => n,
            _ => 0,
        }
    }
}
