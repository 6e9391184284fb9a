//! The `session` module resolves the session id a connection presented at
//! connect time into its current authentication state.
//!
//! Sessions are owned by the surrounding application and may be revoked or
//! expire at any moment; the broker re-reads them on every delivery instead
//! of caching the answer it got during the handshake.

pub mod cookie;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::utils::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub authenticated: bool,
    /// Expiry as milliseconds since the UNIX epoch. `None` never expires.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl Session {
    pub fn authenticated() -> Self {
        Self {
            authenticated: true,
            expires_at: None,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            expires_at: None,
        }
    }

    /// Expire `ttl_secs` seconds from now.
    pub fn expiring_in(mut self, ttl_secs: u64) -> Self {
        let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        self.expires_at = Some(Utc::now().timestamp_millis().saturating_add(ttl_ms));
        self
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_ms)
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Resolve a session id. `Ok(None)` means revoked, expired or unknown.
    async fn load(&self, session_id: &str) -> Result<Option<Session>, SessionError>;
}

/// Process-local session store.
///
/// Expired sessions are dropped lazily the next time they are loaded.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-authenticate every id in `session_ids`, optionally with a TTL.
    pub fn seeded<I, S>(session_ids: I, ttl_secs: Option<u64>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for id in session_ids {
            let session = match ttl_secs {
                Some(ttl) => Session::authenticated().expiring_in(ttl),
                None => Session::authenticated(),
            };
            store.insert(id, session);
        }
        store
    }

    pub fn insert(&self, session_id: impl Into<String>, session: Session) {
        self.sessions.write().insert(session_id.into(), session);
    }

    /// Flip an existing session's flag. Returns `false` if it does not exist.
    pub fn set_authenticated(&self, session_id: &str, authenticated: bool) -> bool {
        match self.sessions.write().get_mut(session_id) {
            Some(session) => {
                session.authenticated = authenticated;
                true
            }
            None => false,
        }
    }

    /// Remove a session entirely, as a logout would.
    pub fn revoke(&self, session_id: &str) -> Option<Session> {
        self.sessions.write().remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        let now = Utc::now().timestamp_millis();
        let session = self.sessions.read().get(session_id).cloned();
        match session {
            Some(session) if session.is_expired(now) => {
                self.sessions.write().remove(session_id);
                Ok(None)
            }
            other => Ok(other),
        }
    }
}
