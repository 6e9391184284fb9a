//! The `error` module defines the error types used within `sockmap`.
//!
//! Each layer gets its own enum so callers can tell a registry outage from a
//! session outage or a closed socket. None of these are fatal to a publish:
//! the broker logs them and keeps fanning out.

use sled::transaction::TransactionError;
use thiserror::Error;

use crate::broker::topic::ConnectionId;

/// Failures of the shared registry store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<TransactionError<StoreError>> for StoreError {
    fn from(err: TransactionError<StoreError>) -> Self {
        match err {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(e) => StoreError::Sled(e),
        }
    }
}

/// Failures of the session store.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Failures while emitting an event on a connection.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures that stop the server binary.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("registry store error: {0}")]
    Store(#[from] StoreError),
}
