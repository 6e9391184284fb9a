//! The `client` module defines the representation of a connected client.
//!
//! It provides:
//! - the `Connection` and `ConnectionDirectory` traits the delivery pipeline
//!   talks to,
//! - `Client`, the WebSocket-backed connection handle,
//! - `ClientDirectory`, the live id-to-client table the transport maintains,
//! - `ConnectionState`, the per-connection lifecycle.

pub mod connection;
pub mod directory;
pub mod pubsub_client;
pub mod state;

pub use connection::{Connection, ConnectionDirectory};
pub use directory::ClientDirectory;
pub use pubsub_client::Client;
pub use state::ConnectionState;
