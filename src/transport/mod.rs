//! The `transport` module is responsible for handling network communication
//! with clients via WebSockets.
//!
//! It defines the JSON protocol clients speak, performs the cookie-based
//! session handshake, and turns socket traffic into broker events.

pub mod message;
pub mod websocket;

pub use message::ClientMessage;
pub use websocket::{ServerContext, serve, start_websocket_server};

#[cfg(test)]
mod tests;
