//! # sockmap
//!
//! `sockmap` pushes document updates to WebSocket clients that subscribed to
//! them, re-checking each client's session on every single delivery. A client
//! that subscribed while logged in stops receiving updates the moment its
//! session is revoked or expires, and is purged from every topic.
//!
//! ## Core Modules
//!
//! - `broker`: the subscription registry, the broadcast engine and the
//!   per-recipient delivery pipeline.
//! - `client`: connection handles, the live connection directory and the
//!   connection lifecycle.
//! - `config`: loading server configuration from files and environment.
//! - `persistence`: the shared registry store (in-memory or `sled`).
//! - `session`: session lookup and cookie parsing.
//! - `transport`: the WebSocket server.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod persistence;
pub mod session;
pub mod transport;
pub mod utils;
