//! # headcount-server
//!
//! Axum `WebSocket` relay that tracks live viewers per resource token.
//!
//! - `/client`: viewer connections, counted while alive
//! - `/server`: observer connections, pushed every count change for their token
//! - Per-connection session state machine: handshake deadline, heartbeat
//!   liveness, exactly-once teardown
//! - `/health` and `/metrics` endpoints
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use context::{SessionContext, SessionTiming};
pub use server::RelayServer;
