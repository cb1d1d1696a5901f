//! WebSocket endpoints, connection state, protocol, and the session state machine.

pub mod connection;
pub mod handler;
pub mod protocol;
pub mod session;
pub mod termination;
pub mod timers;
