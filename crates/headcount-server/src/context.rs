//! Shared dependencies handed to every session.

use std::sync::Arc;
use std::time::Duration;

use headcount_auth::{CredentialVerifier, ResourceLookup};
use headcount_registry::Registry;

use crate::config::ServerConfig;

/// Lifecycle deadlines for one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionTiming {
    /// Time allowed between connect and a successful INIT.
    pub handshake_timeout: Duration,
    /// Period of the liveness check.
    pub heartbeat_interval: Duration,
    /// Max time since the last ping before an active session is dropped.
    pub heartbeat_timeout: Duration,
}

impl SessionTiming {
    /// Timing from server configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            handshake_timeout: config.handshake_timeout(),
            heartbeat_interval: config.heartbeat_interval(),
            heartbeat_timeout: config.heartbeat_timeout(),
        }
    }
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

/// Registry plus external collaborators, shared by all sessions.
pub struct SessionContext {
    /// Token count store.
    pub registry: Arc<Registry>,
    /// Observer credential check.
    pub verifier: Arc<dyn CredentialVerifier>,
    /// Resource token lookup.
    pub lookup: Arc<dyn ResourceLookup>,
    /// Session deadlines.
    pub timing: SessionTiming,
}
