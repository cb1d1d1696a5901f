//! Server configuration.

use std::time::Duration;

use headcount_settings::HeadcountSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound queue depth per connection.
    pub outbound_buffer: usize,
    /// Deadline for a connection to complete INIT, in milliseconds.
    pub handshake_timeout_ms: u64,
    /// Liveness check period, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Max silence between pings, in milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Idle period after which zero-count tokens are evicted. Off when `None`.
    pub registry_eviction_secs: Option<u64>,
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &HeadcountSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_message_size: settings.server.max_message_size,
            outbound_buffer: settings.server.outbound_buffer,
            handshake_timeout_ms: settings.session.handshake_timeout_ms,
            heartbeat_interval_ms: settings.session.heartbeat_interval_ms,
            heartbeat_timeout_ms: settings.session.heartbeat_timeout_ms,
            registry_eviction_secs: settings.server.registry_eviction_secs,
        }
    }

    /// Handshake deadline.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Liveness check period.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Max silence between pings.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    /// Idle eviction period, if enabled. A zero period disables eviction.
    pub fn registry_eviction(&self) -> Option<Duration> {
        self.registry_eviction_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: 64 * 1024,
            outbound_buffer: 64,
            handshake_timeout_ms: 10_000,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 60_000,
            registry_eviction_secs: None,
        }
    }
}
