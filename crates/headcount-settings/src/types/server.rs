//! Listener and session timing settings.

use serde::{Deserialize, Serialize};

/// Network listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Queued outbound messages per connection before sends are dropped.
    pub outbound_buffer: usize,
    /// Evict zero-count tokens idle for this many seconds. Off when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_eviction_secs: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4200,
            max_message_size: 64 * 1024,
            outbound_buffer: 64,
            registry_eviction_secs: None,
        }
    }
}

/// Connection lifecycle timing.
///
/// The notices sent on expiry always read "Not initialized within 10
/// seconds" and "Ping not received in 1 minute", whatever these values are.
/// Existing clients match on that text.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// How long a connection may stay uninitialized.
    pub handshake_timeout_ms: u64,
    /// How often liveness is checked.
    pub heartbeat_interval_ms: u64,
    /// Max silence between pings before an active connection is dropped.
    pub heartbeat_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 10_000,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 60_000,
        }
    }
}
