//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file only needs the fields it changes.

mod auth;
mod logging;
mod server;

pub use auth::*;
pub use logging::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 8080 },
///   "auth": { "baseUrl": "https://auth.internal" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeadcountSettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Per-connection timing.
    pub session: SessionSettings,
    /// Identity and resource service.
    pub auth: AuthSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl HeadcountSettings {
    /// Reject combinations the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.session;
        if s.handshake_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "session.handshakeTimeoutMs must be positive".into(),
            ));
        }
        if s.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "session.heartbeatIntervalMs must be positive".into(),
            ));
        }
        if s.heartbeat_timeout_ms < s.heartbeat_interval_ms {
            return Err(SettingsError::InvalidValue(
                "session.heartbeatTimeoutMs must be at least heartbeatIntervalMs".into(),
            ));
        }
        if self.server.registry_eviction_secs == Some(0) {
            return Err(SettingsError::InvalidValue(
                "server.registryEvictionSecs must be positive when set".into(),
            ));
        }
        if self.server.outbound_buffer == 0 {
            return Err(SettingsError::InvalidValue(
                "server.outboundBuffer must be positive".into(),
            ));
        }
        Ok(())
    }
}
