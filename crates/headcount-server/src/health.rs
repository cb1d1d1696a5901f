//! `/health` endpoint.

use std::time::Instant;

use headcount_registry::Registry;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// Tokens tracked by the registry.
    pub tokens: usize,
    /// Sum of viewer counts across tokens.
    pub users: u64,
    /// Live observer subscriptions.
    pub observers: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, registry: &Registry) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        tokens: registry.token_count(),
        users: registry.total_users(),
        observers: registry.subscriber_count(),
    }
}
