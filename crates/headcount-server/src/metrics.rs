//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter, labels: role).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket connections closed total (counter, labels: role, reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge, labels: role).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Outbound frames dropped on a full or closed queue (counter, labels: role).
pub const WS_MESSAGES_DROPPED_TOTAL: &str = "ws_messages_dropped_total";
/// Sessions that completed INIT (counter, labels: role).
pub const SESSIONS_ACTIVATED_TOTAL: &str = "sessions_activated_total";
/// Sessions currently holding registry participation (gauge, labels: role).
pub const SESSIONS_ACTIVE: &str = "sessions_active";
/// Sessions ended (counter, labels: role, reason).
pub const SESSIONS_TERMINATED_TOTAL: &str = "sessions_terminated_total";
/// INIT resolution duration seconds (histogram, labels: role).
pub const SESSION_INIT_DURATION_SECONDS: &str = "session_init_duration_seconds";
/// Tokens removed by the idle sweeper (counter).
pub const REGISTRY_EVICTIONS_TOTAL: &str = "registry_evictions_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_MESSAGES_DROPPED_TOTAL,
            SESSIONS_ACTIVATED_TOTAL,
            SESSIONS_ACTIVE,
            SESSIONS_TERMINATED_TOTAL,
            SESSION_INIT_DURATION_SECONDS,
            REGISTRY_EVICTIONS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
