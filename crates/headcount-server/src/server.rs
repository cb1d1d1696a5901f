//! `RelayServer`: Axum HTTP and WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use headcount_auth::{CredentialVerifier, ResourceLookup};
use headcount_registry::Registry;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::context::{SessionContext, SessionTiming};
use crate::health::{self, HealthResponse};
use crate::metrics::REGISTRY_EVICTIONS_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry and collaborators handed to every session.
    pub ctx: Arc<SessionContext>,
    /// Cancelled on server shutdown.
    pub shutdown: CancellationToken,
    /// Currently open sockets.
    pub live_connections: Arc<AtomicUsize>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Max inbound message size in bytes.
    pub max_message_size: usize,
    /// Outbound queue depth per connection.
    pub outbound_buffer: usize,
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    ctx: Arc<SessionContext>,
    shutdown: Arc<ShutdownCoordinator>,
    live_connections: Arc<AtomicUsize>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl RelayServer {
    /// Create a new server around a shared registry and its collaborators.
    pub fn new(
        config: ServerConfig,
        registry: Arc<Registry>,
        verifier: Arc<dyn CredentialVerifier>,
        lookup: Arc<dyn ResourceLookup>,
    ) -> Self {
        let ctx = Arc::new(SessionContext {
            registry,
            verifier,
            lookup,
            timing: SessionTiming::from_config(&config),
        });
        Self {
            config,
            ctx,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            live_connections: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            ctx: self.ctx.clone(),
            shutdown: self.shutdown.token(),
            live_connections: self.live_connections.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            max_message_size: self.config.max_message_size,
            outbound_buffer: self.config.outbound_buffer,
        };

        Router::new()
            .route("/client", get(handler::viewer_ws))
            .route("/server", get(handler::observer_ws))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address and the task running the listener. The task
    /// ends once [`shutdown`](Self::shutdown) has been signalled and the
    /// listener has drained.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        if self.config.registry_eviction_secs == Some(0) {
            warn!("registry eviction period is zero, eviction disabled");
        }
        let sweeper = self.config.registry_eviction().map(|max_idle| {
            tokio::spawn(sweep_idle_tokens(
                self.ctx.registry.clone(),
                max_idle,
                token.clone(),
            ))
        });

        info!(%addr, "relay server listening");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
            if let Some(sweeper) = sweeper {
                if let Err(e) = sweeper.await {
                    error!(error = %e, "registry sweeper failed");
                }
            }
            info!("relay server stopped");
        });

        Ok((addr, handle))
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.ctx.registry
    }

    /// Currently open sockets.
    pub fn connection_count(&self) -> usize {
        self.live_connections.load(Ordering::Relaxed)
    }
}

/// Periodically drop idle zero-count tokens until `cancel` fires.
async fn sweep_idle_tokens(registry: Arc<Registry>, max_idle: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(max_idle);
    let _ = ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = registry.evict_idle(max_idle);
                if evicted > 0 {
                    metrics::counter!(REGISTRY_EVICTIONS_TOTAL)
                        .increment(u64::try_from(evicted).unwrap_or(u64::MAX));
                    debug!(evicted, "registry sweep");
                }
            }
            () = cancel.cancelled() => break,
        }
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.live_connections.load(Ordering::Relaxed);
    Json(health::health_check(
        state.start_time,
        connections,
        &state.ctx.registry,
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use headcount_auth::StaticDirectory;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn make_server() -> RelayServer {
        let dir = Arc::new(StaticDirectory::new().with_resource("abc", "u1"));
        RelayServer::new(
            ServerConfig::default(),
            Arc::new(Registry::new()),
            dir.clone(),
            dir,
        )
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let _ = server.registry().increment("abc");
        let (status, parsed) = get_json(server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert_eq!(parsed["tokens"], 1);
        assert_eq!(parsed["users"], 1);
    }

    #[tokio::test]
    async fn metrics_disabled_returns_404() {
        let server = make_server();
        let (status, _) = get_json(server.router(), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_enabled_returns_text() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let server = make_server().with_metrics(handle);
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ws_endpoints_require_upgrade() {
        for uri in ["/client", "/server"] {
            let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let resp = make_server().router().oneshot(req).await.unwrap();
            assert!(resp.status().is_client_error(), "{uri} answered {}", resp.status());
        }
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = make_server().router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let req = Request::builder()
            .uri("/health")
            .header("origin", "https://example.org")
            .body(Body::empty())
            .unwrap();
        let resp = make_server().router().oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn timing_follows_config() {
        let config = ServerConfig {
            handshake_timeout_ms: 500,
            ..ServerConfig::default()
        };
        let dir = Arc::new(StaticDirectory::new());
        let server = RelayServer::new(config, Arc::new(Registry::new()), dir.clone(), dir);
        assert_eq!(server.ctx.timing.handshake_timeout, Duration::from_millis(500));
        assert_eq!(server.config().port, 0);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port_and_stops_on_shutdown() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        server.shutdown().shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn zero_eviction_period_still_serves_and_stops() {
        let config = ServerConfig {
            registry_eviction_secs: Some(0),
            ..ServerConfig::default()
        };
        let dir = Arc::new(StaticDirectory::new());
        let server = RelayServer::new(config, Arc::new(Registry::new()), dir.clone(), dir);
        let _ = server.registry().decrement("idle");
        let (_addr, handle) = server.listen().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.registry().token_count(), 1);
        server.shutdown().shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn sweeper_evicts_idle_tokens() {
        let registry = Arc::new(Registry::new());
        let _ = registry.decrement("gone");
        let cancel = CancellationToken::new();
        let task = tokio::spawn(sweep_idle_tokens(
            registry.clone(),
            Duration::from_millis(20),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(registry.token_count(), 0);
        cancel.cancel();
        task.await.unwrap();
    }
}
