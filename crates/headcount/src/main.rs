//! # headcount
//!
//! Relay binary: loads settings, picks the identity/resource backend, and
//! serves `/client`, `/server`, `/health`, and `/metrics` until ctrl-c.

#![deny(unsafe_code)]

mod logging;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use headcount_auth::{CredentialVerifier, HttpAuthService, ResourceLookup, StaticDirectory};
use headcount_registry::Registry;
use headcount_server::{RelayServer, ServerConfig};
use headcount_settings::{AuthSettings, HeadcountSettings};
use tracing::{info, warn};

/// Live viewer count relay.
#[derive(Parser, Debug)]
#[command(name = "headcount", about = "Live viewer count relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings and `PORT`).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `HEADCOUNT_CONFIG`).
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn settings_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(headcount_settings::settings_path)
    }

    fn server_config(&self, settings: &HeadcountSettings) -> ServerConfig {
        let mut config = ServerConfig::from_settings(settings);
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config
    }
}

type AuthBackend = (Arc<dyn CredentialVerifier>, Arc<dyn ResourceLookup>);

/// HTTP service when a URL is configured, otherwise the static tables.
fn build_auth(settings: &AuthSettings) -> Result<AuthBackend> {
    if let Some(url) = &settings.base_url {
        let service = Arc::new(
            HttpAuthService::new(url.as_str(), Duration::from_millis(settings.timeout_ms))
                .context("Failed to build auth client")?,
        );
        info!(url = %service.base_url(), "using identity service");
        return Ok((service.clone(), service));
    }

    let directory = settings
        .static_resources
        .iter()
        .fold(StaticDirectory::new(), |dir, r| {
            dir.with_resource(r.token.as_str(), r.owner_uid.as_str())
        });
    let directory = settings
        .static_credentials
        .iter()
        .fold(directory, |dir, c| dir.with_credential(c.id_token.as_str(), c.uid.as_str()));
    if directory.resource_count() == 0 {
        warn!("no identity service or static resources configured, every INIT will be rejected");
    }
    let directory = Arc::new(directory);
    Ok((directory.clone(), directory))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args.settings_path();
    let settings = headcount_settings::load_settings(settings_path.as_deref())
        .context("Failed to load settings")?;
    logging::init_subscriber(&settings.logging);

    let (verifier, lookup) = build_auth(&settings.auth)?;
    let config = args.server_config(&settings);
    let mut server = RelayServer::new(config, Arc::new(Registry::new()), verifier, lookup);

    match headcount_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => warn!(error = %e, "metrics disabled"),
    }

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    info!("headcount listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("Shutting down...");
    server.shutdown().graceful_shutdown(vec![handle], None).await;
    info!("Shutdown complete");
    Ok(())
}
