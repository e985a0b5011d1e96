//! # Initialization
//!
//! Controller start-up: rustls provider, tracing, metrics, the HTTP server
//! and the Kubernetes client.

use crate::config::{ControllerConfig, ServerConfig};
use crate::controller::exports::{SecretExports, WarmedSecretExports};
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use crate::store::KubeStore;
use anyhow::{anyhow, Context, Result};
use kube::Client;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

/// Everything the controllers need once start-up succeeded
pub struct InitializationResult {
    pub client: Client,
    pub store: Arc<KubeStore>,
    /// Export registry shared by the export, requester and placeholder controllers
    pub warmed: Arc<WarmedSecretExports<KubeStore>>,
    pub server_state: Arc<ServerState>,
    pub controller_config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready.load(Ordering::Relaxed))
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Fails when metrics cannot be registered, the HTTP server does not come
/// up, or no Kubernetes configuration can be inferred.
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before any rustls client is built
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow!("Failed to install rustls crypto provider"));
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "secretgen_controller=info".into()),
        )
        .init();

    info!("Starting secretgen controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let controller_config = ControllerConfig::from_env();
    let server_config = ServerConfig::from_env();
    info!(
        namespace = %controller_config.controller_namespace,
        concurrency = controller_config.max_concurrent_reconciliations,
        "Loaded controller configuration"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let kube_config = kube::Config::infer()
        .await
        .context("Failed to infer Kubernetes configuration")?;
    let client =
        Client::try_from(kube_config.clone()).context("Failed to create Kubernetes client")?;
    let store = Arc::new(KubeStore::new(
        client.clone(),
        kube_config,
        controller_config.api_request_timeout(),
    ));
    let warmed = Arc::new(WarmedSecretExports::new(
        Arc::new(SecretExports::new()),
        Arc::clone(&store),
    ));

    info!("Controller initialized, starting controllers...");

    Ok(InitializationResult {
        client,
        store,
        warmed,
        server_state,
        controller_config,
    })
}

/// Wait for the HTTP server to bind
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = std::time::Duration::from_secs(server_config.startup_timeout_secs);
    let poll_interval = std::time::Duration::from_millis(server_config.poll_interval_ms);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}
