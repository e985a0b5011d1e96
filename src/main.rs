//! # Secretgen Controller
//!
//! Runs every controller against the cluster the process is configured for
//! (in-cluster service account or kubeconfig).
//!
//! ## Endpoints
//!
//! - `/metrics` - Prometheus metrics
//! - `/healthz` - liveness
//! - `/readyz` - readiness, false once shutdown starts

use anyhow::Result;
use secretgen_controller::runtime::{initialize, run_controllers, spawn_shutdown_handler};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    spawn_shutdown_handler(Arc::clone(&init.server_state));

    run_controllers(init).await;

    info!("Controller stopped gracefully");
    Ok(())
}
