//! # Configuration
//!
//! Controller-level settings.
//!
//! - `controller`: reconcile concurrency, timeouts, requeue periods, backoff
//! - `ServerConfig`: HTTP server (metrics/probes) settings

mod controller;

pub use controller::ControllerConfig;

use crate::constants;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// How long to wait for the server to bind before giving up
    pub startup_timeout_secs: u64,
    /// Poll interval while waiting for the server to bind
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            metrics_port: constants::DEFAULT_METRICS_PORT,
            startup_timeout_secs: constants::DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            poll_interval_ms: constants::DEFAULT_SERVER_POLL_INTERVAL_MS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            metrics_port: controller::env_var_or_default(
                "METRICS_PORT",
                constants::DEFAULT_METRICS_PORT,
            ),
            startup_timeout_secs: controller::env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                constants::DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            poll_interval_ms: controller::env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                constants::DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
        }
    }
}
