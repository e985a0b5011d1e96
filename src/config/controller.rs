//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Maximum concurrent reconciliations per controller
    /// Different keys reconcile concurrently, a single key never does
    pub max_concurrent_reconciliations: u16,
    /// Timeout applied to every Kubernetes API operation (seconds)
    pub api_request_timeout_secs: u64,
    /// Fallback poll interval for SecretTemplates (seconds)
    /// Template inputs are arbitrary resources without a direct watch
    pub template_resync_secs: u64,
    /// Fallback poll interval for placeholder Secrets (seconds)
    pub placeholder_resync_secs: u64,
    /// Fibonacci backoff floor for transient errors (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff ceiling for transient errors (seconds)
    pub backoff_max_secs: u64,
    /// Delay before restarting a controller stream that ended (seconds)
    pub watch_restart_delay_secs: u64,
    /// Controller namespace
    pub controller_namespace: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            api_request_timeout_secs: DEFAULT_API_REQUEST_TIMEOUT_SECS,
            template_resync_secs: DEFAULT_TEMPLATE_RESYNC_SECS,
            placeholder_resync_secs: DEFAULT_PLACEHOLDER_RESYNC_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            controller_namespace: "secretgen-controller".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            api_request_timeout_secs: env_var_or_default(
                "API_REQUEST_TIMEOUT_SECS",
                DEFAULT_API_REQUEST_TIMEOUT_SECS,
            ),
            template_resync_secs: env_var_or_default(
                "TEMPLATE_RESYNC_SECS",
                DEFAULT_TEMPLATE_RESYNC_SECS,
            ),
            placeholder_resync_secs: env_var_or_default(
                "PLACEHOLDER_RESYNC_SECS",
                DEFAULT_PLACEHOLDER_RESYNC_SECS,
            ),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            controller_namespace: env_var_or_default_str("POD_NAMESPACE", "secretgen-controller"),
        }
    }

    /// Get API request timeout duration
    #[must_use]
    pub fn api_request_timeout(&self) -> Duration {
        Duration::from_secs(self.api_request_timeout_secs)
    }

    /// Get SecretTemplate resync duration
    #[must_use]
    pub fn template_resync(&self) -> Duration {
        Duration::from_secs(self.template_resync_secs)
    }

    /// Get placeholder Secret resync duration
    #[must_use]
    pub fn placeholder_resync(&self) -> Duration {
        Duration::from_secs(self.placeholder_resync_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
