//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Annotation keys, API groups and Secret payload key names are part of the
//! controller's public contract and must stay bit-exact. Numeric values are
//! defaults that can be overridden via environment variables (see `config`).

/// API group for the export/import/template resources
pub const CARVEL_GROUP: &str = "secretgen.carvel.dev";

/// API group for the legacy request and generator resources
pub const K14S_GROUP: &str = "secretgen.k14s.io";

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "secretgen-controller";

/// Fingerprint of the inputs a generated Secret was produced from
pub const GENERATE_INPUTS_ANNOTATION: &str = "secretgen.k14s.io/generate-inputs";

/// Opts a hand-authored Secret into image pull secret aggregation
pub const PLACEHOLDER_SECRET_ANNOTATION: &str = "secretgen.carvel.dev/image-pull-secret";

/// Namespace annotation that opts the namespace out of wildcard exports
pub const EXCLUDED_FROM_WILDCARD_ANNOTATION: &str =
    "secretgen.carvel.dev/excluded-from-wildcard-matching";

/// Status mirror for resources without a status subresource (placeholder Secrets)
pub const STATUS_ANNOTATION: &str = "secretgen.carvel.dev/status";

/// Annotation written by `kubectl apply`; never propagated onto derived Secrets
pub const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// Wildcard entry in `toNamespaces`
pub const WILDCARD_NAMESPACE: &str = "*";

/// Secret type aggregated into placeholder Secrets
pub const DOCKER_CONFIG_JSON_TYPE: &str = "kubernetes.io/dockerconfigjson";

/// Payload key of `kubernetes.io/dockerconfigjson` Secrets
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

/// Secret type of generated passwords
pub const PASSWORD_SECRET_TYPE: &str = "secretgen.k14s.io/password";

/// Payload key holding a generated password
pub const PASSWORD_SECRET_KEY: &str = "password";

/// Payload keys of generated certificates
pub const CERTIFICATE_SECRET_KEY: &str = "crt.pem";
pub const CERTIFICATE_PRIVATE_KEY_SECRET_KEY: &str = "key.pem";

/// Payload keys of generated RSA keys
pub const RSA_PUBLIC_KEY_SECRET_KEY: &str = "pub.pem";
pub const RSA_PRIVATE_KEY_SECRET_KEY: &str = "key.pem";

/// Payload keys of generated SSH keys
pub const SSH_PRIVATE_KEY_SECRET_KEY: &str = "ssh-privatekey";
pub const SSH_AUTHORIZED_KEY_SECRET_KEY: &str = "ssh-authorizedkey";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default number of reconciles each controller may run at once
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default timeout for a single Kubernetes API operation (seconds)
pub const DEFAULT_API_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default fallback poll for SecretTemplate inputs, which have no direct watch (seconds)
pub const DEFAULT_TEMPLATE_RESYNC_SECS: u64 = 30;

/// Default fallback poll for placeholder Secrets (seconds)
pub const DEFAULT_PLACEHOLDER_RESYNC_SECS: u64 = 30;

/// Default Fibonacci backoff floor for transient errors (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 1;

/// Default Fibonacci backoff ceiling for transient errors (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting a controller stream that ended (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default password length when the Password spec leaves it unset
pub const DEFAULT_PASSWORD_LENGTH: usize = 40;

/// Initial pause after a 429 from a controller stream (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_START_MS: u64 = 1_000;

/// Longest pause after repeated 429s from a controller stream (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_MAX_MS: u64 = 30_000;
