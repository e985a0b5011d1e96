//! # Error Policy
//!
//! Requeue decisions for failed reconciles and classification of controller
//! stream errors.
//!
//! Terminal errors wait for the next watch event. Transient errors are retried
//! with a Fibonacci backoff tracked per reconcile key, so one failing object
//! never slows down retries of another.

use super::watch_loop::ControllerContext;
use crate::controller::backoff::BackoffState;
use crate::controller::reconciler::{KeyReconciler, ReconcileError};
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Per-key Fibonacci backoff for transient reconcile failures
#[derive(Debug)]
pub struct KeyedBackoff {
    states: Mutex<HashMap<String, BackoffState>>,
    min_secs: u64,
    max_secs: u64,
}

impl KeyedBackoff {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            min_secs,
            max_secs,
        }
    }

    /// Advance the key's sequence, returning the delay and the error count so far
    pub fn next(&self, key: &str) -> (Duration, u32) {
        match self.states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(key.to_string())
                    .or_insert_with(|| BackoffState::new(self.min_secs, self.max_secs));
                state.increment_error();
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff states: {}, using maximum backoff", e);
                (Duration::from_secs(self.max_secs), 0)
            }
        }
    }

    /// Forget the key once it stops retrying: success, terminal error or deletion
    pub fn reset(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }

    #[cfg(test)]
    fn is_tracked(&self, key: &str) -> bool {
        self.states
            .lock()
            .is_ok_and(|states| states.contains_key(key))
    }
}

/// Decide when a failed reconcile runs again
pub fn handle_reconciliation_error<R: KeyReconciler>(
    obj: Arc<R::Kind>,
    error: &ReconcileError,
    ctx: Arc<ControllerContext<R>>,
) -> Action {
    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        controller = R::CONTROLLER,
        resource.namespace = %namespace,
        resource.name = %name,
        error = %error
    );
    let _error_guard = error_span.enter();

    let key = format!("{namespace}/{name}");
    if error.is_terminal() {
        debug!("terminal error, waiting for the next change");
        ctx.backoff.reset(&key);
        return Action::await_change();
    }

    let (delay, error_count) = ctx.backoff.next(&key);
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {})",
        delay.as_secs(),
        error_count
    );
    debug!("Next retry scheduled: {}", next_trigger_time.to_rfc3339());

    metrics::increment_requeues(R::CONTROLLER, "error-backoff");
    Action::requeue(delay)
}

/// Coarse class of an error surfaced by a controller stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    /// 401: credentials revoked or expired
    Unauthorized,
    /// 410: resource version too old, the watcher relists
    Expired,
    /// 429: API server storage reinitializing
    TooManyRequests,
    /// 404: usually a CRD that is not installed yet
    NotFound,
    Other,
}

#[must_use]
pub fn classify_watch_error(error: &str) -> WatchErrorClass {
    // 404 first: a plain-text 404 body surfaces as a WatchFailed serde error
    let is_not_found =
        error.contains("ObjectNotFound") || error.contains("404") || error.contains("not found");
    if (error.contains("401") || error.contains("Unauthorized")) && !is_not_found {
        WatchErrorClass::Unauthorized
    } else if error.contains("410")
        || error.contains("too old resource version")
        || error.contains("Expired")
        || error.contains("Gone")
    {
        WatchErrorClass::Expired
    } else if error.contains("429")
        || error.contains("storage is (re)initializing")
        || error.contains("TooManyRequests")
    {
        WatchErrorClass::TooManyRequests
    } else if is_not_found {
        WatchErrorClass::NotFound
    } else {
        WatchErrorClass::Other
    }
}

/// Log a controller stream error and pause as its class requires
///
/// `backoff_ms` doubles on every 429 up to `max_backoff_ms`; the caller resets
/// it after a successful event.
pub async fn handle_watch_stream_error(
    controller: &'static str,
    error: &str,
    backoff_ms: &AtomicU64,
    max_backoff_ms: u64,
    restart_delay: Duration,
) {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        controller,
        error = %error
    );
    let class = classify_watch_error(error);

    match class {
        WatchErrorClass::Unauthorized => {
            error_span.in_scope(|| {
                error!(
                    "Watch authentication failed (401 Unauthorized), \
                     RBAC may have been revoked or the token expired"
                );
                error!("Verify the ClusterRoleBinding still binds the controller ServiceAccount");
                warn!("Waiting {}s before continuing", restart_delay.as_secs());
            });
            tokio::time::sleep(restart_delay).await;
        }
        WatchErrorClass::Expired => {
            error_span.in_scope(|| {
                warn!(error_type = "410", "Watch resource version expired, relisting");
            });
        }
        WatchErrorClass::TooManyRequests => {
            let current = backoff_ms.load(Ordering::Relaxed);
            error_span.in_scope(|| {
                warn!(
                    "API server storage reinitializing (429), backing off for {}ms",
                    current
                );
            });
            tokio::time::sleep(Duration::from_millis(current)).await;
            backoff_ms.store(
                current.saturating_mul(2).min(max_backoff_ms),
                Ordering::Relaxed,
            );
        }
        WatchErrorClass::NotFound => {
            error_span.in_scope(|| {
                warn!(
                    "Resource not found (404), the CRD may not be installed: {}",
                    error
                );
            });
        }
        WatchErrorClass::Other => {
            error_span.in_scope(|| error!("Controller stream error: {}", error));
            tokio::time::sleep(restart_delay).await;
        }
    }
}
