//! # Watch Loop
//!
//! Drives one kube-runtime `Controller` per watched kind. The controller
//! stream is restarted after a delay when it ends, until shutdown is
//! requested.

use super::error_policy::{handle_reconciliation_error, handle_watch_stream_error, KeyedBackoff};
use crate::config::ControllerConfig;
use crate::constants::{DEFAULT_WATCH_BACKOFF_MAX_MS, DEFAULT_WATCH_BACKOFF_START_MS};
use crate::controller::reconciler::{KeyReconciler, ReconcileError, ReconcileOutcome};
use crate::controller::server::ServerState;
use crate::observability::metrics;
use futures::StreamExt;
use kube::ResourceExt;
use kube_runtime::controller::{self, Action};
use kube_runtime::{watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Shared state handed to every reconcile of one controller
#[derive(Debug)]
pub struct ControllerContext<R> {
    pub reconciler: R,
    pub backoff: KeyedBackoff,
}

impl<R: KeyReconciler> ControllerContext<R> {
    #[must_use]
    pub fn new(reconciler: R, config: &ControllerConfig) -> Self {
        Self {
            reconciler,
            backoff: KeyedBackoff::new(config.backoff_min_secs, config.backoff_max_secs),
        }
    }
}

/// Dispatcher settings shared by all controllers
#[must_use]
pub fn dispatcher_config(config: &ControllerConfig) -> controller::Config {
    controller::Config::default().concurrency(config.max_concurrent_reconciliations)
}

/// Watch configuration for a primary kind
#[must_use]
pub fn primary_watch() -> watcher::Config {
    watcher::Config::default().any_semantic()
}

async fn reconcile<R: KeyReconciler>(
    obj: Arc<R::Kind>,
    ctx: Arc<ControllerContext<R>>,
) -> Result<Action, ReconcileError> {
    if !ctx.reconciler.accepts(&obj) {
        return Ok(Action::await_change());
    }

    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let outcome = ctx.reconciler.reconcile_key(&namespace, &name).await?;
    ctx.backoff.reset(&format!("{namespace}/{name}"));

    Ok(match outcome {
        ReconcileOutcome::Done => Action::await_change(),
        ReconcileOutcome::RequeueAfter(delay) => {
            metrics::increment_requeues(R::CONTROLLER, "resync");
            Action::requeue(delay)
        }
    })
}

/// Mark the server not ready on SIGINT/SIGTERM so loops stop restarting
pub fn spawn_shutdown_handler(server_state: Arc<ServerState>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal, waiting for in-flight reconciliations to complete...");
        server_state.is_ready.store(false, Ordering::Relaxed);
    });
}

/// Run the controller built by `build` until shutdown
///
/// `build` is called again for every restart since a `Controller` is consumed
/// by `run`.
pub async fn run_watch_loop<R, B>(
    build: B,
    ctx: Arc<ControllerContext<R>>,
    server_state: Arc<ServerState>,
    config: ControllerConfig,
) where
    R: KeyReconciler,
    B: Fn() -> Controller<R::Kind>,
{
    let backoff_ms = AtomicU64::new(DEFAULT_WATCH_BACKOFF_START_MS);
    let restart_delay = config.watch_restart_delay();

    loop {
        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!(controller = R::CONTROLLER, "Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            controller = R::CONTROLLER
        );
        let backoff_ms = &backoff_ms;
        let stream_ctx = Arc::clone(&ctx);

        async {
            info!("Starting controller");
            build()
                .shutdown_on_signal()
                .run(
                    reconcile::<R>,
                    handle_reconciliation_error::<R>,
                    Arc::clone(&ctx),
                )
                .for_each(move |result| {
                    let ctx = Arc::clone(&stream_ctx);
                    async move {
                        match result {
                            Ok(_) => {
                                backoff_ms.store(DEFAULT_WATCH_BACKOFF_START_MS, Ordering::Relaxed);
                            }
                            // Deleted objects leave the cache before they are
                            // dispatched; give them a last pass to release what
                            // they hold
                            Err(controller::Error::ObjectNotFound(obj_ref)) => {
                                let namespace = obj_ref.namespace.unwrap_or_default();
                                ctx.backoff.reset(&format!("{namespace}/{}", obj_ref.name));
                                if let Err(e) =
                                    ctx.reconciler.reconcile_key(&namespace, &obj_ref.name).await
                                {
                                    debug!("Reconcile of deleted object failed: {}", e);
                                }
                            }
                            // Already handled by the error policy
                            Err(controller::Error::ReconcilerFailed(_, _)) => {}
                            Err(e) => {
                                handle_watch_stream_error(
                                    R::CONTROLLER,
                                    &format!("{e:?}"),
                                    backoff_ms,
                                    DEFAULT_WATCH_BACKOFF_MAX_MS,
                                    restart_delay,
                                )
                                .await;
                            }
                        }
                    }
                })
                .await;
        }
        .instrument(watch_span)
        .await;

        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!(controller = R::CONTROLLER, "Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            controller = R::CONTROLLER,
            "Controller stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }

    info!(controller = R::CONTROLLER, "Controller stopped gracefully");
}
