//! # Reconcilers
//!
//! One reconciler per watched kind. Each takes a `namespace/name` key,
//! re-reads the object, and drives it toward its desired state:
//!
//! - `ExportReconciler`: offers a Secret through the export registry
//! - `RequesterReconciler`: copies an offered Secret for SecretImport,
//!   SecretRequest and SecretExportApproval
//! - `PlaceholderReconciler`: aggregates offered docker configs into
//!   placeholder Secrets
//! - `TemplateReconciler`: renders SecretTemplates
//! - `PasswordReconciler`: generates Password Secrets
//!
//! Status is written through `controller::status::reconcile_with_status`,
//! except for placeholder Secrets which mirror it into an annotation.

mod export;
mod password;
mod placeholder;
mod requester;
mod template;
pub mod types;

pub use export::ExportReconciler;
pub use password::PasswordReconciler;
pub use placeholder::{PlaceholderReconciler, PlaceholderStatus};
pub use requester::{RequesterReconciler, SecretRequester};
pub use template::TemplateReconciler;
pub use types::{ReconcileError, ReconcileOutcome, EXPORT_NOT_OFFERED};

use crate::observability::metrics;
use crate::store::{ObjectStore, StoreError, StoredObject};
use async_trait::async_trait;
use kube::Resource;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, warn, Instrument};

/// A reconciler driven by `namespace/name` keys of one watched kind
#[async_trait]
pub trait KeyReconciler: Send + Sync + 'static {
    /// Primary kind the dispatcher watches
    type Kind: StoredObject;

    /// Metrics and log label
    const CONTROLLER: &'static str;

    /// Whether a cached object is handled at all
    fn accepts(&self, _obj: &Self::Kind) -> bool {
        true
    }

    async fn reconcile_key(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcileError>;
}

/// Run one reconcile inside a span, recording metrics
pub(crate) async fn instrumented<F>(
    controller: &'static str,
    namespace: &str,
    name: &str,
    reconcile: F,
) -> Result<ReconcileOutcome, ReconcileError>
where
    F: Future<Output = Result<ReconcileOutcome, ReconcileError>>,
{
    let span = tracing::span!(
        tracing::Level::INFO,
        "reconcile",
        controller,
        resource.namespace = namespace,
        resource.name = name
    );
    let start = Instant::now();
    metrics::increment_reconciliations(controller);

    let result = reconcile.instrument(span.clone()).await;

    metrics::observe_reconciliation_duration(controller, start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        metrics::increment_reconciliation_errors(controller, e.kind());
        span.in_scope(|| {
            if e.is_terminal() {
                debug!("Reconcile failed: {}", e);
            } else {
                warn!("Reconcile failed, will retry: {}", e);
            }
        });
    }
    result
}

/// The object, or `None` when it is gone or being deleted
pub(crate) async fn fetch_live<S, K>(
    store: &S,
    namespace: &str,
    name: &str,
) -> Result<Option<K>, StoreError>
where
    S: ObjectStore,
    K: StoredObject,
{
    match store.get::<K>(namespace, name).await {
        Ok(obj) if obj.meta().deletion_timestamp.is_some() => Ok(None),
        Ok(obj) => Ok(Some(obj)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
