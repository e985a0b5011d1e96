//! # Export Reconciler
//!
//! Keeps the export registry in line with SecretExports and their Secrets.

use super::{fetch_live, instrumented, KeyReconciler, ReconcileError, ReconcileOutcome};
use async_trait::async_trait;
use crate::controller::exports::SecretExports;
use crate::controller::status::{reconcile_with_status, StatusTracker};
use crate::crd::SecretExport;
use crate::store::ObjectStore;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::info;

const CONTROLLER: &str = "secretexport";

#[derive(Debug)]
pub struct ExportReconciler<S> {
    store: Arc<S>,
    exports: Arc<SecretExports>,
}

impl<S: ObjectStore> ExportReconciler<S> {
    pub fn new(store: Arc<S>, exports: Arc<SecretExports>) -> Self {
        Self { store, exports }
    }

    /// # Errors
    ///
    /// Terminal when the Secret is missing or no namespace is listed.
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        instrumented(CONTROLLER, namespace, name, async {
            let Some(export) =
                fetch_live::<_, SecretExport>(self.store.as_ref(), namespace, name).await?
            else {
                info!("SecretExport gone, withdrawing offer");
                self.exports.unexport_by_name(namespace, name);
                return Ok(ReconcileOutcome::Done);
            };

            let tracker = StatusTracker::new(&export)?;
            reconcile_with_status(self.store.as_ref(), &tracker, self.offer(&export, &tracker))
                .await
        })
        .await
    }

    async fn offer(
        &self,
        export: &SecretExport,
        tracker: &StatusTracker<SecretExport>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if export.static_to_namespaces().is_empty() {
            self.exports.unexport(export);
            return Err(ReconcileError::invalid(
                "expected at least one non-empty target namespace",
            ));
        }

        let namespace = export.namespace().unwrap_or_default();
        let secret = match self.store.get::<Secret>(&namespace, &export.name_any()).await {
            Ok(secret) => secret,
            Err(e) if e.is_not_found() => {
                self.exports.unexport(export);
                tracker.update(|status| status.observed_secret_resource_version = None);
                return Err(ReconcileError::terminal("missing exported secret"));
            }
            Err(e) => return Err(e.into()),
        };

        self.exports.export(export, &secret);
        tracker.update(|status| {
            status
                .observed_secret_resource_version
                .clone_from(&secret.metadata.resource_version);
        });
        Ok(ReconcileOutcome::Done)
    }
}

#[async_trait]
impl<S: ObjectStore> KeyReconciler for ExportReconciler<S> {
    type Kind = SecretExport;
    const CONTROLLER: &'static str = CONTROLLER;

    async fn reconcile_key(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.reconcile(namespace, name).await
    }
}
