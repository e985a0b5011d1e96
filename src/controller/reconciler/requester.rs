//! # Requester Reconciler
//!
//! SecretImport, SecretRequest and SecretExportApproval all ask for a copy of
//! the Secret exported under their own name from `spec.fromNamespace`. One
//! generic reconciler serves all three.
//!
//! - no matching export: the copy is deleted and the request fails with
//!   "export was not offered/allowed"
//! - one match: the copy is created or brought up to date, unless the
//!   SecretExport is already gone from the API while still registered
//! - more than one match: impossible for a single namespace/name, so it panics

use super::{
    fetch_live, instrumented, KeyReconciler, ReconcileError, ReconcileOutcome, EXPORT_NOT_OFFERED,
};
use async_trait::async_trait;
use crate::constants::WILDCARD_NAMESPACE;
use crate::controller::exports::{SecretMatcher, StoreNamespaceOracle, WarmedSecretExports};
use crate::controller::secret::{create_or_update, delete_secret, DerivedSecret, SecretValues};
use crate::controller::status::{reconcile_with_status, StatusResource, StatusTracker};
use crate::crd::{
    GenericStatus, SecretExport, SecretExportApproval, SecretImport, SecretRequest,
};
use crate::store::{ObjectStore, StoreError};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info};

/// A resource asking for an exported Secret
pub trait SecretRequester: StatusResource<Status = GenericStatus> {
    /// Metrics and log label
    const CONTROLLER: &'static str;

    fn from_namespace(&self) -> &str;
}

impl SecretRequester for SecretImport {
    const CONTROLLER: &'static str = "secretimport";

    fn from_namespace(&self) -> &str {
        &self.spec.from_namespace
    }
}

impl SecretRequester for SecretRequest {
    const CONTROLLER: &'static str = "secretrequest";

    fn from_namespace(&self) -> &str {
        &self.spec.from_namespace
    }
}

impl SecretRequester for SecretExportApproval {
    const CONTROLLER: &'static str = "secretexportapproval";

    fn from_namespace(&self) -> &str {
        &self.spec.from_namespace
    }
}

pub struct RequesterReconciler<S, K> {
    store: Arc<S>,
    exports: Arc<WarmedSecretExports<S>>,
    _kind: PhantomData<fn() -> K>,
}

impl<S, K> std::fmt::Debug for RequesterReconciler<S, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequesterReconciler").finish_non_exhaustive()
    }
}

impl<S: ObjectStore, K: SecretRequester> RequesterReconciler<S, K> {
    pub fn new(store: Arc<S>, exports: Arc<WarmedSecretExports<S>>) -> Self {
        Self {
            store,
            exports,
            _kind: PhantomData,
        }
    }

    /// # Errors
    ///
    /// Terminal when nothing is offered or `fromNamespace` is empty.
    ///
    /// # Panics
    ///
    /// When more than one exported Secret matches.
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        instrumented(K::CONTROLLER, namespace, name, async {
            // The copy is owned by the requester and goes away with it
            let Some(requester) = fetch_live::<_, K>(self.store.as_ref(), namespace, name).await?
            else {
                debug!("requester gone, nothing to do");
                return Ok(ReconcileOutcome::Done);
            };

            let tracker = StatusTracker::new(&requester)?;
            reconcile_with_status(self.store.as_ref(), &tracker, self.copy_secret(&requester))
                .await
        })
        .await
    }

    async fn copy_secret(&self, requester: &K) -> Result<ReconcileOutcome, ReconcileError> {
        let from_namespace = requester.from_namespace();
        if from_namespace.is_empty() {
            return Err(ReconcileError::invalid("expected non-empty spec.fromNamespace"));
        }

        let namespace = requester.namespace().unwrap_or_default();
        let name = requester.name_any();
        let matcher = SecretMatcher::for_requester(from_namespace, &name, &namespace);
        let oracle = StoreNamespaceOracle::new(self.store.as_ref());
        let matched = self
            .exports
            .matched_secrets_for_import(&matcher, &oracle)
            .await?;

        match matched.as_slice() {
            [] => self.withdraw(requester, &namespace, &name).await,
            [source] => {
                // The registry trails export changes by one export reconcile
                let source_namespace = source.namespace().unwrap_or_default();
                let source_name = source.name_any();
                let live = fetch_live::<_, SecretExport>(
                    self.store.as_ref(),
                    &source_namespace,
                    &source_name,
                )
                .await?;
                match live {
                    None => {
                        debug!("SecretExport deleted ahead of its unexport");
                        self.exports
                            .exports()
                            .unexport_by_name(&source_namespace, &source_name);
                        return self.withdraw(requester, &namespace, &name).await;
                    }
                    Some(export) if !targets(&export, &namespace) => {
                        debug!("SecretExport no longer targets this namespace");
                        return self.withdraw(requester, &namespace, &name).await;
                    }
                    Some(_) => {}
                }

                let mut derived = DerivedSecret::new(requester, SecretValues::new());
                derived.apply_secret(source);
                create_or_update(self.store.as_ref(), derived.as_secret()).await?;
                Ok(ReconcileOutcome::Done)
            }
            many => panic!(
                "Internal inconsistency: {} exported secrets matched {}/{}",
                many.len(),
                namespace,
                name
            ),
        }
    }

    async fn withdraw(
        &self,
        requester: &K,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.delete_copy(requester, namespace, name).await?;
        Err(ReconcileError::terminal(EXPORT_NOT_OFFERED))
    }

    /// Delete the copy this requester made, leaving unrelated Secrets alone
    async fn delete_copy(
        &self,
        requester: &K,
        namespace: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        let existing = match self.store.get::<Secret>(namespace, name).await {
            Ok(secret) => secret,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        let owned = requester.uid().is_some_and(|uid| {
            existing
                .owner_references()
                .iter()
                .any(|owner| owner.uid == uid)
        });
        if owned {
            info!("Export no longer offered, deleting copied secret");
            delete_secret(self.store.as_ref(), namespace, name).await?;
        }
        Ok(())
    }
}

fn targets(export: &SecretExport, namespace: &str) -> bool {
    export
        .static_to_namespaces()
        .iter()
        .any(|ns| ns == WILDCARD_NAMESPACE || ns == namespace)
}

#[async_trait]
impl<S: ObjectStore, K: SecretRequester> KeyReconciler for RequesterReconciler<S, K> {
    type Kind = K;
    const CONTROLLER: &'static str = K::CONTROLLER;

    async fn reconcile_key(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.reconcile(namespace, name).await
    }
}
