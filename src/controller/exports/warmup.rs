//! # Registry Warm-up
//!
//! The registry starts empty and is filled by the export controller as it
//! works through its queue. Requesters reconciling before that would wrongly
//! see "not exported", so the first query relists every SecretExport once and
//! exports those whose Secret exists.

use super::matcher::SecretMatcher;
use super::oracle::NamespaceOracle;
use super::registry::SecretExports;
use crate::crd::SecretExport;
use crate::store::{ObjectStore, StoreError};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Read side of the registry that warms it up on first use
#[derive(Debug)]
pub struct WarmedSecretExports<S> {
    exports: Arc<SecretExports>,
    store: Arc<S>,
    warmed: OnceCell<()>,
}

impl<S: ObjectStore> WarmedSecretExports<S> {
    pub fn new(exports: Arc<SecretExports>, store: Arc<S>) -> Self {
        Self {
            exports,
            store,
            warmed: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn exports(&self) -> &Arc<SecretExports> {
        &self.exports
    }

    /// Run the relist once; concurrent callers wait for the first one
    ///
    /// A failed relist is retried by the next caller.
    ///
    /// # Errors
    ///
    /// Propagates list/get failures.
    pub async fn warm_up(&self) -> Result<(), StoreError> {
        self.warmed
            .get_or_try_init(|| async {
                let exports = self.store.list::<SecretExport>(None).await?;
                let mut exported = 0_usize;
                for export in &exports {
                    if export.metadata.deletion_timestamp.is_some()
                        || export.static_to_namespaces().is_empty()
                    {
                        continue;
                    }
                    let namespace = export.namespace().unwrap_or_default();
                    match self.store.get::<Secret>(&namespace, &export.name_any()).await {
                        Ok(secret) => {
                            self.exports.export(export, &secret);
                            exported += 1;
                        }
                        Err(e) if e.is_not_found() => {}
                        Err(e) => return Err(e),
                    }
                }
                info!(
                    "Warmed up export registry with {} of {} SecretExports",
                    exported,
                    exports.len()
                );
                Ok::<(), StoreError>(())
            })
            .await
            .map(|_| ())
    }

    /// # Errors
    ///
    /// Propagates warm-up and namespace lookup failures.
    pub async fn matched_secrets_for_import<O>(
        &self,
        matcher: &SecretMatcher,
        oracle: &O,
    ) -> Result<Vec<Secret>, StoreError>
    where
        O: NamespaceOracle + ?Sized,
    {
        self.warm_up().await?;
        self.exports.matched_secrets_for_import(matcher, oracle).await
    }
}
