//! # Placeholder Reconciler
//!
//! A Secret annotated with `secretgen.carvel.dev/image-pull-secret` is filled
//! with the combined docker config of every `kubernetes.io/dockerconfigjson`
//! Secret exported to its namespace. Secrets have no status subresource, so
//! the outcome is mirrored as JSON into `secretgen.carvel.dev/status`.
//!
//! The annotation value may narrow the exports considered:
//!
//! ```json
//! {"fromNamespaceAnnotations": {"team": "payments"}}
//! ```

use super::{fetch_live, instrumented, KeyReconciler, ReconcileError, ReconcileOutcome};
use async_trait::async_trait;
use crate::constants::{
    DOCKER_CONFIG_JSON_KEY, DOCKER_CONFIG_JSON_TYPE, PLACEHOLDER_SECRET_ANNOTATION,
    STATUS_ANNOTATION,
};
use crate::controller::exports::{SecretMatcher, StoreNamespaceOracle, WarmedSecretExports};
use crate::controller::secret::combine_docker_configs;
use crate::crd::GenericStatus;
use crate::observability::metrics;
use crate::store::{ObjectStore, StoreError};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const CONTROLLER: &str = "placeholder";

/// Status stored in the placeholder's status annotation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderStatus {
    #[serde(flatten)]
    pub generic: GenericStatus,
    /// `namespace/name` of every aggregated Secret, sorted
    #[serde(default)]
    pub secret_names: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceholderSelector {
    #[serde(default)]
    from_namespace_annotations: Option<BTreeMap<String, String>>,
}

struct Aggregate {
    docker_config: Vec<u8>,
    secret_names: Vec<String>,
}

#[derive(Debug)]
pub struct PlaceholderReconciler<S> {
    store: Arc<S>,
    exports: Arc<WarmedSecretExports<S>>,
    resync: Duration,
}

impl<S: ObjectStore> PlaceholderReconciler<S> {
    pub fn new(store: Arc<S>, exports: Arc<WarmedSecretExports<S>>, resync: Duration) -> Self {
        Self {
            store,
            exports,
            resync,
        }
    }

    /// # Errors
    ///
    /// Terminal for a wrong Secret type, a bad selector or unparsable
    /// docker configs; the failure is still recorded on the Secret.
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        instrumented(CONTROLLER, namespace, name, async {
            let Some(secret) = fetch_live::<_, Secret>(self.store.as_ref(), namespace, name).await?
            else {
                return Ok(ReconcileOutcome::Done);
            };
            let Some(selector) = secret.annotations().get(PLACEHOLDER_SECRET_ANNOTATION).cloned()
            else {
                return Ok(ReconcileOutcome::Done);
            };

            // Transient failures are retried without touching the Secret
            let result = match self.aggregate(&secret, &selector).await {
                Err(e) if !e.is_terminal() => return Err(e),
                result => result,
            };

            let mut desired = secret.clone();
            let mut status = PlaceholderStatus::default();
            match &result {
                Ok(aggregate) => {
                    desired.data.get_or_insert_with(BTreeMap::new).insert(
                        DOCKER_CONFIG_JSON_KEY.to_string(),
                        ByteString(aggregate.docker_config.clone()),
                    );
                    status.secret_names.clone_from(&aggregate.secret_names);
                    status.generic.set_reconcile_completed(None);
                }
                Err(e) => status.generic.set_reconcile_completed(Some(e)),
            }
            desired.annotations_mut().insert(
                STATUS_ANNOTATION.to_string(),
                serde_json::to_string(&status).map_err(StoreError::from)?,
            );

            if desired != secret {
                self.store.update(&desired).await?;
                metrics::increment_secret_writes("update");
                info!(
                    secrets = status.secret_names.len(),
                    "Updated placeholder secret"
                );
            }

            result.map(|_| ReconcileOutcome::RequeueAfter(self.resync))
        })
        .await
    }

    async fn aggregate(
        &self,
        secret: &Secret,
        selector: &str,
    ) -> Result<Aggregate, ReconcileError> {
        if secret.type_.as_deref() != Some(DOCKER_CONFIG_JSON_TYPE) {
            return Err(ReconcileError::invalid(format!(
                "expected secret type {DOCKER_CONFIG_JSON_TYPE}"
            )));
        }

        let selector: PlaceholderSelector = if selector.trim().is_empty() {
            PlaceholderSelector::default()
        } else {
            serde_json::from_str(selector).map_err(|e| {
                ReconcileError::invalid(format!(
                    "parsing {PLACEHOLDER_SECRET_ANNOTATION} annotation: {e}"
                ))
            })?
        };

        let matcher = SecretMatcher {
            target_namespace: secret.namespace().unwrap_or_default(),
            secret_type: Some(DOCKER_CONFIG_JSON_TYPE.to_string()),
            from_namespace_annotations: selector.from_namespace_annotations,
            ..SecretMatcher::default()
        };
        let oracle = StoreNamespaceOracle::new(self.store.as_ref());
        let matched = self
            .exports
            .matched_secrets_for_import(&matcher, &oracle)
            .await?;

        let docker_config = combine_docker_configs(&matched)?;
        let mut secret_names: Vec<String> = matched
            .iter()
            .map(|s| format!("{}/{}", s.namespace().unwrap_or_default(), s.name_any()))
            .collect();
        secret_names.sort();

        Ok(Aggregate {
            docker_config,
            secret_names,
        })
    }
}

#[async_trait]
impl<S: ObjectStore> KeyReconciler for PlaceholderReconciler<S> {
    type Kind = Secret;
    const CONTROLLER: &'static str = CONTROLLER;

    /// Every Secret is watched; only annotated ones are placeholders
    fn accepts(&self, secret: &Secret) -> bool {
        secret.annotations().contains_key(PLACEHOLDER_SECRET_ANNOTATION)
    }

    async fn reconcile_key(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.reconcile(namespace, name).await
    }
}
