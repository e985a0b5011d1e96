//! # SecretTemplate Reconciler
//!
//! Renders a SecretTemplate into a Secret of the same name. Input resources
//! are arbitrary kinds without a watch, so templates are re-rendered on a
//! fixed interval, failed ones included.

use super::{fetch_live, instrumented, KeyReconciler, ReconcileError, ReconcileOutcome};
use async_trait::async_trait;
use crate::controller::secret::{create_or_update, DerivedSecret, SecretValues};
use crate::controller::status::{reconcile_with_status, StatusTracker};
use crate::controller::template::{render, resolve_inputs, TemplateError};
use crate::crd::{SecretReference, SecretTemplate};
use crate::store::ObjectStore;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const CONTROLLER: &str = "secrettemplate";

#[derive(Debug)]
pub struct TemplateReconciler<S> {
    store: Arc<S>,
    resync: Duration,
}

impl<S: ObjectStore> TemplateReconciler<S> {
    pub fn new(store: Arc<S>, resync: Duration) -> Self {
        Self { store, resync }
    }

    /// # Errors
    ///
    /// Only transient failures; terminal ones are recorded and polled.
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let result = instrumented(CONTROLLER, namespace, name, async {
            let Some(template) =
                fetch_live::<_, SecretTemplate>(self.store.as_ref(), namespace, name).await?
            else {
                return Ok(ReconcileOutcome::Done);
            };

            let tracker = StatusTracker::new(&template)?;
            reconcile_with_status(
                self.store.as_ref(),
                &tracker,
                self.render_secret(&template, &tracker),
            )
            .await
        })
        .await;

        match result {
            Err(e) if e.is_terminal() => Ok(ReconcileOutcome::RequeueAfter(self.resync)),
            result => result,
        }
    }

    async fn render_secret(
        &self,
        template: &SecretTemplate,
        tracker: &StatusTracker<SecretTemplate>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let namespace = template.namespace().unwrap_or_default();
        let service_account = template.spec.service_account_name.as_deref();
        let fetcher = self
            .store
            .resource_fetcher(&namespace, service_account)
            .await
            .map_err(|source| TemplateError::ServiceAccount {
                service_account: service_account.unwrap_or_default().to_string(),
                source,
            })?;
        let inputs =
            resolve_inputs(fetcher.as_ref(), &namespace, &template.spec.input_resources).await?;
        let rendered = render(
            &template.spec.json_path_template.clone().unwrap_or_default(),
            &inputs,
        )?;

        let mut secret = DerivedSecret::new(template, SecretValues::new()).into_secret();
        secret
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(rendered.labels);
        secret
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .extend(rendered.annotations);
        secret.type_ = rendered.r#type;
        secret.data = Some(rendered.data);

        create_or_update(self.store.as_ref(), &secret).await?;
        tracker.update(|status| {
            status.secret = Some(SecretReference {
                name: secret.name_any(),
            });
        });
        Ok(ReconcileOutcome::RequeueAfter(self.resync))
    }
}

#[async_trait]
impl<S: ObjectStore> KeyReconciler for TemplateReconciler<S> {
    type Kind = SecretTemplate;
    const CONTROLLER: &'static str = CONTROLLER;

    async fn reconcile_key(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.reconcile(namespace, name).await
    }
}
