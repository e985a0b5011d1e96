//! # Password Reconciler
//!
//! Generates a password into a Secret named after the Password resource. The
//! Secret records a fingerprint of the spec it was generated from in
//! `secretgen.k14s.io/generate-inputs`; while that fingerprint matches, the
//! existing password is kept.

use super::{fetch_live, instrumented, KeyReconciler, ReconcileError, ReconcileOutcome};
use async_trait::async_trait;
use crate::constants::{GENERATE_INPUTS_ANNOTATION, PASSWORD_SECRET_KEY, PASSWORD_SECRET_TYPE};
use crate::controller::generator::PasswordGenerator;
use crate::controller::secret::{create_or_update, DerivedSecret, SecretValues};
use crate::controller::status::{reconcile_with_status, StatusTracker};
use crate::crd::{GeneratedSecretTemplate, Password};
use crate::store::{ObjectStore, StoreError};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const CONTROLLER: &str = "password";

/// Name under which the generated password is visible to templates
const VALUE_KEY: &str = "value";

pub struct PasswordReconciler<S> {
    store: Arc<S>,
    generator: Arc<dyn PasswordGenerator>,
}

impl<S> std::fmt::Debug for PasswordReconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordReconciler").finish_non_exhaustive()
    }
}

impl<S: ObjectStore> PasswordReconciler<S> {
    pub fn new(store: Arc<S>, generator: Arc<dyn PasswordGenerator>) -> Self {
        Self { store, generator }
    }

    /// # Errors
    ///
    /// Terminal for unsatisfiable constraints or unknown template values.
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        instrumented(CONTROLLER, namespace, name, async {
            let Some(password) =
                fetch_live::<_, Password>(self.store.as_ref(), namespace, name).await?
            else {
                return Ok(ReconcileOutcome::Done);
            };

            let tracker = StatusTracker::new(&password)?;
            reconcile_with_status(self.store.as_ref(), &tracker, self.generate(&password)).await
        })
        .await
    }

    async fn generate(&self, password: &Password) -> Result<ReconcileOutcome, ReconcileError> {
        let fingerprint = serde_json::to_string(&password.spec).map_err(StoreError::from)?;
        let namespace = password.namespace().unwrap_or_default();
        let name = password.name_any();

        let existing = match self.store.get::<Secret>(&namespace, &name).await {
            Ok(secret) => Some(secret),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        let unchanged = existing.as_ref().is_some_and(|secret| {
            secret.annotations().get(GENERATE_INPUTS_ANNOTATION) == Some(&fingerprint)
        });
        if unchanged {
            debug!("inputs unchanged, keeping generated secret");
            return Ok(ReconcileOutcome::Done);
        }

        let value = self.generator.generate(&password.spec)?;
        let values = SecretValues::from([(VALUE_KEY.to_string(), value)]);

        let mut derived = DerivedSecret::new(password, values);
        derived.apply_templates(&default_template(), password.spec.secret_template.as_ref())?;
        let mut secret = derived.into_secret();
        secret
            .annotations_mut()
            .insert(GENERATE_INPUTS_ANNOTATION.to_string(), fingerprint);

        create_or_update(self.store.as_ref(), &secret).await?;
        Ok(ReconcileOutcome::Done)
    }
}

fn default_template() -> GeneratedSecretTemplate {
    GeneratedSecretTemplate {
        metadata: None,
        r#type: Some(PASSWORD_SECRET_TYPE.to_string()),
        string_data: BTreeMap::from([(
            PASSWORD_SECRET_KEY.to_string(),
            format!("$({VALUE_KEY})"),
        )]),
    }
}

#[async_trait]
impl<S: ObjectStore> KeyReconciler for PasswordReconciler<S> {
    type Kind = Password;
    const CONTROLLER: &'static str = CONTROLLER;

    async fn reconcile_key(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.reconcile(namespace, name).await
    }
}
