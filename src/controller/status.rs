//! # Status State Machine
//!
//! `Idle → Reconciling → {Succeeded, Failed}`, recorded as conditions on the
//! resource's `GenericStatus`. A failed reconcile starts over from
//! `Reconciling` on the next attempt.
//!
//! `reconcile_with_status` wraps a reconcile body so the outcome is persisted
//! on every exit path, panics included. Status is only written when it differs
//! from what was last persisted, and the in-flight `Reconciling` state is only
//! written when the generation changed.

use crate::controller::reconciler::types::{ReconcileError, ReconcileOutcome};
use crate::crd::{
    Condition, ConditionStatus, ConditionType, GenericStatus, HasGenericStatus, Password,
    SecretExport, SecretExportApproval, SecretExportStatus, SecretImport, SecretRequest,
    SecretTemplate, SecretTemplateStatus,
};
use crate::store::{object_ref, ObjectStore, StoreError, StoredObject};
use futures::FutureExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error};

impl GenericStatus {
    /// Enter the in-flight state for the object's current generation
    pub fn set_reconciling(&mut self, meta: &ObjectMeta) {
        self.observed_generation = meta.generation.unwrap_or_default();
        self.conditions.clear();
        self.conditions
            .push(Condition::truthy(ConditionType::Reconciling));
        self.friendly_description = "Reconciling".to_string();
    }

    /// Record the outcome of the reconcile body
    pub fn set_reconcile_completed(&mut self, err: Option<&ReconcileError>) {
        self.conditions.clear();
        match err {
            Some(err) => {
                let message = err.to_string();
                if matches!(err, ReconcileError::Invalid(_)) {
                    self.conditions.push(Condition {
                        message: Some(message.clone()),
                        ..Condition::truthy(ConditionType::Invalid)
                    });
                }
                self.conditions.push(Condition {
                    message: Some(message.clone()),
                    ..Condition::truthy(ConditionType::ReconcileFailed)
                });
                self.friendly_description = format!("Reconcile failed: {message}");
            }
            None => {
                self.conditions
                    .push(Condition::truthy(ConditionType::ReconcileSucceeded));
                self.friendly_description = "Reconcile succeeded".to_string();
            }
        }
    }

    /// Record a reconcile body that panicked
    pub fn set_reconcile_panicked(&mut self, message: &str) {
        self.conditions.clear();
        self.conditions.push(Condition {
            reason: Some("Panic".to_string()),
            message: Some(message.to_string()),
            ..Condition::truthy(ConditionType::ReconcileFailed)
        });
        self.friendly_description = format!("Reconcile failed: {message}");
    }

    #[must_use]
    pub fn has_condition(&self, r#type: ConditionType) -> bool {
        self.conditions
            .iter()
            .any(|c| c.r#type == r#type && c.status == ConditionStatus::True)
    }
}

/// A resource whose status subresource embeds a `GenericStatus`
pub trait StatusResource: StoredObject {
    type Status: HasGenericStatus;

    fn status(&self) -> Option<&Self::Status>;
}

macro_rules! status_resource {
    ($kind:ty, $status:ty) => {
        impl StatusResource for $kind {
            type Status = $status;

            fn status(&self) -> Option<&$status> {
                self.status.as_ref()
            }
        }
    };
}

status_resource!(SecretExport, SecretExportStatus);
status_resource!(SecretImport, GenericStatus);
status_resource!(SecretRequest, GenericStatus);
status_resource!(SecretExportApproval, GenericStatus);
status_resource!(SecretTemplate, SecretTemplateStatus);
status_resource!(Password, GenericStatus);

#[derive(Debug)]
struct Tracked<S> {
    persisted: S,
    current: S,
}

/// In-memory status of one reconcile plus what is known to be persisted
#[derive(Debug)]
pub struct StatusTracker<K: StatusResource> {
    namespace: String,
    name: String,
    meta: ObjectMeta,
    state: Mutex<Tracked<K::Status>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: StatusResource> StatusTracker<K> {
    /// # Errors
    ///
    /// Fails when the object has no namespace or name.
    pub fn new(obj: &K) -> Result<Self, StoreError> {
        let (namespace, name) = object_ref(obj)?;
        let persisted = obj.status().cloned().unwrap_or_default();
        Ok(Self {
            namespace,
            name,
            meta: obj.meta().clone(),
            state: Mutex::new(Tracked {
                current: persisted.clone(),
                persisted,
            }),
            _kind: PhantomData,
        })
    }

    /// Modify resource-specific status fields
    pub fn update(&self, f: impl FnOnce(&mut K::Status)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state.current);
    }

    #[must_use]
    pub fn current(&self) -> K::Status {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    /// Enter `Reconciling`, persisting it only for a new generation
    ///
    /// # Errors
    ///
    /// Propagates the status write failure.
    pub async fn set_reconciling<S: ObjectStore>(&self, store: &S) -> Result<(), StoreError> {
        let new_generation = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.current.generic_mut().set_reconciling(&self.meta);
            state.persisted.generic().observed_generation
                != state.current.generic().observed_generation
        };
        if new_generation {
            self.persist(store).await?;
        }
        Ok(())
    }

    /// Record the outcome and persist it when it changed
    ///
    /// # Errors
    ///
    /// Propagates the status write failure.
    pub async fn complete<S: ObjectStore>(
        &self,
        store: &S,
        err: Option<&ReconcileError>,
    ) -> Result<(), StoreError> {
        self.update(|status| status.generic_mut().set_reconcile_completed(err));
        self.persist(store).await
    }

    /// Write the current status unless it equals the persisted one
    ///
    /// # Errors
    ///
    /// Propagates the status write failure.
    pub async fn persist<S: ObjectStore>(&self, store: &S) -> Result<(), StoreError> {
        let current = {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.current == state.persisted {
                debug!(
                    resource.namespace = %self.namespace,
                    resource.name = %self.name,
                    "status unchanged, skipping write"
                );
                return Ok(());
            }
            state.current.clone()
        };
        store
            .patch_status::<K>(&self.namespace, &self.name, &serde_json::to_value(&current)?)
            .await?;
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .persisted = current;
        Ok(())
    }
}

/// Run a reconcile body with guaranteed status write-back
///
/// A panic in `body` is recorded as `ReconcileFailed` and then resumed.
///
/// # Errors
///
/// Returns the body's error, or the status write failure when the body succeeded.
pub async fn reconcile_with_status<S, K, Fut>(
    store: &S,
    tracker: &StatusTracker<K>,
    body: Fut,
) -> Result<ReconcileOutcome, ReconcileError>
where
    S: ObjectStore,
    K: StatusResource,
    Fut: Future<Output = Result<ReconcileOutcome, ReconcileError>> + Send,
{
    tracker.set_reconciling(store).await?;

    let result = match AssertUnwindSafe(body).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracker.update(|status| status.generic_mut().set_reconcile_panicked(&message));
            if let Err(e) = tracker.persist(store).await {
                error!("Failed to persist status after panic: {}", e);
            }
            std::panic::resume_unwind(panic);
        }
    };

    match (tracker.complete(store, result.as_ref().err()).await, result) {
        (Ok(()), result) => result,
        (Err(e), Ok(_)) => Err(e.into()),
        (Err(e), Err(original)) => {
            error!("Failed to persist failed status: {}", e);
            Err(original)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "reconcile panicked".to_string()
    }
}
