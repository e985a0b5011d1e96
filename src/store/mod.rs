//! # Object Store
//!
//! The seam between reconcilers and the Kubernetes API.
//!
//! - `ObjectStore`: typed Get/List/Create/Update/UpdateStatus/Delete with
//!   NotFound/AlreadyExists/Conflict discrimination
//! - `ResourceFetcher`: untyped fetch by apiVersion/kind, optionally scoped to
//!   a service account identity
//!
//! `KubeStore` talks to the API server; `InMemoryStore` backs the tests.

mod kube_store;
mod memory;

pub use kube_store::KubeStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A namespaced API object the store can read and write
pub trait StoredObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> StoredObject for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} \"{namespace}/{name}\" not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("{kind} \"{namespace}/{name}\" already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("conflict writing {kind} \"{namespace}/{name}\": the object has been modified")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("object is missing metadata.{0}")]
    MissingMetadata(&'static str),
    #[error("API request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub(crate) fn not_found(kind: &str, namespace: &str, name: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

/// Typed access to namespaced objects
///
/// All operations honor the store's request timeout.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn get<K: StoredObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError>;

    /// List objects in `namespace`, or across all namespaces for `None`
    async fn list<K: StoredObject>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError>;

    async fn create<K: StoredObject>(&self, obj: &K) -> Result<K, StoreError>;

    /// Replace an object; `metadata.resourceVersion` must match the stored one
    async fn update<K: StoredObject>(&self, obj: &K) -> Result<K, StoreError>;

    /// Merge `status` into the status subresource
    async fn patch_status<K: StoredObject>(
        &self,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> Result<(), StoreError>;

    async fn delete<K: StoredObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    async fn get_namespace(&self, name: &str) -> Result<Namespace, StoreError>;

    /// Fetcher reading as `service_account` in `namespace`, or as the controller for `None`
    async fn resource_fetcher(
        &self,
        namespace: &str,
        service_account: Option<&str>,
    ) -> Result<Arc<dyn ResourceFetcher>, StoreError>;
}

/// Untyped read of an arbitrary resource kind
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<serde_json::Value, StoreError>;
}

/// Namespace and name of an object, or `MissingMetadata`
pub(crate) fn object_ref<K: Resource>(obj: &K) -> Result<(String, String), StoreError> {
    let meta = obj.meta();
    let namespace = meta
        .namespace
        .clone()
        .ok_or(StoreError::MissingMetadata("namespace"))?;
    let name = meta
        .name
        .clone()
        .ok_or(StoreError::MissingMetadata("name"))?;
    Ok((namespace, name))
}

/// Impersonation user name of a service account
#[must_use]
pub fn service_account_user(namespace: &str, service_account: &str) -> String {
    format!("system:serviceaccount:{namespace}:{service_account}")
}
