//! # Kubernetes Store
//!
//! `ObjectStore` backed by `kube::Api`.

use super::{
    object_ref, service_account_user, ObjectStore, ResourceFetcher, StoreError, StoredObject,
};
use crate::constants::FIELD_MANAGER;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::{DynamicObject, GroupVersionKind};
use kube::{Client, Config};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Store talking to the API server with the controller's own identity
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    config: Config,
    timeout: Duration,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("cluster_url", &self.config.cluster_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl KubeStore {
    /// `config` is kept to derive impersonating clients for service account reads
    #[must_use]
    pub fn new(client: Client, config: Config, timeout: Duration) -> Self {
        Self {
            client,
            config,
            timeout,
        }
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn call<T, F>(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
        fut: F,
    ) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, kube::Error>> + Send,
    {
        with_timeout(self.timeout, kind, namespace, name, fut).await
    }
}

async fn with_timeout<T, F>(
    timeout: Duration,
    kind: &str,
    namespace: &str,
    name: &str,
    fut: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, kube::Error>> + Send,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(|e| classify(e, kind, namespace, name)),
        Err(_elapsed) => Err(StoreError::Timeout(timeout)),
    }
}

/// Map API status codes onto the store's error taxonomy
fn classify(error: kube::Error, kind: &str, namespace: &str, name: &str) -> StoreError {
    match &error {
        kube::Error::Api(api_err) if api_err.code == 404 => {
            StoreError::not_found(kind, namespace, name)
        }
        kube::Error::Api(api_err) if api_err.code == 409 && api_err.reason == "AlreadyExists" => {
            StoreError::AlreadyExists {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        }
        kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(api_err) if api_err.code == 403 => {
            StoreError::Forbidden(api_err.message.clone())
        }
        _ => StoreError::Api(error),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: StoredObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        self.call(&K::kind(&()), namespace, name, api.get(name)).await
    }

    async fn list<K: StoredObject>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        let api: Api<K> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let list = self
            .call(
                &K::kind(&()),
                namespace.unwrap_or_default(),
                "",
                api.list(&ListParams::default()),
            )
            .await?;
        Ok(list.items)
    }

    async fn create<K: StoredObject>(&self, obj: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_ref(obj)?;
        debug!(resource.namespace = %namespace, resource.name = %name, "creating {}", K::kind(&()));
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        self.call(
            &K::kind(&()),
            &namespace,
            &name,
            api.create(&PostParams::default(), obj),
        )
        .await
    }

    async fn update<K: StoredObject>(&self, obj: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_ref(obj)?;
        debug!(resource.namespace = %namespace, resource.name = %name, "updating {}", K::kind(&()));
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        self.call(
            &K::kind(&()),
            &namespace,
            &name,
            api.replace(&name, &PostParams::default(), obj),
        )
        .await
    }

    async fn patch_status<K: StoredObject>(
        &self,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "status": status });
        self.call(
            &K::kind(&()),
            namespace,
            name,
            api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch)),
        )
        .await
        .map(|_| ())
    }

    async fn delete<K: StoredObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        self.call(
            &K::kind(&()),
            namespace,
            name,
            api.delete(name, &DeleteParams::background()),
        )
        .await
        .map(|_| ())
    }

    async fn get_namespace(&self, name: &str) -> Result<Namespace, StoreError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        self.call("Namespace", "", name, api.get(name)).await
    }

    async fn resource_fetcher(
        &self,
        namespace: &str,
        service_account: Option<&str>,
    ) -> Result<Arc<dyn ResourceFetcher>, StoreError> {
        let client = match service_account {
            None => self.client.clone(),
            Some(sa) => {
                let mut config = self.config.clone();
                config.auth_info.impersonate = Some(service_account_user(namespace, sa));
                Client::try_from(config)?
            }
        };
        Ok(Arc::new(DynamicFetcher {
            client,
            timeout: self.timeout,
        }))
    }
}

/// Fetches arbitrary kinds through API discovery
struct DynamicFetcher {
    client: Client,
    timeout: Duration,
}

#[async_trait]
impl ResourceFetcher for DynamicFetcher {
    async fn fetch(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<serde_json::Value, StoreError> {
        let gvk = parse_gvk(api_version, kind);
        let (resource, _caps) = with_timeout(
            self.timeout,
            kind,
            namespace,
            name,
            kube::discovery::pinned_kind(&self.client, &gvk),
        )
        .await?;
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &resource);
        let obj = with_timeout(self.timeout, kind, namespace, name, api.get(name)).await?;
        Ok(serde_json::to_value(obj)?)
    }
}

/// `apps/v1` → (apps, v1); core `v1` → ("", v1)
fn parse_gvk(api_version: &str, kind: &str) -> GroupVersionKind {
    match api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind::gvk(group, version, kind),
        None => GroupVersionKind::gvk("", api_version, kind),
    }
}
