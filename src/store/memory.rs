//! # In-Memory Store
//!
//! An `ObjectStore` holding objects as JSON, used by the reconciler tests.
//!
//! It models the API server behaviors the reconcilers rely on:
//! - `resourceVersion` tokens with conflict detection on update
//! - `generation` bumped on spec changes only, status preserved across updates
//! - owner-reference cascading delete
//! - a write counter for idempotence checks

use super::{
    object_ref, service_account_user, ObjectStore, ResourceFetcher, StoreError, StoredObject,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const CONTROLLER_IDENTITY: &str = "controller";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectKey {
    api_version: String,
    kind: String,
    namespace: String,
    name: String,
}

impl ObjectKey {
    fn of<K: StoredObject>(namespace: &str, name: &str) -> Self {
        Self::new(&K::api_version(&()), &K::kind(&()), namespace, name)
    }

    fn new(api_version: &str, kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ObjectKey, Value>,
    next_version: u64,
    writes: usize,
    allowed_service_accounts: BTreeSet<String>,
    fetches: Vec<String>,
}

impl State {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

/// Cheaply clonable handle; clones share state
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a Namespace with the given annotations
    pub fn insert_namespace(&self, name: &str, annotations: &[(&str, &str)]) {
        let annotations: Map<String, Value> = annotations
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::String((*v).to_string())))
            .collect();
        let mut state = self.lock();
        let version = state.bump_version();
        state.objects.insert(
            ObjectKey::new("v1", "Namespace", "", name),
            json!({
                "apiVersion": "v1",
                "kind": "Namespace",
                "metadata": {
                    "name": name,
                    "resourceVersion": version,
                    "annotations": annotations,
                },
            }),
        );
    }

    /// Allow reads through `resource_fetcher` as this service account
    pub fn allow_service_account(&self, namespace: &str, service_account: &str) {
        self.lock()
            .allowed_service_accounts
            .insert(service_account_user(namespace, service_account));
    }

    /// Number of create/update/patch_status/delete calls that changed state
    #[must_use]
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Identities used for each `ResourceFetcher::fetch`, in call order
    #[must_use]
    pub fn fetch_identities(&self) -> Vec<String> {
        self.lock().fetches.clone()
    }

    /// Whether an object of type `K` exists
    #[must_use]
    pub fn contains<K: StoredObject>(&self, namespace: &str, name: &str) -> bool {
        self.lock()
            .objects
            .contains_key(&ObjectKey::of::<K>(namespace, name))
    }
}

fn decode<K: StoredObject>(value: &Value) -> Result<K, StoreError> {
    Ok(serde_json::from_value(value.clone())?)
}

fn set_metadata(value: &mut Value, field: &str, field_value: Value) {
    if let Value::Object(map) = value {
        let meta = map.entry("metadata").or_insert_with(|| json!({}));
        if let Value::Object(meta) = meta {
            meta.insert(field.to_string(), field_value);
        }
    }
}

/// Everything except metadata and status, used to detect spec changes
fn content_of(value: &Value) -> Value {
    let mut content = value.clone();
    if let Value::Object(map) = &mut content {
        map.remove("metadata");
        map.remove("status");
    }
    content
}

/// RFC 7386 JSON merge patch
fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(patch_map) => {
            if !target.is_object() {
                *target = json!({});
            }
            if let Value::Object(target_map) = target {
                for (key, value) in patch_map {
                    if value.is_null() {
                        target_map.remove(key);
                    } else {
                        merge_patch(
                            target_map.entry(key.clone()).or_insert(Value::Null),
                            value,
                        );
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

fn owner_uids(value: &Value) -> Vec<String> {
    value
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
        .map(|refs| {
            refs.iter()
                .filter_map(|r| r.get("uid").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get<K: StoredObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        let state = self.lock();
        match state.objects.get(&ObjectKey::of::<K>(namespace, name)) {
            Some(value) => decode(value),
            None => Err(StoreError::not_found(&K::kind(&()), namespace, name)),
        }
    }

    async fn list<K: StoredObject>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        let api_version = K::api_version(&());
        let kind = K::kind(&());
        let state = self.lock();
        state
            .objects
            .iter()
            .filter(|(key, _)| {
                key.api_version == api_version
                    && key.kind == kind
                    && namespace.is_none_or(|ns| key.namespace == ns)
            })
            .map(|(_, value)| decode(value))
            .collect()
    }

    async fn create<K: StoredObject>(&self, obj: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_ref(obj)?;
        let key = ObjectKey::of::<K>(&namespace, &name);
        let mut value = serde_json::to_value(obj)?;

        let mut state = self.lock();
        if state.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: key.kind,
                namespace,
                name,
            });
        }
        let version = state.bump_version();
        set_metadata(&mut value, "uid", json!(format!("uid-{version}")));
        set_metadata(&mut value, "resourceVersion", json!(version));
        set_metadata(&mut value, "generation", json!(1));
        state.writes += 1;
        state.objects.insert(key, value.clone());
        decode(&value)
    }

    async fn update<K: StoredObject>(&self, obj: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_ref(obj)?;
        let key = ObjectKey::of::<K>(&namespace, &name);
        let mut value = serde_json::to_value(obj)?;

        let mut state = self.lock();
        let Some(existing) = state.objects.get(&key).cloned() else {
            return Err(StoreError::not_found(&key.kind, &namespace, &name));
        };
        let conflict = obj.meta().resource_version.as_deref()
            != existing
                .pointer("/metadata/resourceVersion")
                .and_then(Value::as_str);
        if conflict {
            return Err(StoreError::Conflict {
                kind: key.kind,
                namespace,
                name,
            });
        }

        let generation = existing
            .pointer("/metadata/generation")
            .and_then(Value::as_i64)
            .unwrap_or(1);
        let generation = if content_of(&existing) == content_of(&value) {
            generation
        } else {
            generation + 1
        };
        let uid = existing.pointer("/metadata/uid").cloned().unwrap_or(Value::Null);

        match existing.get("status") {
            Some(status) => value["status"] = status.clone(),
            None => {
                if let Value::Object(map) = &mut value {
                    map.remove("status");
                }
            }
        }
        let version = state.bump_version();
        set_metadata(&mut value, "resourceVersion", json!(version));
        set_metadata(&mut value, "uid", uid);
        set_metadata(&mut value, "generation", json!(generation));
        state.writes += 1;
        state.objects.insert(key, value.clone());
        decode(&value)
    }

    async fn patch_status<K: StoredObject>(
        &self,
        namespace: &str,
        name: &str,
        status: &Value,
    ) -> Result<(), StoreError> {
        let key = ObjectKey::of::<K>(namespace, name);
        let mut state = self.lock();
        let version = state.bump_version();
        let Some(existing) = state.objects.get_mut(&key) else {
            return Err(StoreError::not_found(&key.kind, namespace, name));
        };
        merge_patch(existing, &json!({ "status": status }));
        set_metadata(existing, "resourceVersion", json!(version));
        state.writes += 1;
        Ok(())
    }

    async fn delete<K: StoredObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let key = ObjectKey::of::<K>(namespace, name);
        let mut state = self.lock();
        let Some(removed) = state.objects.remove(&key) else {
            return Err(StoreError::not_found(&key.kind, namespace, name));
        };
        state.writes += 1;

        // Cascade to dependents, transitively
        let mut pending: Vec<String> = removed
            .pointer("/metadata/uid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .into_iter()
            .collect();
        while let Some(uid) = pending.pop() {
            let dependents: Vec<ObjectKey> = state
                .objects
                .iter()
                .filter(|(_, value)| owner_uids(value).contains(&uid))
                .map(|(key, _)| key.clone())
                .collect();
            for dependent in dependents {
                if let Some(value) = state.objects.remove(&dependent) {
                    let child_uid = value.pointer("/metadata/uid").and_then(Value::as_str);
                    if let Some(child_uid) = child_uid {
                        pending.push(child_uid.to_string());
                    }
                }
            }
        }
        Ok(())
    }

    async fn get_namespace(&self, name: &str) -> Result<Namespace, StoreError> {
        let state = self.lock();
        match state.objects.get(&ObjectKey::new("v1", "Namespace", "", name)) {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Err(StoreError::not_found("Namespace", "", name)),
        }
    }

    async fn resource_fetcher(
        &self,
        namespace: &str,
        service_account: Option<&str>,
    ) -> Result<Arc<dyn ResourceFetcher>, StoreError> {
        let identity = match service_account {
            None => CONTROLLER_IDENTITY.to_string(),
            Some(sa) => {
                let user = service_account_user(namespace, sa);
                if !self.lock().allowed_service_accounts.contains(&user) {
                    return Err(StoreError::Forbidden(format!(
                        "service account {user} is not usable"
                    )));
                }
                user
            }
        };
        Ok(Arc::new(MemoryFetcher {
            store: self.clone(),
            identity,
        }))
    }
}

#[derive(Debug)]
struct MemoryFetcher {
    store: InMemoryStore,
    identity: String,
}

#[async_trait]
impl ResourceFetcher for MemoryFetcher {
    async fn fetch(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Value, StoreError> {
        let mut state = self.store.lock();
        state.fetches.push(self.identity.clone());
        state
            .objects
            .get(&ObjectKey::new(api_version, kind, namespace, name))
            .cloned()
            .ok_or_else(|| StoreError::not_found(kind, namespace, name))
    }
}
