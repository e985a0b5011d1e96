//! # Secret Copier
//!
//! Builds the Secret a reconciler owns: named and namespaced like its owner,
//! seeded with the owner's metadata and an owner reference for cascading
//! deletion. Content comes from a template over generated values or from a
//! source Secret.

use crate::constants::LAST_APPLIED_ANNOTATION;
use crate::crd::GeneratedSecretTemplate;
use crate::observability::metrics;
use crate::store::{ObjectStore, StoreError};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Generated values addressable as `$(name)` from a template
pub type SecretValues = BTreeMap<String, Zeroizing<String>>;

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("value for key '{0}' not found")]
    MissingValue(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CopyError {
    /// A template referencing an unknown value needs a spec change
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MissingValue(_))
    }
}

/// What `create_or_update` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretWrite {
    Created,
    Updated,
    Unchanged,
}

/// A Secret derived from an owner object
#[derive(Clone)]
pub struct DerivedSecret {
    secret: Secret,
    values: SecretValues,
}

impl std::fmt::Debug for DerivedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedSecret")
            .field("name", &self.secret.metadata.name)
            .field("namespace", &self.secret.metadata.namespace)
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl DerivedSecret {
    pub fn new<K>(owner: &K, values: SecretValues) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        let mut annotations = owner.annotations().clone();
        annotations.remove(LAST_APPLIED_ANNOTATION);

        let secret = Secret {
            metadata: ObjectMeta {
                name: owner.meta().name.clone(),
                namespace: owner.meta().namespace.clone(),
                labels: non_empty(owner.labels().clone()),
                annotations: non_empty(annotations),
                owner_references: owner.controller_owner_ref(&()).map(|r| vec![r]),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        };
        Self { secret, values }
    }

    /// Merge template metadata and type, and resolve its `stringData` against the values
    ///
    /// # Errors
    ///
    /// `MissingValue` when a `$(name)` reference has no value.
    pub fn apply_template(&mut self, template: &GeneratedSecretTemplate) -> Result<(), CopyError> {
        if let Some(metadata) = &template.metadata {
            let meta = &mut self.secret.metadata;
            meta.labels
                .get_or_insert_with(BTreeMap::new)
                .extend(metadata.labels.clone());
            meta.annotations
                .get_or_insert_with(BTreeMap::new)
                .extend(metadata.annotations.clone());
        }

        if let Some(type_) = &template.r#type {
            self.secret.type_ = Some(type_.clone());
        }

        if !template.string_data.is_empty() {
            let mut data = BTreeMap::new();
            for (key, reference) in &template.string_data {
                let value_key = value_reference(reference);
                let value = self
                    .values
                    .get(value_key)
                    .ok_or_else(|| CopyError::MissingValue(value_key.to_string()))?;
                data.insert(key.clone(), ByteString(value.as_bytes().to_vec()));
            }
            self.secret.data = Some(data);
        }
        Ok(())
    }

    /// Apply the default template, then the user's template on top
    ///
    /// # Errors
    ///
    /// `MissingValue` when either template references an unknown value.
    pub fn apply_templates(
        &mut self,
        default: &GeneratedSecretTemplate,
        custom: Option<&GeneratedSecretTemplate>,
    ) -> Result<(), CopyError> {
        self.apply_template(default)?;
        if let Some(custom) = custom {
            self.apply_template(custom)?;
        }
        Ok(())
    }

    /// Copy `source` content, keeping metadata keys already present
    pub fn apply_secret(&mut self, source: &Secret) {
        apply_secret_content(&mut self.secret, source);
    }

    /// Adopt identity of the stored object so an update is accepted
    pub fn associate_existing_secret(&mut self, existing: &Secret) {
        associate_existing_secret(&mut self.secret, existing);
    }

    #[must_use]
    pub fn as_secret(&self) -> &Secret {
        &self.secret
    }

    #[must_use]
    pub fn into_secret(self) -> Secret {
        self.secret
    }
}

/// `$(value)` → `value`; anything else is taken as the value name itself
fn value_reference(reference: &str) -> &str {
    reference
        .trim()
        .strip_prefix("$(")
        .and_then(|r| r.strip_suffix(')'))
        .map_or(reference.trim(), str::trim)
}

fn non_empty(map: BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

/// Merge labels/annotations without overwriting, replace type and data
pub fn apply_secret_content(dest: &mut Secret, source: &Secret) {
    merge_missing(&mut dest.metadata.labels, source.metadata.labels.as_ref());
    merge_missing(
        &mut dest.metadata.annotations,
        source.metadata.annotations.as_ref(),
    );
    dest.type_.clone_from(&source.type_);
    dest.data.clone_from(&source.data);
}

fn merge_missing(
    dest: &mut Option<BTreeMap<String, String>>,
    source: Option<&BTreeMap<String, String>>,
) {
    let Some(source) = source else {
        return;
    };
    let dest = dest.get_or_insert_with(BTreeMap::new);
    for (key, value) in source {
        if key == LAST_APPLIED_ANNOTATION {
            continue;
        }
        dest.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

pub fn associate_existing_secret(dest: &mut Secret, existing: &Secret) {
    dest.metadata
        .resource_version
        .clone_from(&existing.metadata.resource_version);
    dest.metadata.uid.clone_from(&existing.metadata.uid);
}

/// Whether updating `existing` to `desired` would change anything
#[must_use]
pub fn secret_content_equal(existing: &Secret, desired: &Secret) -> bool {
    let empty = BTreeMap::new();
    existing.type_.as_deref().unwrap_or("Opaque") == desired.type_.as_deref().unwrap_or("Opaque")
        && existing.data.as_ref().unwrap_or(&empty) == desired.data.as_ref().unwrap_or(&empty)
        && existing.labels() == desired.labels()
        && existing.annotations() == desired.annotations()
        && existing.owner_references() == desired.owner_references()
}

/// Create `desired`, or update the stored Secret when it already exists
///
/// # Errors
///
/// Any store failure other than AlreadyExists on create.
pub async fn create_or_update<S: ObjectStore>(
    store: &S,
    desired: &Secret,
) -> Result<SecretWrite, CopyError> {
    match store.create(desired).await {
        Ok(_) => {
            info!(
                resource.namespace = %desired.namespace().unwrap_or_default(),
                resource.name = %desired.name_any(),
                "Created secret"
            );
            metrics::increment_secret_writes("create");
            return Ok(SecretWrite::Created);
        }
        Err(e) if e.is_already_exists() => {}
        Err(e) => return Err(e.into()),
    }

    let namespace = desired.namespace().unwrap_or_default();
    let name = desired.name_any();
    let existing: Secret = store.get(&namespace, &name).await?;
    let mut desired = desired.clone();
    associate_existing_secret(&mut desired, &existing);

    if secret_content_equal(&existing, &desired) {
        debug!(resource.namespace = %namespace, resource.name = %name, "Secret up to date");
        return Ok(SecretWrite::Unchanged);
    }

    store.update(&desired).await?;
    info!(resource.namespace = %namespace, resource.name = %name, "Updated secret");
    metrics::increment_secret_writes("update");
    Ok(SecretWrite::Updated)
}

/// Delete a Secret, treating NotFound as success
///
/// # Errors
///
/// Any other store failure.
pub async fn delete_secret<S: ObjectStore>(
    store: &S,
    namespace: &str,
    name: &str,
) -> Result<bool, StoreError> {
    match store.delete::<Secret>(namespace, name).await {
        Ok(()) => {
            info!(resource.namespace = %namespace, resource.name = %name, "Deleted secret");
            metrics::increment_secret_writes("delete");
            Ok(true)
        }
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{SecretImport, SecretImportSpec, TemplateMetadata};
    use crate::store::InMemoryStore;

    fn owner() -> SecretImport {
        SecretImport {
            metadata: ObjectMeta {
                name: Some("creds".to_string()),
                namespace: Some("ns2".to_string()),
                uid: Some("owner-uid".to_string()),
                labels: Some(BTreeMap::from([("app".to_string(), "web".to_string())])),
                annotations: Some(BTreeMap::from([
                    (LAST_APPLIED_ANNOTATION.to_string(), "{}".to_string()),
                    ("note".to_string(), "kept".to_string()),
                ])),
                ..ObjectMeta::default()
            },
            spec: SecretImportSpec {
                from_namespace: "ns1".to_string(),
            },
            status: None,
        }
    }

    fn values(pairs: &[(&str, &str)]) -> SecretValues {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Zeroizing::new((*v).to_string())))
            .collect()
    }

    #[test]
    fn test_new_secret_is_owned_and_seeded() {
        let derived = DerivedSecret::new(&owner(), SecretValues::new());
        let secret = derived.as_secret();

        assert_eq!(secret.metadata.name.as_deref(), Some("creds"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("ns2"));
        assert_eq!(secret.labels().get("app").map(String::as_str), Some("web"));
        assert!(!secret.annotations().contains_key(LAST_APPLIED_ANNOTATION));
        let owner_ref = &secret.metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(owner_ref.uid, "owner-uid");
        assert_eq!(owner_ref.kind, "SecretImport");
        assert_eq!(owner_ref.controller, Some(true));
    }

    #[test]
    fn test_apply_templates_custom_replaces_data_and_merges_metadata() {
        let mut derived = DerivedSecret::new(&owner(), values(&[("value", "s3cr3t")]));
        let default = GeneratedSecretTemplate {
            metadata: None,
            r#type: Some("secretgen.k14s.io/password".to_string()),
            string_data: BTreeMap::from([("password".to_string(), "$(value)".to_string())]),
        };
        let custom = GeneratedSecretTemplate {
            metadata: Some(TemplateMetadata {
                labels: BTreeMap::from([("app".to_string(), "db".to_string())]),
                annotations: BTreeMap::new(),
            }),
            r#type: Some("Opaque".to_string()),
            string_data: BTreeMap::from([("pass".to_string(), "$(value)".to_string())]),
        };
        derived.apply_templates(&default, Some(&custom)).unwrap();
        let secret = derived.into_secret();

        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        let data = secret.data.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data["pass"], ByteString(b"s3cr3t".to_vec()));
        assert_eq!(secret.metadata.labels.unwrap()["app"], "db");
    }

    #[test]
    fn test_apply_template_missing_value() {
        let mut derived = DerivedSecret::new(&owner(), SecretValues::new());
        let template = GeneratedSecretTemplate {
            string_data: BTreeMap::from([("k".to_string(), "$(value)".to_string())]),
            ..GeneratedSecretTemplate::default()
        };
        let err = derived.apply_template(&template).unwrap_err();
        assert_eq!(err.to_string(), "value for key 'value' not found");
    }

    #[test]
    fn test_apply_secret_keeps_existing_metadata() {
        let mut dest = Secret {
            metadata: ObjectMeta {
                annotations: Some(BTreeMap::from([("owner".to_string(), "user".to_string())])),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([("stale".to_string(), ByteString(b"x".to_vec()))])),
            ..Secret::default()
        };
        let source = Secret {
            metadata: ObjectMeta {
                annotations: Some(BTreeMap::from([
                    ("owner".to_string(), "source".to_string()),
                    ("extra".to_string(), "1".to_string()),
                ])),
                ..ObjectMeta::default()
            },
            type_: Some("kubernetes.io/dockerconfigjson".to_string()),
            data: Some(BTreeMap::from([("key1".to_string(), ByteString(b"val1".to_vec()))])),
            ..Secret::default()
        };
        apply_secret_content(&mut dest, &source);

        let annotations = dest.metadata.annotations.unwrap();
        assert_eq!(annotations["owner"], "user");
        assert_eq!(annotations["extra"], "1");
        assert_eq!(dest.type_, source.type_);
        assert_eq!(dest.data, source.data);
    }

    #[tokio::test]
    async fn test_create_or_update_protocol() {
        let store = InMemoryStore::new();
        let mut derived = DerivedSecret::new(&owner(), SecretValues::new());
        derived.apply_secret(&Secret {
            data: Some(BTreeMap::from([("key1".to_string(), ByteString(b"val1".to_vec()))])),
            ..Secret::default()
        });

        assert_eq!(
            create_or_update(&store, derived.as_secret()).await.unwrap(),
            SecretWrite::Created
        );
        assert_eq!(
            create_or_update(&store, derived.as_secret()).await.unwrap(),
            SecretWrite::Unchanged
        );
        assert_eq!(store.writes(), 1);

        derived.apply_secret(&Secret {
            data: Some(BTreeMap::from([("key1".to_string(), ByteString(b"val2".to_vec()))])),
            ..Secret::default()
        });
        assert_eq!(
            create_or_update(&store, derived.as_secret()).await.unwrap(),
            SecretWrite::Updated
        );
        let stored: Secret = store.get("ns2", "creds").await.unwrap();
        assert_eq!(stored.data.unwrap()["key1"], ByteString(b"val2".to_vec()));
    }

    #[test]
    fn test_value_reference_forms() {
        assert_eq!(value_reference("$(value)"), "value");
        assert_eq!(value_reference(" $( value ) "), "value");
        assert_eq!(value_reference("value"), "value");
    }
}
