//! # Watch Relations
//!
//! Mappers from a related object's event to the reconcile keys it affects.
//! They are pure over the controller's reflector cache so they can be tested
//! without an API server.
//!
//! An export event only carries the export's new targets, so export mappers
//! never filter on them: a namespace that was just dropped still needs its
//! requesters and placeholders reconciled.

use crate::constants::{DOCKER_CONFIG_JSON_TYPE, PLACEHOLDER_SECRET_ANNOTATION};
use crate::controller::reconciler::SecretRequester;
use crate::crd::SecretExport;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::ResourceExt;
use kube_runtime::reflector::ObjectRef;
use std::sync::Arc;

/// A Secret event reconciles the SecretExport of the same namespace and name
#[must_use]
pub fn export_for_secret(secret: &Secret) -> Option<ObjectRef<SecretExport>> {
    let namespace = secret.namespace()?;
    Some(ObjectRef::new(&secret.name_any()).within(&namespace))
}

/// Requesters of the export's name asking for its namespace, wherever they are
#[must_use]
pub fn requesters_for_export<K: SecretRequester>(
    export: &SecretExport,
    requesters: &[Arc<K>],
) -> Vec<ObjectRef<K>> {
    let Some(from_namespace) = export.namespace() else {
        return Vec::new();
    };
    let name = export.name_any();
    requesters
        .iter()
        .filter(|r| r.name_any() == name && r.from_namespace() == from_namespace)
        .map(|r| ObjectRef::from_obj(r.as_ref()))
        .collect()
}

/// Requesters copying from the Secret: same name, `fromNamespace` its namespace
#[must_use]
pub fn requesters_for_secret<K: SecretRequester>(
    secret: &Secret,
    requesters: &[Arc<K>],
) -> Vec<ObjectRef<K>> {
    let Some(from_namespace) = secret.namespace() else {
        return Vec::new();
    };
    let name = secret.name_any();
    requesters
        .iter()
        .filter(|r| r.name_any() == name && r.from_namespace() == from_namespace)
        .map(|r| ObjectRef::from_obj(r.as_ref()))
        .collect()
}

/// Namespace annotations gate wildcard exports, so every requester inside is affected
#[must_use]
pub fn requesters_in_namespace<K: SecretRequester>(
    namespace: &Namespace,
    requesters: &[Arc<K>],
) -> Vec<ObjectRef<K>> {
    let name = namespace.name_any();
    requesters
        .iter()
        .filter(|r| r.namespace().as_deref() == Some(name.as_str()))
        .map(|r| ObjectRef::from_obj(r.as_ref()))
        .collect()
}

#[must_use]
pub fn is_placeholder(secret: &Secret) -> bool {
    secret.annotations().contains_key(PLACEHOLDER_SECRET_ANNOTATION)
}

fn placeholders<'a>(
    secrets: &'a [Arc<Secret>],
    include: impl Fn(&str) -> bool + 'a,
) -> impl Iterator<Item = ObjectRef<Secret>> + 'a {
    secrets
        .iter()
        .filter(|s| is_placeholder(s))
        .filter(move |s| include(&s.namespace().unwrap_or_default()))
        .map(|s| ObjectRef::from_obj(s.as_ref()))
}

/// Every placeholder, since the export may have left or joined any namespace
#[must_use]
pub fn placeholders_for_export(
    _export: &SecretExport,
    secrets: &[Arc<Secret>],
) -> Vec<ObjectRef<Secret>> {
    placeholders(secrets, |_| true).collect()
}

#[must_use]
pub fn placeholders_in_namespace(
    namespace: &Namespace,
    secrets: &[Arc<Secret>],
) -> Vec<ObjectRef<Secret>> {
    let name = namespace.name_any();
    placeholders(secrets, move |ns| ns == name).collect()
}

/// Any docker config may be exported anywhere; placeholders themselves are skipped
#[must_use]
pub fn placeholders_for_secret(
    secret: &Secret,
    secrets: &[Arc<Secret>],
) -> Vec<ObjectRef<Secret>> {
    if is_placeholder(secret) || secret.type_.as_deref() != Some(DOCKER_CONFIG_JSON_TYPE) {
        return Vec::new();
    }
    placeholders(secrets, |_| true).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{SecretExportSpec, SecretImport, SecretImportSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn meta(namespace: &str, name: &str) -> ObjectMeta {
        ObjectMeta {
            namespace: Some(namespace.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn export(to: &[&str]) -> SecretExport {
        SecretExport {
            metadata: meta("ns1", "creds"),
            spec: SecretExportSpec {
                to_namespace: None,
                to_namespaces: to.iter().map(ToString::to_string).collect(),
            },
            status: None,
        }
    }

    fn import(namespace: &str, name: &str, from_namespace: &str) -> Arc<SecretImport> {
        Arc::new(SecretImport {
            metadata: meta(namespace, name),
            spec: SecretImportSpec {
                from_namespace: from_namespace.to_string(),
            },
            status: None,
        })
    }

    fn secret(namespace: &str, name: &str, type_: &str, placeholder: bool) -> Arc<Secret> {
        let mut metadata = meta(namespace, name);
        if placeholder {
            metadata.annotations = Some(BTreeMap::from([(
                PLACEHOLDER_SECRET_ANNOTATION.to_string(),
                String::new(),
            )]));
        }
        Arc::new(Secret {
            metadata,
            type_: Some(type_.to_string()),
            ..Default::default()
        })
    }

    fn names<K: kube::Resource>(refs: &[ObjectRef<K>]) -> Vec<String>
    where
        K::DynamicType: Default,
    {
        refs.iter()
            .map(|r| format!("{}/{}", r.namespace.as_deref().unwrap_or_default(), r.name))
            .collect()
    }

    #[test]
    fn test_export_for_secret_shares_identity() {
        let r = export_for_secret(&secret("ns1", "creds", "Opaque", false)).unwrap();
        assert_eq!(r.name, "creds");
        assert_eq!(r.namespace.as_deref(), Some("ns1"));
    }

    #[test]
    fn test_requesters_for_export_match_source() {
        let requesters = vec![
            import("ns2", "creds", "ns1"),
            import("ns3", "creds", "ns1"),
            import("ns2", "other", "ns1"),
            import("ns2", "creds", "elsewhere"),
        ];
        let refs = requesters_for_export(&export(&["*"]), &requesters);
        assert_eq!(names(&refs), vec!["ns2/creds", "ns3/creds"]);
    }

    #[test]
    fn test_narrowed_export_still_reaches_dropped_namespace() {
        let requesters = vec![import("ns2", "creds", "ns1"), import("ns3", "creds", "ns1")];
        // toNamespaces went from [ns2] to [ns3]
        let refs = requesters_for_export(&export(&["ns3"]), &requesters);
        assert_eq!(names(&refs), vec!["ns2/creds", "ns3/creds"]);
    }

    #[test]
    fn test_requesters_for_secret_match_source() {
        let requesters = vec![import("ns2", "creds", "ns1"), import("ns3", "creds", "ns9")];
        let refs = requesters_for_secret(&secret("ns1", "creds", "Opaque", false), &requesters);
        assert_eq!(names(&refs), vec!["ns2/creds"]);
    }

    #[test]
    fn test_requesters_in_namespace() {
        let requesters = vec![import("ns2", "a", "ns1"), import("ns3", "b", "ns1")];
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some("ns3".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(names(&requesters_in_namespace(&namespace, &requesters)), vec!["ns3/b"]);
    }

    #[test]
    fn test_placeholders_for_secret_skips_unrelated_types() {
        let cache = vec![
            secret("app", "pull", DOCKER_CONFIG_JSON_TYPE, true),
            secret("app", "plain", "Opaque", false),
        ];
        let registry = secret("ns1", "registry", DOCKER_CONFIG_JSON_TYPE, false);
        assert_eq!(names(&placeholders_for_secret(&registry, &cache)), vec!["app/pull"]);

        let opaque = secret("ns1", "creds", "Opaque", false);
        assert!(placeholders_for_secret(&opaque, &cache).is_empty());
        assert!(placeholders_for_secret(&cache[0], &cache).is_empty());
    }

    #[test]
    fn test_placeholders_for_export_include_dropped_namespaces() {
        let cache = vec![
            secret("ns2", "pull", DOCKER_CONFIG_JSON_TYPE, true),
            secret("ns3", "pull", DOCKER_CONFIG_JSON_TYPE, true),
            secret("ns3", "plain", "Opaque", false),
        ];
        assert_eq!(
            names(&placeholders_for_export(&export(&["ns3"]), &cache)),
            vec!["ns2/pull", "ns3/pull"]
        );
    }
}
