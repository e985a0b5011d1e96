//! Shared fixtures for the scenario tests
//!
//! Every reconciler runs against one `InMemoryStore` and one export registry,
//! the way the controllers share them in a running process.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use secretgen_controller::controller::exports::{SecretExports, WarmedSecretExports};
use secretgen_controller::controller::generator::RandomPasswordGenerator;
use secretgen_controller::controller::reconciler::{
    ExportReconciler, PasswordReconciler, PlaceholderReconciler, RequesterReconciler,
    TemplateReconciler,
};
use secretgen_controller::crd::{
    SecretExport, SecretExportSpec, SecretImport, SecretImportSpec, SecretRequest,
};
use secretgen_controller::store::{InMemoryStore, ObjectStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const RESYNC: Duration = Duration::from_secs(30);

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub exports: ExportReconciler<InMemoryStore>,
    pub imports: RequesterReconciler<InMemoryStore, SecretImport>,
    pub requests: RequesterReconciler<InMemoryStore, SecretRequest>,
    pub placeholders: PlaceholderReconciler<InMemoryStore>,
    pub templates: TemplateReconciler<InMemoryStore>,
    pub passwords: PasswordReconciler<InMemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let registry = Arc::new(SecretExports::new());
        let warmed = Arc::new(WarmedSecretExports::new(
            Arc::clone(&registry),
            Arc::clone(&store),
        ));
        Self {
            exports: ExportReconciler::new(Arc::clone(&store), registry),
            imports: RequesterReconciler::new(Arc::clone(&store), Arc::clone(&warmed)),
            requests: RequesterReconciler::new(Arc::clone(&store), Arc::clone(&warmed)),
            placeholders: PlaceholderReconciler::new(Arc::clone(&store), warmed, RESYNC),
            templates: TemplateReconciler::new(Arc::clone(&store), RESYNC),
            passwords: PasswordReconciler::new(
                Arc::clone(&store),
                Arc::new(RandomPasswordGenerator),
            ),
            store,
        }
    }

    pub async fn secret(&self, namespace: &str, name: &str) -> Secret {
        self.store.get(namespace, name).await.unwrap()
    }

    pub fn has_secret(&self, namespace: &str, name: &str) -> bool {
        self.store.contains::<Secret>(namespace, name)
    }
}

pub fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(namespace.to_string()),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

pub fn opaque_secret(namespace: &str, name: &str, data: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: meta(namespace, name),
        type_: Some("Opaque".to_string()),
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    }
}

pub fn export(namespace: &str, name: &str, to_namespaces: &[&str]) -> SecretExport {
    SecretExport {
        metadata: meta(namespace, name),
        spec: SecretExportSpec {
            to_namespace: None,
            to_namespaces: to_namespaces.iter().map(ToString::to_string).collect(),
        },
        status: None,
    }
}

pub fn import(namespace: &str, name: &str, from_namespace: &str) -> SecretImport {
    SecretImport {
        metadata: meta(namespace, name),
        spec: SecretImportSpec {
            from_namespace: from_namespace.to_string(),
        },
        status: None,
    }
}

pub fn data_of(secret: &Secret, key: &str) -> Vec<u8> {
    secret.data.as_ref().unwrap()[key].0.clone()
}
