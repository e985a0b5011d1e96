//! # SecretExport
//!
//! Offers the Secret of the same namespace/name to other namespaces.

use super::status::{GenericStatus, HasGenericStatus};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// SecretExport Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: secretgen.carvel.dev/v1alpha1
/// kind: SecretExport
/// metadata:
///   name: registry-creds
///   namespace: ns1
/// spec:
///   toNamespaces: [ns2, ns3]
/// ```
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "secretgen.carvel.dev",
    version = "v1alpha1",
    kind = "SecretExport",
    namespaced,
    status = "SecretExportStatus",
    printcolumn = r#"{"name":"Description", "type":"string", "jsonPath":".status.friendlyDescription"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecretExportSpec {
    /// Single target namespace (`*` for all)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_namespace: Option<String>,
    /// Target namespaces (`*` for all)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_namespaces: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretExportStatus {
    #[serde(flatten)]
    pub generic: GenericStatus,
    /// resourceVersion of the Secret that was last exported
    ///
    /// Serialized as `null` when unset so a status merge patch clears it.
    #[serde(default)]
    pub observed_secret_resource_version: Option<String>,
}

impl HasGenericStatus for SecretExportStatus {
    fn generic(&self) -> &GenericStatus {
        &self.generic
    }

    fn generic_mut(&mut self) -> &mut GenericStatus {
        &mut self.generic
    }
}

impl SecretExportSpec {
    /// Union of `toNamespace` and `toNamespaces`, empty entries dropped, first occurrence kept
    #[must_use]
    pub fn static_to_namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = Vec::new();
        for ns in self.to_namespace.iter().chain(self.to_namespaces.iter()) {
            if !ns.is_empty() && !namespaces.contains(ns) {
                namespaces.push(ns.clone());
            }
        }
        namespaces
    }
}

impl SecretExport {
    #[must_use]
    pub fn static_to_namespaces(&self) -> Vec<String> {
        self.spec.static_to_namespaces()
    }
}
