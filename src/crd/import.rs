//! # Requester Resources
//!
//! Resources placed in a target namespace that ask for a copy of an exported
//! Secret of the same name. They differ only in API group and kind.

use super::status::GenericStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// SecretImport Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: secretgen.carvel.dev/v1alpha1
/// kind: SecretImport
/// metadata:
///   name: registry-creds
///   namespace: ns2
/// spec:
///   fromNamespace: ns1
/// ```
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "secretgen.carvel.dev",
    version = "v1alpha1",
    kind = "SecretImport",
    namespaced,
    status = "GenericStatus",
    printcolumn = r#"{"name":"Description", "type":"string", "jsonPath":".status.friendlyDescription"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecretImportSpec {
    /// Namespace of the SecretExport to import from
    #[serde(default)]
    pub from_namespace: String,
}

/// SecretRequest Custom Resource Definition (legacy API group)
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "secretgen.k14s.io",
    version = "v1alpha1",
    kind = "SecretRequest",
    namespaced,
    status = "GenericStatus",
    printcolumn = r#"{"name":"Description", "type":"string", "jsonPath":".status.friendlyDescription"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecretRequestSpec {
    #[serde(default)]
    pub from_namespace: String,
}

/// SecretExportApproval Custom Resource Definition
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "secretgen.carvel.dev",
    version = "v1alpha1",
    kind = "SecretExportApproval",
    namespaced,
    status = "GenericStatus",
    printcolumn = r#"{"name":"Description", "type":"string", "jsonPath":".status.friendlyDescription"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecretExportApprovalSpec {
    #[serde(default)]
    pub from_namespace: String,
}
