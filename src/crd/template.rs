//! # SecretTemplate
//!
//! Composes a new Secret from fields of other resources.
//!
//! Input resources are fetched in declaration order and exposed to the
//! template expressions under their alias.

use super::status::{GenericStatus, HasGenericStatus};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// SecretTemplate Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: secretgen.carvel.dev/v1alpha1
/// kind: SecretTemplate
/// metadata:
///   name: db-credentials
///   namespace: app
/// spec:
///   inputResources:
///   - name: binding
///     ref:
///       apiVersion: v1
///       kind: ConfigMap
///       name: db-binding
///   - name: creds
///     ref:
///       apiVersion: v1
///       kind: Secret
///       name: $(.binding.data.secretName)
///   template:
///     stringData:
///       host: $(.binding.data.host)
///     data:
///       password: $(.creds.data.password)
/// ```
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "secretgen.carvel.dev",
    version = "v1alpha1",
    kind = "SecretTemplate",
    namespaced,
    status = "SecretTemplateStatus",
    printcolumn = r#"{"name":"Description", "type":"string", "jsonPath":".status.friendlyDescription"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecretTemplateSpec {
    /// Resources resolved in order; later refs may use earlier aliases
    #[serde(default)]
    pub input_resources: Vec<InputResource>,
    /// Shape of the produced Secret
    #[serde(default, rename = "template", alias = "jsonPathTemplate")]
    pub json_path_template: Option<JsonPathTemplate>,
    /// Service account used to read input resources instead of the controller's own identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InputResource {
    /// Alias the fetched resource is exposed under
    pub name: String,
    pub r#ref: InputResourceRef,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InputResourceRef {
    pub api_version: String,
    pub kind: String,
    /// Literal name or `$(...)` expression over earlier aliases
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JsonPathTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    /// Expressions evaluating to base64 text
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    /// Expressions evaluating to plain text
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string_data: BTreeMap<String, String>,
}

/// Labels and annotations added to a produced Secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct TemplateMetadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretTemplateStatus {
    #[serde(flatten)]
    pub generic: GenericStatus,
    /// `null` when unset, clearing it under a merge patch
    #[serde(default)]
    pub secret: Option<SecretReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct SecretReference {
    pub name: String,
}

impl HasGenericStatus for SecretTemplateStatus {
    fn generic(&self) -> &GenericStatus {
        &self.generic
    }

    fn generic_mut(&mut self) -> &mut GenericStatus {
        &mut self.generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_accepts_both_field_names() {
        let spec: SecretTemplateSpec = serde_json::from_value(serde_json::json!({
            "inputResources": [{
                "name": "a",
                "ref": {"apiVersion": "v1", "kind": "Secret", "name": "x"}
            }],
            "jsonPathTemplate": {"stringData": {"k": "$(.a.data.k)"}}
        }))
        .unwrap();
        assert_eq!(spec.input_resources[0].r#ref.kind, "Secret");
        assert_eq!(
            spec.json_path_template.unwrap().string_data.get("k").map(String::as_str),
            Some("$(.a.data.k)")
        );

        let spec: SecretTemplateSpec =
            serde_json::from_value(serde_json::json!({"template": {"type": "Opaque"}})).unwrap();
        assert_eq!(
            spec.json_path_template.and_then(|t| t.r#type).as_deref(),
            Some("Opaque")
        );
    }
}
