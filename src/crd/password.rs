//! # Password
//!
//! Generates a random password into a Secret of the same name.

use super::status::GenericStatus;
use super::template::TemplateMetadata;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Password Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: secretgen.k14s.io/v1alpha1
/// kind: Password
/// metadata:
///   name: db-password
/// spec:
///   length: 32
///   secretTemplate:
///     type: Opaque
///     stringData:
///       pass: $(value)
/// ```
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "secretgen.k14s.io",
    version = "v1alpha1",
    kind = "Password",
    namespaced,
    status = "GenericStatus",
    printcolumn = r#"{"name":"Description", "type":"string", "jsonPath":".status.friendlyDescription"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PasswordSpec {
    /// Total length (defaults to 40)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    /// Minimum number of digits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uppercase_letters: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowercase_letters: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<u32>,
    /// Custom shape of the produced Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_template: Option<GeneratedSecretTemplate>,
}

/// Shape of a Secret produced by a generator
///
/// `stringData` values are `$(name)` references into the generated values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSecretTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string_data: BTreeMap<String, String>,
}
