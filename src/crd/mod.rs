//! # Custom Resource Definitions
//!
//! CRD types for the secretgen controller.
//!
//! - `secretgen.carvel.dev/v1alpha1`: SecretExport, SecretImport,
//!   SecretExportApproval, SecretTemplate
//! - `secretgen.k14s.io/v1alpha1`: SecretRequest, Password

mod export;
mod import;
mod password;
mod status;
mod template;

pub use export::{SecretExport, SecretExportSpec, SecretExportStatus};
pub use import::{
    SecretExportApproval, SecretExportApprovalSpec, SecretImport, SecretImportSpec, SecretRequest,
    SecretRequestSpec,
};
pub use password::{GeneratedSecretTemplate, Password, PasswordSpec};
pub use status::{Condition, ConditionStatus, ConditionType, GenericStatus, HasGenericStatus};
pub use template::{
    InputResource, InputResourceRef, JsonPathTemplate, SecretReference, SecretTemplate,
    SecretTemplateSpec, SecretTemplateStatus, TemplateMetadata,
};

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

/// Every CRD the controller serves, in the order `crdgen` prints them
#[must_use]
pub fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![
        SecretExport::crd(),
        SecretImport::crd(),
        SecretRequest::crd(),
        SecretExportApproval::crd(),
        SecretTemplate::crd(),
        Password::crd(),
    ]
}
