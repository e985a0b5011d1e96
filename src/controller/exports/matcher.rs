//! Query describing which exported Secrets a requester may receive.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretMatcher {
    /// Namespace the copy would land in
    pub target_namespace: String,
    /// Only Secrets of this type
    pub secret_type: Option<String>,
    /// Reserved; a matcher with a subject never matches
    pub subject: Option<String>,
    /// Only the export with this name
    pub from_name: Option<String>,
    /// Only exports in this namespace
    pub from_namespace: Option<String>,
    /// Only exports whose namespace carries all of these annotations
    pub from_namespace_annotations: Option<BTreeMap<String, String>>,
}

impl SecretMatcher {
    /// Matcher for the export named `name` in `from_namespace` offered to `target_namespace`
    #[must_use]
    pub fn for_requester(from_namespace: &str, name: &str, target_namespace: &str) -> Self {
        Self {
            target_namespace: target_namespace.to_string(),
            from_name: Some(name.to_string()),
            from_namespace: Some(from_namespace.to_string()),
            ..Self::default()
        }
    }
}
