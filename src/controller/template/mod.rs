//! # SecretTemplate Resolution
//!
//! Fetches a SecretTemplate's input resources in order and renders its
//! JSONPath template into Secret content.
//!
//! Errors name the template section that failed so a templating mistake can
//! be traced back to the offending key.

mod resolver;

use crate::controller::jsonpath::JsonPathError;
use crate::store::StoreError;
use thiserror::Error;

pub use resolver::{render, resolve_inputs, RenderedSecret};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("reading inputs as service account '{service_account}': {source}")]
    ServiceAccount {
        service_account: String,
        #[source]
        source: StoreError,
    },
    #[error("resolving name of input resource '{alias}': {source}")]
    InputName {
        alias: String,
        #[source]
        source: JsonPathError,
    },
    #[error("fetching input resource '{alias}' ({kind} '{name}'): {source}")]
    Fetch {
        alias: String,
        kind: String,
        name: String,
        #[source]
        source: StoreError,
    },
    #[error("templating data key '{key}': {source}")]
    Data {
        key: String,
        #[source]
        source: JsonPathError,
    },
    #[error("templating stringData key '{key}': {source}")]
    StringData {
        key: String,
        #[source]
        source: JsonPathError,
    },
    #[error("templating metadata {field} '{key}': {source}")]
    Metadata {
        field: &'static str,
        key: String,
        #[source]
        source: JsonPathError,
    },
    #[error("decoding base64 of data key '{key}': {source}")]
    Base64 {
        key: String,
        #[source]
        source: base64::DecodeError,
    },
}

impl TemplateError {
    /// Evaluation errors need a spec or input change; flaky fetches do not
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::ServiceAccount { source, .. } | Self::Fetch { source, .. } => {
                source.is_not_found() || matches!(source, StoreError::Forbidden(_))
            }
            Self::InputName { .. }
            | Self::Data { .. }
            | Self::StringData { .. }
            | Self::Metadata { .. }
            | Self::Base64 { .. } => true,
        }
    }
}
