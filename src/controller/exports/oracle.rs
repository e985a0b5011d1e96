//! # Namespace Oracle
//!
//! Namespace annotation lookups consulted by the registry outside its lock.

use crate::constants::EXCLUDED_FROM_WILDCARD_ANNOTATION;
use crate::store::{ObjectStore, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;

#[async_trait]
pub trait NamespaceOracle: Send + Sync {
    /// Annotations of `namespace`; a missing namespace has none
    async fn annotations(&self, namespace: &str) -> Result<BTreeMap<String, String>, StoreError>;

    /// Whether `namespace` opted out of wildcard exports
    async fn is_excluded_from_wildcard(&self, namespace: &str) -> Result<bool, StoreError> {
        Ok(self
            .annotations(namespace)
            .await?
            .contains_key(EXCLUDED_FROM_WILDCARD_ANNOTATION))
    }
}

/// Oracle reading Namespace objects through an `ObjectStore`
#[derive(Debug)]
pub struct StoreNamespaceOracle<'a, S> {
    store: &'a S,
}

impl<'a, S: ObjectStore> StoreNamespaceOracle<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: ObjectStore> NamespaceOracle for StoreNamespaceOracle<'_, S> {
    async fn annotations(&self, namespace: &str) -> Result<BTreeMap<String, String>, StoreError> {
        match self.store.get_namespace(namespace).await {
            Ok(ns) => Ok(ns.metadata.annotations.unwrap_or_default()),
            Err(e) if e.is_not_found() => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }
}
