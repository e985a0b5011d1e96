//! # Secret Export Registry
//!
//! In-memory index of which Secrets may be copied into which namespaces.
//!
//! One `RwLock` guards the map. Export/unexport only mutate the map; matching
//! snapshots candidates under the read lock and consults the namespace oracle
//! after releasing it, so no network call happens while the lock is held.

use super::matcher::SecretMatcher;
use super::oracle::NamespaceOracle;
use crate::constants::WILDCARD_NAMESPACE;
use crate::crd::SecretExport;
use crate::observability::metrics;
use crate::store::StoreError;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// An export together with a snapshot of the Secret it offers
#[derive(Debug, Clone)]
pub struct ExportedSecretRecord {
    export: SecretExport,
    secret: Secret,
}

impl ExportedSecretRecord {
    /// Pairs an export with its Secret
    ///
    /// # Panics
    ///
    /// When the export and Secret do not share namespace and name. Callers
    /// always look the Secret up by the export's identity, so a mismatch is an
    /// internal inconsistency.
    #[must_use]
    pub fn new(export: SecretExport, secret: Secret) -> Self {
        assert!(
            export.namespace() == secret.namespace() && export.name_any() == secret.name_any(),
            "Internal inconsistency: export {}/{} paired with secret {}/{}",
            export.namespace().unwrap_or_default(),
            export.name_any(),
            secret.namespace().unwrap_or_default(),
            secret.name_any(),
        );
        Self { export, secret }
    }

    fn key(&self) -> String {
        record_key(&self.export)
    }

    fn secret_type(&self) -> &str {
        self.secret.type_.as_deref().unwrap_or("Opaque")
    }
}

fn record_key(export: &SecretExport) -> String {
    format!(
        "{}/{}",
        export.namespace().unwrap_or_default(),
        export.name_any()
    )
}

enum Reach {
    Explicit,
    Wildcard,
}

struct Candidate {
    reach: Reach,
    source_namespace: String,
    secret: Secret,
}

#[derive(Debug, Default)]
pub struct SecretExports {
    records: RwLock<HashMap<String, ExportedSecretRecord>>,
}

impl SecretExports {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer `secret` as described by `export`, replacing any previous offer
    ///
    /// # Panics
    ///
    /// When `export` and `secret` differ in namespace or name.
    pub fn export(&self, export: &SecretExport, secret: &Secret) {
        let record = ExportedSecretRecord::new(export.clone(), secret.clone());
        let key = record.key();
        let count = {
            let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
            records.insert(key.clone(), record);
            records.len()
        };
        debug!(export = %key, "Exported secret");
        metrics::set_exported_secrets(count);
    }

    /// Withdraw the offer made by `export`
    pub fn unexport(&self, export: &SecretExport) {
        self.unexport_by_name(
            &export.namespace().unwrap_or_default(),
            &export.name_any(),
        );
    }

    /// Withdraw the offer of an export that may no longer exist
    pub fn unexport_by_name(&self, namespace: &str, name: &str) {
        let key = format!("{namespace}/{name}");
        let count = {
            let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
            records.remove(&key);
            records.len()
        };
        debug!(export = %key, "Unexported secret");
        metrics::set_exported_secrets(count);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Secrets that may be copied into `matcher.target_namespace`
    ///
    /// Results are ordered by source `namespace/name`.
    ///
    /// # Errors
    ///
    /// Propagates namespace lookup failures from the oracle.
    pub async fn matched_secrets_for_import<O>(
        &self,
        matcher: &SecretMatcher,
        oracle: &O,
    ) -> Result<Vec<Secret>, StoreError>
    where
        O: NamespaceOracle + ?Sized,
    {
        if matcher.subject.is_some() {
            return Ok(Vec::new());
        }

        let mut candidates = self.candidates(matcher);

        if candidates.iter().any(|c| matches!(c.reach, Reach::Wildcard))
            && oracle
                .is_excluded_from_wildcard(&matcher.target_namespace)
                .await?
        {
            candidates.retain(|c| matches!(c.reach, Reach::Explicit));
        }

        if let Some(required) = &matcher.from_namespace_annotations {
            let mut annotations_by_ns: BTreeMap<String, BTreeMap<String, String>> =
                BTreeMap::new();
            for candidate in &candidates {
                if !annotations_by_ns.contains_key(&candidate.source_namespace) {
                    let annotations = oracle.annotations(&candidate.source_namespace).await?;
                    annotations_by_ns.insert(candidate.source_namespace.clone(), annotations);
                }
            }
            candidates.retain(|c| {
                annotations_by_ns
                    .get(&c.source_namespace)
                    .is_some_and(|actual| required.iter().all(|(k, v)| actual.get(k) == Some(v)))
            });
        }

        Ok(candidates.into_iter().map(|c| c.secret).collect())
    }

    /// Snapshot of records passing the lock-free checks, sorted by key
    fn candidates(&self, matcher: &SecretMatcher) -> Vec<Candidate> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut matched: Vec<(&String, Candidate)> = records
            .iter()
            .filter_map(|(key, record)| {
                let reach = reach_of(record, matcher)?;
                Some((
                    key,
                    Candidate {
                        reach,
                        source_namespace: record.export.namespace().unwrap_or_default(),
                        secret: record.secret.clone(),
                    },
                ))
            })
            .collect();
        matched.sort_by(|a, b| a.0.cmp(b.0));
        matched.into_iter().map(|(_, c)| c).collect()
    }
}

fn reach_of(record: &ExportedSecretRecord, matcher: &SecretMatcher) -> Option<Reach> {
    if matcher
        .secret_type
        .as_deref()
        .is_some_and(|t| t != record.secret_type())
    {
        return None;
    }
    if matcher
        .from_name
        .as_deref()
        .is_some_and(|name| name != record.export.name_any())
    {
        return None;
    }
    if matcher
        .from_namespace
        .as_deref()
        .is_some_and(|ns| Some(ns) != record.export.metadata.namespace.as_deref())
    {
        return None;
    }

    let to_namespaces = record.export.static_to_namespaces();
    if to_namespaces.iter().any(|ns| *ns == matcher.target_namespace) {
        Some(Reach::Explicit)
    } else if to_namespaces.iter().any(|ns| ns == WILDCARD_NAMESPACE) {
        Some(Reach::Wildcard)
    } else {
        None
    }
}
