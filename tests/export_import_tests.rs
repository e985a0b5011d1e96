//! # Export / Import Scenarios
//!
//! A Secret in `ns1` is exported and requested from other namespaces.

mod common;

use common::{data_of, export, import, meta, opaque_secret, Harness};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use secretgen_controller::constants::EXCLUDED_FROM_WILDCARD_ANNOTATION;
use secretgen_controller::controller::reconciler::{ReconcileOutcome, EXPORT_NOT_OFFERED};
use secretgen_controller::crd::{
    ConditionType, SecretExport, SecretImport, SecretRequest, SecretRequestSpec,
};
use secretgen_controller::store::ObjectStore;

async fn offered(h: &Harness, to_namespaces: &[&str]) {
    h.store
        .create(&opaque_secret("ns1", "creds", &[("password", "pw")]))
        .await
        .unwrap();
    h.store
        .create(&export("ns1", "creds", to_namespaces))
        .await
        .unwrap();
    h.exports.reconcile("ns1", "creds").await.unwrap();
}

#[tokio::test]
async fn test_import_copies_only_into_offered_namespace() {
    let h = Harness::new();
    offered(&h, &["ns2"]).await;
    h.store.create(&import("ns2", "creds", "ns1")).await.unwrap();
    h.store.create(&import("ns3", "creds", "ns1")).await.unwrap();

    let outcome = h.imports.reconcile("ns2", "creds").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Done);
    assert_eq!(data_of(&h.secret("ns2", "creds").await, "password"), b"pw");

    let err = h.imports.reconcile("ns3", "creds").await.unwrap_err();
    assert_eq!(err.to_string(), EXPORT_NOT_OFFERED);
    assert!(!h.has_secret("ns3", "creds"));

    let denied: SecretImport = h.store.get("ns3", "creds").await.unwrap();
    let status = denied.status.unwrap();
    assert!(status.has_condition(ConditionType::ReconcileFailed));
    assert_eq!(
        status.friendly_description,
        "Reconcile failed: export was not offered/allowed"
    );

    let export: SecretExport = h.store.get("ns1", "creds").await.unwrap();
    let status = export.status.unwrap();
    assert!(status.generic.has_condition(ConditionType::ReconcileSucceeded));
    assert!(status.observed_secret_resource_version.is_some());
}

#[tokio::test]
async fn test_every_listed_namespace_converges_to_source_content() {
    let h = Harness::new();
    let mut source = opaque_secret("ns1", "creds", &[("key1", "val1")]);
    source.type_ = Some("example.com/credentials".to_string());
    h.store.create(&source).await.unwrap();
    h.store
        .create(&export("ns1", "creds", &["ns2", "ns3"]))
        .await
        .unwrap();
    h.exports.reconcile("ns1", "creds").await.unwrap();

    for namespace in ["ns2", "ns3"] {
        h.store
            .create(&import(namespace, "creds", "ns1"))
            .await
            .unwrap();
        h.imports.reconcile(namespace, "creds").await.unwrap();

        let copy = h.secret(namespace, "creds").await;
        assert_eq!(copy.type_, source.type_, "{namespace}");
        assert_eq!(copy.data, source.data, "{namespace}");
    }
}

#[tokio::test]
async fn test_import_before_export_reconcile_uses_warm_up() {
    let h = Harness::new();
    h.store
        .create(&opaque_secret("ns1", "creds", &[("password", "pw")]))
        .await
        .unwrap();
    h.store
        .create(&export("ns1", "creds", &["ns2"]))
        .await
        .unwrap();
    h.store.create(&import("ns2", "creds", "ns1")).await.unwrap();

    h.imports.reconcile("ns2", "creds").await.unwrap();
    assert!(h.has_secret("ns2", "creds"));
}

#[tokio::test]
async fn test_export_deletion_removes_copy() {
    let h = Harness::new();
    offered(&h, &["ns2"]).await;
    h.store.create(&import("ns2", "creds", "ns1")).await.unwrap();
    h.imports.reconcile("ns2", "creds").await.unwrap();
    assert!(h.has_secret("ns2", "creds"));

    h.store.delete::<SecretExport>("ns1", "creds").await.unwrap();
    let outcome = h.exports.reconcile("ns1", "creds").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Done);

    let err = h.imports.reconcile("ns2", "creds").await.unwrap_err();
    assert!(err.is_terminal());
    assert!(!h.has_secret("ns2", "creds"));
}

#[tokio::test]
async fn test_import_reconciled_before_unexport_removes_copy() {
    let h = Harness::new();
    offered(&h, &["ns2"]).await;
    h.store.create(&import("ns2", "creds", "ns1")).await.unwrap();
    h.imports.reconcile("ns2", "creds").await.unwrap();

    // The import controller sees the export deletion first
    h.store.delete::<SecretExport>("ns1", "creds").await.unwrap();
    let err = h.imports.reconcile("ns2", "creds").await.unwrap_err();
    assert_eq!(err.to_string(), EXPORT_NOT_OFFERED);
    assert!(!h.has_secret("ns2", "creds"));

    let outcome = h.exports.reconcile("ns1", "creds").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Done);
    assert!(!h.has_secret("ns2", "creds"));
}

#[tokio::test]
async fn test_narrowed_export_removes_dropped_copy() {
    let h = Harness::new();
    offered(&h, &["ns2"]).await;
    h.store.create(&import("ns2", "creds", "ns1")).await.unwrap();
    h.imports.reconcile("ns2", "creds").await.unwrap();

    let mut narrowed: SecretExport = h.store.get("ns1", "creds").await.unwrap();
    narrowed.spec.to_namespaces = vec!["ns3".to_string()];
    h.store.update(&narrowed).await.unwrap();

    // Either order of the two controllers ends without the ns2 copy
    h.imports.reconcile("ns2", "creds").await.unwrap_err();
    assert!(!h.has_secret("ns2", "creds"));
    h.exports.reconcile("ns1", "creds").await.unwrap();
    h.imports.reconcile("ns2", "creds").await.unwrap_err();
    assert!(!h.has_secret("ns2", "creds"));
}

#[tokio::test]
async fn test_source_update_reaches_copy() {
    let h = Harness::new();
    offered(&h, &["ns2"]).await;
    h.store.create(&import("ns2", "creds", "ns1")).await.unwrap();
    h.imports.reconcile("ns2", "creds").await.unwrap();

    let mut source = h.secret("ns1", "creds").await;
    source
        .data
        .get_or_insert_with(Default::default)
        .insert("password".to_string(), k8s_openapi::ByteString(b"rotated".to_vec()));
    h.store.update(&source).await.unwrap();

    h.exports.reconcile("ns1", "creds").await.unwrap();
    h.imports.reconcile("ns2", "creds").await.unwrap();
    assert_eq!(data_of(&h.secret("ns2", "creds").await, "password"), b"rotated");
}

#[tokio::test]
async fn test_repeated_reconciles_do_not_write() {
    let h = Harness::new();
    offered(&h, &["ns2"]).await;
    h.store.create(&import("ns2", "creds", "ns1")).await.unwrap();
    h.imports.reconcile("ns2", "creds").await.unwrap();
    let copy = h.secret("ns2", "creds").await;
    let writes = h.store.writes();

    h.exports.reconcile("ns1", "creds").await.unwrap();
    h.imports.reconcile("ns2", "creds").await.unwrap();

    assert_eq!(h.store.writes(), writes);
    assert_eq!(h.secret("ns2", "creds").await.resource_version(), copy.resource_version());
}

#[tokio::test]
async fn test_wildcard_export_skips_excluded_namespace() {
    let h = Harness::new();
    h.store.insert_namespace("ns2", &[]);
    h.store
        .insert_namespace("ns3", &[(EXCLUDED_FROM_WILDCARD_ANNOTATION, "")]);
    offered(&h, &["*"]).await;
    h.store.create(&import("ns2", "creds", "ns1")).await.unwrap();
    h.store.create(&import("ns3", "creds", "ns1")).await.unwrap();

    h.imports.reconcile("ns2", "creds").await.unwrap();
    assert!(h.has_secret("ns2", "creds"));

    let err = h.imports.reconcile("ns3", "creds").await.unwrap_err();
    assert_eq!(err.to_string(), EXPORT_NOT_OFFERED);
    assert!(!h.has_secret("ns3", "creds"));
}

#[tokio::test]
async fn test_wildcard_excluded_namespace_allowed_when_listed() {
    let h = Harness::new();
    h.store
        .insert_namespace("ns3", &[(EXCLUDED_FROM_WILDCARD_ANNOTATION, "")]);
    offered(&h, &["*", "ns3"]).await;
    h.store.create(&import("ns3", "creds", "ns1")).await.unwrap();

    h.imports.reconcile("ns3", "creds").await.unwrap();
    assert!(h.has_secret("ns3", "creds"));
}

#[tokio::test]
async fn test_deleting_import_cascades_to_copy() {
    let h = Harness::new();
    offered(&h, &["ns2"]).await;
    h.store.create(&import("ns2", "creds", "ns1")).await.unwrap();
    h.imports.reconcile("ns2", "creds").await.unwrap();

    h.store.delete::<SecretImport>("ns2", "creds").await.unwrap();
    assert!(!h.has_secret("ns2", "creds"));
    let outcome = h.imports.reconcile("ns2", "creds").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Done);
}

#[tokio::test]
async fn test_secret_request_copies_like_import() {
    let h = Harness::new();
    offered(&h, &["ns2"]).await;
    h.store
        .create(&SecretRequest {
            metadata: meta("ns2", "creds"),
            spec: SecretRequestSpec {
                from_namespace: "ns1".to_string(),
            },
            status: None,
        })
        .await
        .unwrap();

    h.requests.reconcile("ns2", "creds").await.unwrap();
    let copy: Secret = h.secret("ns2", "creds").await;
    assert_eq!(copy.owner_references()[0].kind, "SecretRequest");
}
