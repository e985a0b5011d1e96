//! # SecretTemplate Scenarios

mod common;

use common::{data_of, meta, opaque_secret, Harness, RESYNC};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::ResourceExt;
use secretgen_controller::controller::reconciler::ReconcileOutcome;
use secretgen_controller::crd::{
    InputResource, InputResourceRef, JsonPathTemplate, SecretTemplate, SecretTemplateSpec,
    TemplateMetadata,
};
use secretgen_controller::store::ObjectStore;
use std::collections::BTreeMap;

fn input(alias: &str, kind: &str, name: &str) -> InputResource {
    InputResource {
        name: alias.to_string(),
        r#ref: InputResourceRef {
            api_version: "v1".to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        },
    }
}

/// Reads a ConfigMap, then the Secret the ConfigMap names
fn chained_template() -> SecretTemplate {
    SecretTemplate {
        metadata: meta("app", "db-url"),
        spec: SecretTemplateSpec {
            input_resources: vec![
                input("cfg", "ConfigMap", "settings"),
                input("creds", "Secret", "$(.cfg.data.secretName)"),
            ],
            json_path_template: Some(JsonPathTemplate {
                metadata: Some(TemplateMetadata {
                    labels: BTreeMap::from([(
                        "source".to_string(),
                        "$(.cfg.metadata.name)".to_string(),
                    )]),
                    annotations: BTreeMap::new(),
                }),
                r#type: Some("Opaque".to_string()),
                data: BTreeMap::from([(
                    "password".to_string(),
                    "$(.creds.data.password)".to_string(),
                )]),
                string_data: BTreeMap::from([(
                    "url".to_string(),
                    "postgres://$(.cfg.data.host):5432".to_string(),
                )]),
            }),
            service_account_name: None,
        },
        status: None,
    }
}

fn settings(host: &str) -> ConfigMap {
    ConfigMap {
        metadata: meta("app", "settings"),
        data: Some(BTreeMap::from([
            ("host".to_string(), host.to_string()),
            ("secretName".to_string(), "db-creds".to_string()),
        ])),
        ..Default::default()
    }
}

async fn seeded() -> Harness {
    let h = Harness::new();
    h.store.create(&settings("db.internal")).await.unwrap();
    h.store
        .create(&opaque_secret("app", "db-creds", &[("password", "s3cret")]))
        .await
        .unwrap();
    h.store.create(&chained_template()).await.unwrap();
    h
}

#[tokio::test]
async fn test_chained_inputs_render_secret() {
    let h = seeded().await;

    let outcome = h.templates.reconcile("app", "db-url").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::RequeueAfter(RESYNC));

    let secret: Secret = h.secret("app", "db-url").await;
    assert_eq!(data_of(&secret, "password"), b"s3cret");
    assert_eq!(data_of(&secret, "url"), b"postgres://db.internal:5432");
    assert_eq!(secret.labels()["source"], "settings");
    assert_eq!(secret.owner_references()[0].kind, "SecretTemplate");
}

#[tokio::test]
async fn test_input_change_is_picked_up_on_resync() {
    let h = seeded().await;
    h.templates.reconcile("app", "db-url").await.unwrap();

    let mut cfg: ConfigMap = h.store.get("app", "settings").await.unwrap();
    cfg.data
        .get_or_insert_with(BTreeMap::new)
        .insert("host".to_string(), "db.replica".to_string());
    h.store.update(&cfg).await.unwrap();

    h.templates.reconcile("app", "db-url").await.unwrap();
    assert_eq!(
        data_of(&h.secret("app", "db-url").await, "url"),
        b"postgres://db.replica:5432"
    );
}

#[tokio::test]
async fn test_unchanged_inputs_do_not_write() {
    let h = seeded().await;
    h.templates.reconcile("app", "db-url").await.unwrap();
    let writes = h.store.writes();

    h.templates.reconcile("app", "db-url").await.unwrap();
    assert_eq!(h.store.writes(), writes);
}

#[tokio::test]
async fn test_missing_input_fails_without_partial_secret() {
    let h = Harness::new();
    h.store.create(&settings("db.internal")).await.unwrap();
    h.store.create(&chained_template()).await.unwrap();

    let outcome = h.templates.reconcile("app", "db-url").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::RequeueAfter(RESYNC));
    assert!(!h.has_secret("app", "db-url"));

    let stored: SecretTemplate = h.store.get("app", "db-url").await.unwrap();
    let description = stored.status.unwrap().generic.friendly_description;
    assert!(
        description.starts_with("Reconcile failed: fetching input resource 'creds'"),
        "{description}"
    );
}
