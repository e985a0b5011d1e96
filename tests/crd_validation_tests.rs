//! # CRD Validation Tests
//!
//! Sample manifests deserialize into the CRD types, and the generated CRDs
//! carry the expected groups and names.

use kube::core::CustomResourceExt;
use secretgen_controller::crd::{
    all_crds, Password, SecretExport, SecretImport, SecretRequest, SecretTemplate,
};

#[test]
fn test_secret_export_with_both_target_fields() {
    let yaml = r#"
apiVersion: secretgen.carvel.dev/v1alpha1
kind: SecretExport
metadata:
  name: registry
  namespace: ns1
spec:
  toNamespace: ns2
  toNamespaces:
  - ns3
  - "*"
"#;
    let export: SecretExport = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(export.static_to_namespaces(), vec!["ns2", "ns3", "*"]);
}

#[test]
fn test_secret_import_and_request_share_shape() {
    let import: SecretImport = serde_yaml::from_str(
        r#"
apiVersion: secretgen.carvel.dev/v1alpha1
kind: SecretImport
metadata:
  name: registry
  namespace: ns2
spec:
  fromNamespace: ns1
"#,
    )
    .unwrap();
    assert_eq!(import.spec.from_namespace, "ns1");

    let request: SecretRequest = serde_yaml::from_str(
        r#"
apiVersion: secretgen.k14s.io/v1alpha1
kind: SecretRequest
metadata:
  name: registry
  namespace: ns2
spec:
  fromNamespace: ns1
"#,
    )
    .unwrap();
    assert_eq!(request.spec.from_namespace, "ns1");
}

#[test]
fn test_secret_template_full_manifest() {
    let yaml = r#"
apiVersion: secretgen.carvel.dev/v1alpha1
kind: SecretTemplate
metadata:
  name: db-url
  namespace: app
spec:
  serviceAccountName: reader
  inputResources:
  - name: cfg
    ref:
      apiVersion: v1
      kind: ConfigMap
      name: settings
  template:
    metadata:
      labels:
        source: $(.cfg.metadata.name)
    type: Opaque
    data:
      password: $(.creds.data.password)
    stringData:
      url: postgres://$(.cfg.data.host)
"#;
    let template: SecretTemplate = serde_yaml::from_str(yaml).unwrap();
    let spec = template.spec;
    assert_eq!(spec.service_account_name.as_deref(), Some("reader"));
    assert_eq!(spec.input_resources[0].r#ref.kind, "ConfigMap");
    let body = spec.json_path_template.unwrap();
    assert_eq!(body.r#type.as_deref(), Some("Opaque"));
    assert_eq!(body.string_data["url"], "postgres://$(.cfg.data.host)");
    assert_eq!(body.metadata.unwrap().labels["source"], "$(.cfg.metadata.name)");
}

#[test]
fn test_password_defaults() {
    let password: Password = serde_yaml::from_str(
        r#"
apiVersion: secretgen.k14s.io/v1alpha1
kind: Password
metadata:
  name: db
  namespace: app
spec: {}
"#,
    )
    .unwrap();
    assert!(password.spec.length.is_none());
    assert!(password.spec.secret_template.is_none());
}

#[test]
fn test_generated_crds_cover_every_kind() {
    let names: Vec<String> = all_crds()
        .into_iter()
        .map(|crd| crd.metadata.name.unwrap_or_default())
        .collect();
    assert_eq!(
        names,
        vec![
            "secretexports.secretgen.carvel.dev",
            "secretimports.secretgen.carvel.dev",
            "secretrequests.secretgen.k14s.io",
            "secretexportapprovals.secretgen.carvel.dev",
            "secrettemplates.secretgen.carvel.dev",
            "passwords.secretgen.k14s.io",
        ]
    );
    assert!(SecretTemplate::crd().spec.versions[0].subresources.is_some());
}
