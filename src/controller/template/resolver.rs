use super::TemplateError;
use crate::controller::jsonpath::{self, JsonPathError};
use crate::crd::{InputResource, JsonPathTemplate};
use crate::store::ResourceFetcher;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s_openapi::ByteString;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Secret content produced by a template
#[derive(Clone, Default, PartialEq)]
pub struct RenderedSecret {
    pub r#type: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub data: BTreeMap<String, ByteString>,
}

impl std::fmt::Debug for RenderedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedSecret")
            .field("type", &self.r#type)
            .field("labels", &self.labels)
            .field("annotations", &self.annotations)
            .field("data", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Fetch `inputs` in order, each visible to the names of the ones after it
///
/// Returns an object mapping every alias to the fetched resource.
///
/// # Errors
///
/// The first name evaluation or fetch failure.
pub async fn resolve_inputs(
    fetcher: &dyn ResourceFetcher,
    namespace: &str,
    inputs: &[InputResource],
) -> Result<Value, TemplateError> {
    let mut resolved = Value::Object(Map::new());

    for input in inputs {
        let name = jsonpath::evaluate(&input.r#ref.name, &resolved).map_err(|source| {
            TemplateError::InputName {
                alias: input.name.clone(),
                source,
            }
        })?;

        let resource = fetcher
            .fetch(&input.r#ref.api_version, &input.r#ref.kind, namespace, &name)
            .await
            .map_err(|source| TemplateError::Fetch {
                alias: input.name.clone(),
                kind: input.r#ref.kind.clone(),
                name: name.clone(),
                source,
            })?;

        debug!(
            alias = %input.name,
            kind = %input.r#ref.kind,
            name = %name,
            "resolved input resource"
        );
        if let Some(map) = resolved.as_object_mut() {
            map.insert(input.name.clone(), resource);
        }
    }

    Ok(resolved)
}

/// Evaluate every template expression against the resolved inputs
///
/// `data` results are base64 text and are decoded; `stringData` results are
/// stored as-is and win over `data` on a shared key. Nothing is returned
/// unless every expression succeeds.
///
/// # Errors
///
/// The first failing expression, tagged with its section.
pub fn render(
    template: &JsonPathTemplate,
    inputs: &Value,
) -> Result<RenderedSecret, TemplateError> {
    let mut rendered = RenderedSecret {
        r#type: template.r#type.clone(),
        ..RenderedSecret::default()
    };

    if let Some(metadata) = &template.metadata {
        rendered.labels = render_map(&metadata.labels, inputs, |key, source| {
            TemplateError::Metadata {
                field: "label",
                key,
                source,
            }
        })?;
        rendered.annotations = render_map(&metadata.annotations, inputs, |key, source| {
            TemplateError::Metadata {
                field: "annotation",
                key,
                source,
            }
        })?;
    }

    for (key, expression) in &template.data {
        let encoded = jsonpath::evaluate(expression, inputs).map_err(|source| TemplateError::Data {
            key: key.clone(),
            source,
        })?;
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|source| TemplateError::Base64 {
                key: key.clone(),
                source,
            })?;
        rendered.data.insert(key.clone(), ByteString(decoded));
    }

    for (key, expression) in &template.string_data {
        let value = jsonpath::evaluate(expression, inputs).map_err(|source| {
            TemplateError::StringData {
                key: key.clone(),
                source,
            }
        })?;
        rendered.data.insert(key.clone(), ByteString(value.into_bytes()));
    }

    Ok(rendered)
}

fn render_map(
    expressions: &BTreeMap<String, String>,
    inputs: &Value,
    tag: impl Fn(String, JsonPathError) -> TemplateError,
) -> Result<BTreeMap<String, String>, TemplateError> {
    expressions
        .iter()
        .map(|(key, expression)| {
            jsonpath::evaluate(expression, inputs)
                .map(|value| (key.clone(), value))
                .map_err(|source| tag(key.clone(), source))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{InputResourceRef, TemplateMetadata};
    use crate::store::{InMemoryStore, ObjectStore};
    use k8s_openapi::api::core::v1::{ConfigMap, Secret};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;

    fn input(alias: &str, api_version: &str, kind: &str, name: &str) -> InputResource {
        InputResource {
            name: alias.to_string(),
            r#ref: InputResourceRef {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
                name: name.to_string(),
            },
        }
    }

    fn meta(name: &str) -> ObjectMeta {
        ObjectMeta {
            namespace: Some("app".to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .create(&ConfigMap {
                metadata: meta("binding"),
                data: Some(BTreeMap::from([
                    ("secretName".to_string(), "db-creds".to_string()),
                    ("host".to_string(), "db.local".to_string()),
                ])),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .create(&Secret {
                metadata: meta("db-creds"),
                data: Some(BTreeMap::from([(
                    "password".to_string(),
                    ByteString(b"s3cret".to_vec()),
                )])),
                ..Default::default()
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_later_input_name_uses_earlier_alias() {
        let store = seeded_store().await;
        let fetcher = store.resource_fetcher("app", None).await.unwrap();
        let inputs = resolve_inputs(
            fetcher.as_ref(),
            "app",
            &[
                input("binding", "v1", "ConfigMap", "binding"),
                input("creds", "v1", "Secret", "$(.binding.data.secretName)"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(inputs["creds"]["metadata"]["name"], "db-creds");
    }

    #[tokio::test]
    async fn test_missing_input_is_fetch_error() {
        let store = seeded_store().await;
        let fetcher = store.resource_fetcher("app", None).await.unwrap();
        let err = resolve_inputs(fetcher.as_ref(), "app", &[input("x", "v1", "Secret", "nope")])
            .await
            .unwrap_err();
        assert!(matches!(err, TemplateError::Fetch { ref alias, .. } if alias == "x"));
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn test_unresolvable_name_expression() {
        let store = seeded_store().await;
        let fetcher = store.resource_fetcher("app", None).await.unwrap();
        let err = resolve_inputs(
            fetcher.as_ref(),
            "app",
            &[input("creds", "v1", "Secret", "$(.binding.data.secretName)")],
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "resolving name of input resource 'creds': binding is not found"
        );
    }

    #[test]
    fn test_render_sections() {
        let inputs = json!({
            "binding": {"data": {"host": "db.local"}},
            "creds": {"data": {"password": "czNjcmV0"}}
        });
        let template = JsonPathTemplate {
            metadata: Some(TemplateMetadata {
                labels: BTreeMap::from([("host".to_string(), "$(.binding.data.host)".to_string())]),
                annotations: BTreeMap::new(),
            }),
            r#type: Some("Opaque".to_string()),
            data: BTreeMap::from([("password".to_string(), "$(.creds.data.password)".to_string())]),
            string_data: BTreeMap::from([(
                "url".to_string(),
                "postgres://$(.binding.data.host):5432".to_string(),
            )]),
        };

        let rendered = render(&template, &inputs).unwrap();
        assert_eq!(rendered.r#type.as_deref(), Some("Opaque"));
        assert_eq!(rendered.labels.get("host").map(String::as_str), Some("db.local"));
        assert_eq!(rendered.data["password"].0, b"s3cret");
        assert_eq!(rendered.data["url"].0, b"postgres://db.local:5432");
    }

    #[test]
    fn test_render_errors_name_section() {
        let inputs = json!({"creds": {"data": {"password": "not base64!"}}});

        let data = JsonPathTemplate {
            data: BTreeMap::from([("password".to_string(), "$(.creds.data.missing)".to_string())]),
            ..JsonPathTemplate::default()
        };
        assert!(matches!(
            render(&data, &inputs).unwrap_err(),
            TemplateError::Data { ref key, .. } if key == "password"
        ));

        let base64 = JsonPathTemplate {
            data: BTreeMap::from([("password".to_string(), "$(.creds.data.password)".to_string())]),
            ..JsonPathTemplate::default()
        };
        assert!(matches!(
            render(&base64, &inputs).unwrap_err(),
            TemplateError::Base64 { .. }
        ));

        let string_data = JsonPathTemplate {
            string_data: BTreeMap::from([("k".to_string(), "$(.other)".to_string())]),
            ..JsonPathTemplate::default()
        };
        assert_eq!(
            render(&string_data, &inputs).unwrap_err().to_string(),
            "templating stringData key 'k': other is not found"
        );
    }

    #[test]
    fn test_string_data_wins_on_shared_key() {
        let template = JsonPathTemplate {
            data: BTreeMap::from([("k".to_string(), "YQ==".to_string())]),
            string_data: BTreeMap::from([("k".to_string(), "b".to_string())]),
            ..JsonPathTemplate::default()
        };
        let rendered = render(&template, &json!({})).unwrap();
        assert_eq!(rendered.data["k"].0, b"b");
    }
}
