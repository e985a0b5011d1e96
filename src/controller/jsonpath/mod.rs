//! # JSONPath Templates
//!
//! Text templates with embedded `$( expr )` JSONPath expressions, evaluated
//! against a JSON document.
//!
//! ```text
//! "postgres://$(.creds.data.user)@$(.svc.spec.clusterIP)"
//! ```
//!
//! A template is first translated to canonical `{ expr }` form, then parsed
//! into text and expression segments. Evaluating an expression prints every
//! result (strings raw, anything else as compact JSON) joined by a space.

mod eval;
mod parser;
mod translate;

use serde_json::Value;
use thiserror::Error;

pub use translate::to_canonical;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JsonPathError {
    #[error("parsing jsonpath '{template}': {message}")]
    Parse { template: String, message: String },
    #[error("{0} is not found")]
    NotFound(String),
    #[error("array index out of bounds: index {index}, length {length}")]
    IndexOutOfBounds { index: i64, length: usize },
    #[error("{0} is not array or slice")]
    NotArray(String),
    #[error("invalid slice step {0}")]
    InvalidStep(i64),
}

/// One step of a path expression
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    Field(String),
    Fields(Vec<String>),
    Wildcard,
    Recursive,
    Index(Vec<i64>),
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    Filter(Filter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// `?(@.path)` or `?(@.path op literal)`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Filter {
    pub path: Vec<Step>,
    pub comparison: Option<(CompareOp, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Text(String),
    Expr(Vec<Step>),
}

/// A parsed template
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    /// Parse a `$( expr )` template
    ///
    /// # Errors
    ///
    /// `Parse` for malformed expressions.
    pub fn parse(template: &str) -> Result<Self, JsonPathError> {
        Self::parse_canonical(&to_canonical(template))
    }

    /// Parse a template already in `{ expr }` form
    ///
    /// # Errors
    ///
    /// `Parse` for malformed expressions.
    pub fn parse_canonical(template: &str) -> Result<Self, JsonPathError> {
        let segments = parser::parse_template(template).map_err(|message| JsonPathError::Parse {
            template: template.to_string(),
            message,
        })?;
        Ok(Self { segments })
    }

    /// True when the template holds no expression
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Text(_)))
    }

    /// Render the template against `root`
    ///
    /// # Errors
    ///
    /// Missing fields and out-of-range indexes.
    pub fn evaluate(&self, root: &Value) -> Result<String, JsonPathError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Expr(steps) => {
                    let results = eval::eval_steps(steps, vec![root])?;
                    let printed: Vec<String> = results.into_iter().map(print_value).collect();
                    out.push_str(&printed.join(" "));
                }
            }
        }
        Ok(out)
    }
}

/// Parse and render `template` in one go
///
/// # Errors
///
/// See [`JsonPath::parse`] and [`JsonPath::evaluate`].
pub fn evaluate(template: &str, root: &Value) -> Result<String, JsonPathError> {
    JsonPath::parse(template)?.evaluate(root)
}

fn print_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root() -> Value {
        json!({
            "creds": {
                "metadata": {"name": "db-creds", "labels": {"app.kubernetes.io/name": "db"}},
                "data": {"user": "YWRtaW4=", "ca.crt": "Y2E="}
            },
            "svc": {
                "spec": {
                    "clusterIP": "10.0.0.1",
                    "ports": [
                        {"name": "http", "port": 80, "protocol": "TCP"},
                        {"name": "dns", "port": 53, "protocol": "UDP"},
                        {"name": "https", "port": 443, "protocol": "TCP"}
                    ]
                }
            }
        })
    }

    #[test]
    fn test_text_and_expressions() {
        assert_eq!(
            evaluate("host=$(.svc.spec.clusterIP):$(.svc.spec.ports[0].port)", &root()).unwrap(),
            "host=10.0.0.1:80"
        );
    }

    #[test]
    fn test_literal_template() {
        let path = JsonPath::parse("just text").unwrap();
        assert!(path.is_literal());
        assert_eq!(path.evaluate(&root()).unwrap(), "just text");
    }

    #[test]
    fn test_bracket_field_with_dots() {
        assert_eq!(evaluate("$(.creds.data['ca.crt'])", &root()).unwrap(), "Y2E=");
        assert_eq!(
            evaluate(r"$(.creds.metadata.labels.app\.kubernetes\.io/name)", &root()).unwrap(),
            "db"
        );
    }

    #[test]
    fn test_multiple_results_joined_by_space() {
        assert_eq!(
            evaluate("$(.svc.spec.ports[*].port)", &root()).unwrap(),
            "80 53 443"
        );
        assert_eq!(
            evaluate("$(.svc.spec.ports[?(@.protocol=='TCP')].name)", &root()).unwrap(),
            "http https"
        );
    }

    #[test]
    fn test_non_string_printed_as_json() {
        assert_eq!(
            evaluate("$(.svc.spec.ports[1])", &root()).unwrap(),
            r#"{"name":"dns","port":53,"protocol":"UDP"}"#
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            evaluate("$(.creds.data.password)", &root()).unwrap_err().to_string(),
            "password is not found"
        );
        assert_eq!(
            evaluate("$(.svc.spec.ports[5])", &root()).unwrap_err().to_string(),
            "array index out of bounds: index 5, length 3"
        );
    }

    #[test]
    fn test_parse_error_names_template() {
        let err = JsonPath::parse("$(.a[)").unwrap_err();
        assert!(matches!(err, JsonPathError::Parse { .. }));
        assert!(err.to_string().contains("{.a[}"));
    }
}
