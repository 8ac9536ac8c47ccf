use serde::Deserialize;
use serde_json::{Map, Value};

use super::CollectionSchema;
use crate::error::{RelmcpError, Result};
use crate::graph::{FieldPath, Node};

/// Named detail level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    Minimal,
    Summary,
    Full,
}

impl Detail {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(Detail::Minimal),
            "summary" => Ok(Detail::Summary),
            "full" => Ok(Detail::Full),
            other => Err(RelmcpError::invalid(format!(
                "detail must be one of minimal, summary, full; got {:?}",
                other
            ))),
        }
    }
}

/// What a listing emits for each node.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionSpec {
    /// `_key` and title
    Minimal,
    /// `_key`, title and the collection's short summary
    Summary,
    /// the whole payload
    Full,
    /// a flat mapping of each listed field to its value
    Explicit(Vec<FieldPath>),
}

impl From<Detail> for ProjectionSpec {
    fn from(detail: Detail) -> Self {
        match detail {
            Detail::Minimal => ProjectionSpec::Minimal,
            Detail::Summary => ProjectionSpec::Summary,
            Detail::Full => ProjectionSpec::Full,
        }
    }
}

impl ProjectionSpec {
    /// A non-empty field list overrides the detail level entirely.
    pub fn resolve(detail: Option<&str>, fields: &[String], default: Detail) -> Result<Self> {
        if !fields.is_empty() {
            let paths = fields.iter().map(|f| FieldPath::parse(f)).collect::<Result<Vec<_>>>()?;
            return Ok(ProjectionSpec::Explicit(paths));
        }
        let detail = match detail {
            Some(raw) => Detail::parse(raw)?,
            None => default,
        };
        Ok(detail.into())
    }

    pub fn apply(&self, node: &Node, schema: &CollectionSchema) -> Value {
        let read = |dotted: &str| node.get(dotted).cloned().unwrap_or(Value::Null);
        match self {
            ProjectionSpec::Full => node.body.clone(),
            ProjectionSpec::Minimal => {
                let mut out = Map::new();
                out.insert("_key".to_string(), Value::String(node.key.clone()));
                out.insert("title".to_string(), read(schema.title));
                Value::Object(out)
            }
            ProjectionSpec::Summary => {
                let mut out = Map::new();
                out.insert("_key".to_string(), Value::String(node.key.clone()));
                out.insert("title".to_string(), read(schema.title));
                out.insert(schema.summary_key.to_string(), read(schema.summary));
                Value::Object(out)
            }
            ProjectionSpec::Explicit(fields) => {
                let out: Map<String, Value> = fields
                    .iter()
                    .map(|f| (f.as_str().to_string(), node.field(f).cloned().unwrap_or(Value::Null)))
                    .collect();
                Value::Object(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{ARTICLE_SCHEMA, DOCUMENT_SCHEMA};
    use serde_json::json;

    fn article() -> Node {
        Node {
            id: "Article/a1".into(),
            collection: "Article".into(),
            key: "a1".into(),
            body: json!({
                "_key": "a1",
                "default": {"title": "Moon landing", "epoch_time": 10},
                "default_summary": "Short",
                "category": ["science"]
            }),
        }
    }

    #[test]
    fn test_minimal_and_summary() {
        let node = article();
        assert_eq!(
            ProjectionSpec::Minimal.apply(&node, &ARTICLE_SCHEMA),
            json!({"_key": "a1", "title": "Moon landing"})
        );
        assert_eq!(
            ProjectionSpec::Summary.apply(&node, &ARTICLE_SCHEMA),
            json!({"_key": "a1", "title": "Moon landing", "summary": "Short"})
        );
    }

    #[test]
    fn test_document_summary_key() {
        let node = Node {
            id: "Document/d1".into(),
            collection: "Document".into(),
            key: "d1".into(),
            body: json!({"title": "T", "description": "D"}),
        };
        assert_eq!(
            ProjectionSpec::Summary.apply(&node, &DOCUMENT_SCHEMA),
            json!({"_key": "d1", "title": "T", "description": "D"})
        );
    }

    #[test]
    fn test_explicit_overrides_detail() {
        let spec = ProjectionSpec::resolve(
            Some("minimal"),
            &["category".to_string(), "default.epoch_time".to_string(), "missing".to_string()],
            Detail::Summary,
        )
        .unwrap();
        let out = spec.apply(&article(), &ARTICLE_SCHEMA);
        assert_eq!(
            out,
            json!({"category": ["science"], "default.epoch_time": 10, "missing": null})
        );
    }

    #[test]
    fn test_resolve_default_and_unknown() {
        assert_eq!(ProjectionSpec::resolve(None, &[], Detail::Full).unwrap(), ProjectionSpec::Full);
        assert!(ProjectionSpec::resolve(Some("everything"), &[], Detail::Full).is_err());
        assert!(ProjectionSpec::resolve(None, &["a b".to_string()], Detail::Full).is_err());
    }
}
