//! Fixed shapes for related-article results.

use serde_json::{Map, Value};

use crate::graph::Node;

/// Stripped from `default` and from the first `read` entry when redacting
const CONTENT_REDACTED: &[&str] = &["description", "docID", "image", "summary", "url"];
/// Stripped from the first `watch` entry when redacting
const MEDIA_REDACTED: &[&str] = &["description", "image", "url", "videoID"];

fn unset(value: Value, fields: &[&str]) -> Value {
    match value {
        Value::Object(mut map) => {
            for field in fields {
                map.remove(*field);
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn first(node: &Node, list: &str) -> Option<Value> {
    node.get(list).and_then(Value::as_array).and_then(|items| items.first()).cloned()
}

/// Single-element list holding the first entry of `list`; empty when there is none.
fn first_as_list(node: &Node, list: &str, redact: Option<&[&str]>) -> Value {
    match first(node, list) {
        Some(entry) => {
            let entry = match redact {
                Some(fields) => unset(entry, fields),
                None => entry,
            };
            Value::Array(vec![entry])
        }
        None => Value::Array(Vec::new()),
    }
}

/// Shape a related article.
///
/// Redacted output strips content and media identifiers and carries only the
/// first source tag as `tag`; full output keeps the complete sub-objects and
/// the whole `source_tags` list.
pub fn shape_related(node: &Node, redact: bool) -> Value {
    let field = |dotted: &str| node.get(dotted).cloned().unwrap_or(Value::Null);

    let mut out = Map::new();
    out.insert("articleID".to_string(), Value::String(node.key.clone()));
    out.insert("category".to_string(), field("category"));
    out.insert("subcategory".to_string(), field("subcategory"));

    if redact {
        out.insert("default".to_string(), unset(field("default"), CONTENT_REDACTED));
        out.insert("default_image".to_string(), field("default_image"));
        out.insert("read".to_string(), first_as_list(node, "read", Some(CONTENT_REDACTED)));
        out.insert("watch".to_string(), first_as_list(node, "watch", Some(MEDIA_REDACTED)));
        out.insert("tag".to_string(), first(node, "source_tags").unwrap_or(Value::Null));
    } else {
        out.insert("default".to_string(), field("default"));
        out.insert("default_image".to_string(), field("default_image"));
        out.insert("read".to_string(), first_as_list(node, "read", None));
        out.insert("watch".to_string(), first_as_list(node, "watch", None));
        out.insert("source_tags".to_string(), field("source_tags"));
    }
    Value::Object(out)
}

/// Attach a path count to a shaped result.
pub fn with_paths(mut shaped: Value, paths: usize) -> Value {
    if let Value::Object(map) = &mut shaped {
        map.insert("no_of_paths".to_string(), Value::from(paths));
    }
    shaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::loader::parse_node;
    use crate::test_support::{article, T0};

    fn node() -> Node {
        parse_node(article("a1", T0, "world", "Ada"), Some("Article")).unwrap()
    }

    #[test]
    fn test_redacted_shape_strips_fields() {
        let shaped = shape_related(&node(), true);
        let default = shaped["default"].as_object().unwrap();
        for field in CONTENT_REDACTED {
            assert!(!default.contains_key(*field), "default still has {}", field);
        }
        assert_eq!(default["title"], "Title a1");

        let read = shaped["read"].as_array().unwrap();
        assert_eq!(read.len(), 1);
        assert!(read[0].get("url").is_none());
        assert!(read[0].get("docID").is_none());
        assert_eq!(read[0]["title"], "Read a1");

        let watch = &shaped["watch"][0];
        for field in MEDIA_REDACTED {
            assert!(watch.get(*field).is_none());
        }
        assert_eq!(shaped["tag"], "reuters");
        assert!(shaped.get("source_tags").is_none());
    }

    #[test]
    fn test_full_shape_keeps_fields() {
        let shaped = shape_related(&node(), false);
        assert_eq!(shaped["articleID"], "a1");
        assert_eq!(shaped["default"]["url"], "https://news.example/a1");
        assert_eq!(shaped["default"]["image"], "https://img.example/a1.jpg");
        assert_eq!(shaped["read"].as_array().unwrap().len(), 1);
        assert_eq!(shaped["read"][0]["url"], "https://read.example/a1");
        assert_eq!(shaped["watch"][0]["videoID"], "vid-a1");
        assert_eq!(shaped["source_tags"], serde_json::json!(["reuters", "ap"]));
    }

    #[test]
    fn test_missing_media_is_empty_list() {
        let bare = Node {
            id: "Article/x".into(),
            collection: "Article".into(),
            key: "x".into(),
            body: serde_json::json!({"category": ["world"]}),
        };
        let shaped = shape_related(&bare, true);
        assert_eq!(shaped["read"], serde_json::json!([]));
        assert_eq!(shaped["watch"], serde_json::json!([]));
        assert_eq!(shaped["tag"], Value::Null);
        assert_eq!(shaped["default"], Value::Null);
    }

    #[test]
    fn test_with_paths() {
        let shaped = with_paths(shape_related(&node(), true), 3);
        assert_eq!(shaped["no_of_paths"], 3);
    }
}
