//! Direct similarity: one traversal filtered by edge type and weight.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::TraversalRequest;
use crate::config::GraphConfig;
use crate::error::Result;
use crate::graph::{qualify, Direction, FieldPath, GraphStore, Node, NodeFilter, TraversalQuery};
use crate::shape::shape_related;

/// Vertices reached outbound through edges of the requested type whose weight
/// is strictly below the threshold, deduplicated in visitation order.
pub fn similar_vertices<S: GraphStore + ?Sized>(
    store: &S,
    graph: &GraphConfig,
    request: &TraversalRequest,
) -> Result<Vec<Arc<Node>>> {
    let start = qualify(&request.start, &graph.article_collection)?;
    let edge_collection = request.edge_collection()?;
    let threshold = request.threshold()?;

    let query = TraversalQuery::new(&start, &graph.similarity_graph, Direction::Outbound, request.depth);
    let steps = store.traverse(&query)?;

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for step in steps {
        if step.edge.collection != edge_collection || step.vertex.id == start {
            continue;
        }
        // a missing weight never passes the threshold
        let below = step.edge.number(&graph.weight_field).map_or(false, |w| w < threshold);
        if below && seen.insert(step.vertex.id.clone()) {
            out.push(step.vertex);
        }
    }
    Ok(out)
}

/// Similar articles, shaped redacted or full.
pub fn find_similar<S: GraphStore + ?Sized>(
    store: &S,
    graph: &GraphConfig,
    request: &TraversalRequest,
    redact: bool,
) -> Result<Vec<Value>> {
    let vertices = similar_vertices(store, graph, request)?;
    Ok(vertices.iter().map(|v| shape_related(v, redact)).collect())
}

/// The articles owning a read URL and everything one of them reaches.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrossDocument {
    pub query_article: Vec<Value>,
    pub related_articles: Vec<Value>,
}

/// Resolve articles by a read-list URL (`request.start`), then walk the
/// similarity graph in both directions from the first of them through edges
/// of the requested type. Every qualifying path yields one related entry.
pub fn cross_document<S: GraphStore + ?Sized>(
    store: &S,
    graph: &GraphConfig,
    request: &TraversalRequest,
) -> Result<CrossDocument> {
    let edge_collection = request.edge_collection()?;
    let filter = NodeFilter::ElementFieldEquals {
        list: FieldPath::parse("read")?,
        field: FieldPath::parse("url")?,
        value: Value::String(request.start.clone()),
    };
    let owners = store.find_nodes(&graph.article_collection, &filter)?;
    let Some(first) = owners.first() else {
        return Ok(CrossDocument::default());
    };

    let query = TraversalQuery::new(&first.id, &graph.similarity_graph, Direction::Any, request.depth);
    let related_articles = store
        .traverse(&query)?
        .into_iter()
        .filter(|step| step.edge.collection == edge_collection && step.vertex.id != first.id)
        .map(|step| step.vertex.body.clone())
        .collect();

    Ok(CrossDocument {
        query_article: owners.into_iter().map(|n| n.body).collect(),
        related_articles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::related::{Param, TraversalSpec};
    use crate::test_support::{add_edge, edge_value, store_fixture};
    use crate::graph::SqliteGraphStore;
    use serde_json::json;

    const SIMILAR: &[Param] = &[Param::Start, Param::Depth, Param::EdgeCollection, Param::Threshold];

    fn request(start: &str, depth: i64, threshold: f64) -> TraversalRequest {
        TraversalSpec::new()
            .start(start)
            .depth(depth)
            .edge_collection("similarity")
            .threshold(threshold)
            .validate(SIMILAR, 6)
            .unwrap()
    }

    fn keys(vertices: &[Arc<Node>]) -> Vec<&str> {
        vertices.iter().map(|v| v.key.as_str()).collect()
    }

    #[test]
    fn test_single_hop_threshold() {
        let fx = store_fixture();
        let store = SqliteGraphStore::new(&fx.conn);
        let found = similar_vertices(&store, &GraphConfig::default(), &request("a1", 1, 0.5)).unwrap();
        assert_eq!(keys(&found), vec!["a2"]);
    }

    #[test]
    fn test_two_hops_deduplicated() {
        let fx = store_fixture();
        let store = SqliteGraphStore::new(&fx.conn);
        let found = similar_vertices(&store, &GraphConfig::default(), &request("a1", 2, 0.5)).unwrap();
        assert_eq!(keys(&found), vec!["a2", "a4"]);
    }

    #[test]
    fn test_threshold_is_strict() {
        let fx = store_fixture();
        let store = SqliteGraphStore::new(&fx.conn);
        // s1 carries exactly 0.2
        let found = similar_vertices(&store, &GraphConfig::default(), &request("a1", 1, 0.2)).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_start_never_returned() {
        let mut fx = store_fixture();
        add_edge(
            &mut fx.conn,
            "similarity",
            edge_value("s9", "Article/a4", "Article/a1", json!({"sim_value": 0.05})),
        );
        let store = SqliteGraphStore::new(&fx.conn);
        let found = similar_vertices(&store, &GraphConfig::default(), &request("a1", 3, 0.5)).unwrap();
        assert!(!found.is_empty());
        assert!(found.iter().all(|v| v.id != "Article/a1"));
    }

    #[test]
    fn test_other_edge_types_ignored() {
        let fx = store_fixture();
        let store = SqliteGraphStore::new(&fx.conn);
        let req = TraversalSpec::new()
            .start("a1")
            .depth(1)
            .edge_collection("closeness")
            .threshold(10.0)
            .validate(SIMILAR, 6)
            .unwrap();
        // closeness edges carry no weight
        assert!(similar_vertices(&store, &GraphConfig::default(), &req).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_start_is_empty() {
        let fx = store_fixture();
        let store = SqliteGraphStore::new(&fx.conn);
        let found = find_similar(&store, &GraphConfig::default(), &request("ghost", 2, 0.5), true).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_find_similar_shapes() {
        let fx = store_fixture();
        let store = SqliteGraphStore::new(&fx.conn);
        let graph = GraphConfig::default();
        let redacted = find_similar(&store, &graph, &request("a1", 1, 0.5), true).unwrap();
        assert_eq!(redacted[0]["articleID"], "a2");
        assert!(redacted[0]["default"].get("url").is_none());
        let full = find_similar(&store, &graph, &request("a1", 1, 0.5), false).unwrap();
        assert_eq!(full[0]["default"]["url"], "https://news.example/a2");
    }

    fn cross(url: &str) -> TraversalRequest {
        TraversalSpec::new()
            .start(url)
            .depth(1)
            .edge_collection("similarity")
            .validate(&[Param::Start, Param::Depth, Param::EdgeCollection], 6)
            .unwrap()
    }

    #[test]
    fn test_cross_document() {
        let fx = store_fixture();
        let store = SqliteGraphStore::new(&fx.conn);
        let result = cross_document(&store, &GraphConfig::default(), &cross("https://read.example/a2")).unwrap();
        assert_eq!(result.query_article.len(), 1);
        assert_eq!(result.query_article[0]["_key"], "a2");
        let related: Vec<&str> = result
            .related_articles
            .iter()
            .filter_map(|a| a["_key"].as_str())
            .collect();
        // outbound edges are walked before inbound ones
        assert_eq!(related, vec!["a4", "a1"]);
    }

    #[test]
    fn test_cross_document_unknown_url() {
        let fx = store_fixture();
        let store = SqliteGraphStore::new(&fx.conn);
        let result = cross_document(&store, &GraphConfig::default(), &cross("https://read.example/none")).unwrap();
        assert!(result.query_article.is_empty());
        assert!(result.related_articles.is_empty());
    }
}
