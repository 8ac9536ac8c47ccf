//! Path-count ranking.
//!
//! Candidates that share no direct similarity edge with the start article are
//! ranked by how many distinct qualifying paths reach them. Three variants:
//! through documents sharing a source ([`rank_via_shared_source`]), through
//! origin-tagged edges ([`rank_by_origin`]) and through the second hop of
//! typed edges ([`rank_by_shared_identity`]).

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::{count_paths, rank_paths, SortOrder, TimeWindow, TraversalRequest};
use crate::config::GraphConfig;
use crate::error::Result;
use crate::graph::{qualify, Direction, FieldPath, GraphStore, Node, NodeFilter, TraversalQuery, TraversalStep};
use crate::shape::{shape_related, with_paths, ARTICLE_SCHEMA};

const ARTICLE_URL: &str = "default.url";
const DOCUMENT_URL: &str = "url";
const DOCUMENT_SOURCE: &str = "source";

fn source_of(node: &Node) -> &Value {
    node.get(DOCUMENT_SOURCE).unwrap_or(&Value::Null)
}

/// Articles reached through documents that share an entity and a source
/// with the start article's document.
///
/// The start article's URL locates its document. From there the walk goes
/// outbound through mention edges with a positive term frequency, then
/// inbound from each mentioned vertex to other documents of the same source.
/// Paths are grouped by the URL of the first document reached in the second
/// phase, ranked, truncated to `limit`, and only then resolved to articles
/// and filtered by the time window around the start article.
pub fn rank_via_shared_source<S: GraphStore + ?Sized>(
    store: &S,
    graph: &GraphConfig,
    request: &TraversalRequest,
    order: SortOrder,
) -> Result<Vec<Value>> {
    let limit = request.limit()?;
    let half_width = request.window()?;
    let start_id = qualify(&request.start, &graph.article_collection)?;

    let Some(start) = store.node(&start_id)? else {
        return Ok(Vec::new());
    };
    let Some(url) = start.get(ARTICLE_URL).filter(|v| !v.is_null()).cloned() else {
        return Ok(Vec::new());
    };

    let documents = store.find_nodes(
        &graph.document_collection,
        &NodeFilter::FieldEquals { field: FieldPath::parse(DOCUMENT_URL)?, value: url },
    )?;

    let mut second_phase: HashMap<String, Vec<TraversalStep>> = HashMap::new();
    let mut keys = Vec::new();
    for doc in &documents {
        let outbound = TraversalQuery::new(&doc.id, &graph.similarity_graph, Direction::Outbound, request.depth);
        for step in store.traverse(&outbound)? {
            let mentioned = graph
                .term_frequency_fields
                .iter()
                .any(|f| step.edge.number(f).map_or(false, |tf| tf > 0.0));
            if !mentioned {
                continue;
            }

            let pivot = step.vertex.id.clone();
            if !second_phase.contains_key(&pivot) {
                let inbound = TraversalQuery::new(&pivot, &graph.similarity_graph, Direction::Inbound, request.depth);
                second_phase.insert(pivot.clone(), store.traverse(&inbound)?);
            }
            let Some(steps) = second_phase.get(&pivot) else { continue };

            for back in steps {
                if back.vertex.id == doc.id || source_of(&back.vertex) != source_of(doc) {
                    continue;
                }
                let target_url = back
                    .path
                    .vertices
                    .get(1)
                    .and_then(|v| v.str_field(DOCUMENT_URL))
                    .map(String::from);
                // null group keys are dropped
                if let Some(target_url) = target_url {
                    keys.push(target_url);
                }
            }
        }
    }

    let ranked = rank_paths(count_paths(keys), order, limit);
    log::debug!("shared-source ranking from {}: {} url groups", start_id, ranked.len());

    let window = TimeWindow::around(start.get(ARTICLE_SCHEMA.timestamp), half_width);
    let mut out = Vec::new();
    for group in ranked {
        let articles = store.find_nodes(
            &graph.article_collection,
            &NodeFilter::FieldEquals {
                field: FieldPath::parse(ARTICLE_URL)?,
                value: Value::String(group.key.clone()),
            },
        )?;
        for article in articles {
            if article.id == start.id {
                continue;
            }
            let inside = window.map_or(false, |w| w.admits(article.get(ARTICLE_SCHEMA.timestamp)));
            if inside {
                out.push(with_paths(shape_related(&article, true), group.paths));
            }
        }
    }
    Ok(out)
}

/// Articles reached in any direction through origin-tagged edges.
///
/// A step qualifies when its edge's origin tags intersect the requested set
/// (or, with no set given, when the edge carries any origin tag at all), the
/// reached article lists the requested category, and its timestamp lies in
/// the window around the start article.
pub fn rank_by_origin<S: GraphStore + ?Sized>(
    store: &S,
    graph: &GraphConfig,
    request: &TraversalRequest,
    order: SortOrder,
) -> Result<Vec<Value>> {
    let limit = request.limit()?;
    let category = request.category()?;
    let half_width = request.window()?;
    let start_id = qualify(&request.start, &graph.article_collection)?;

    let Some(start) = store.node(&start_id)? else {
        return Ok(Vec::new());
    };
    let Some(window) = TimeWindow::around(start.get(ARTICLE_SCHEMA.timestamp), half_width) else {
        log::debug!("{} has no usable timestamp; no window can match", start_id);
        return Ok(Vec::new());
    };

    let query = TraversalQuery::new(&start_id, &graph.similarity_graph, Direction::Any, request.depth);
    let mut reached: HashMap<String, Arc<Node>> = HashMap::new();
    let mut keys = Vec::new();
    for step in store.traverse(&query)? {
        let tags = step.edge.strings(&graph.origin_field);
        let tagged = match &request.origins {
            Some(wanted) => tags.iter().any(|t| wanted.iter().any(|w| w == t)),
            None => !tags.is_empty(),
        };
        let vertex = &step.vertex;
        if !tagged
            || vertex.id == start_id
            || vertex.collection != graph.article_collection
            || !vertex.list_contains("category", category)
            || !window.admits(vertex.get(ARTICLE_SCHEMA.timestamp))
        {
            continue;
        }
        keys.push(vertex.id.clone());
        reached.entry(vertex.id.clone()).or_insert_with(|| Arc::clone(vertex));
    }

    let ranked = rank_paths(count_paths(keys), order, limit);
    Ok(ranked
        .into_iter()
        .filter_map(|group| reached.get(&group.key).map(|node| with_paths(shape_related(node, false), group.paths)))
        .collect())
}

/// Related articles and their path counts, aligned by index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SharedIdentityRanking {
    pub related_articles: Vec<Value>,
    pub path_counts: Vec<usize>,
}

/// Articles ranked by how many typed-edge paths pass through them as the
/// second hop from the start article.
pub fn rank_by_shared_identity<S: GraphStore + ?Sized>(
    store: &S,
    graph: &GraphConfig,
    request: &TraversalRequest,
    order: SortOrder,
) -> Result<SharedIdentityRanking> {
    let limit = request.limit()?;
    let edge_collection = request.edge_collection()?;
    let start_id = qualify(&request.start, &graph.article_collection)?;

    // depth-1 paths have no second hop
    let query =
        TraversalQuery::new(&start_id, &graph.similarity_graph, Direction::Any, request.depth).with_min_depth(2);
    let mut keys = Vec::new();
    for step in store.traverse(&query)? {
        if step.edge.collection != edge_collection || step.vertex.id == start_id {
            continue;
        }
        if let Some(hop) = step.path.vertices.get(2) {
            if hop.id != start_id {
                keys.push(hop.id.clone());
            }
        }
    }

    let ranked = rank_paths(count_paths(keys), order, limit);
    let mut out = SharedIdentityRanking::default();
    for group in ranked {
        match store.node(&group.key)? {
            Some(node) if node.collection == graph.article_collection => {
                out.related_articles.push(node.body);
                out.path_counts.push(group.paths);
            }
            _ => continue,
        }
    }
    Ok(out)
}
