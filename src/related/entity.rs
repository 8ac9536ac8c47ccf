//! Entity fan-out: articles linked to any of a set of named entities.

use std::collections::HashSet;

use serde_json::Value;

use super::{TimeWindow, TraversalRequest};
use crate::config::GraphConfig;
use crate::error::Result;
use crate::graph::{qualify, Direction, FieldPath, GraphStore, NodeFilter, TraversalQuery};
use crate::shape::{shape_related, ARTICLE_SCHEMA};

/// Walk inbound from every entity named in `request.terms` and keep distinct
/// articles of the requested category whose timestamp lies in the window
/// around the caller's reference time. No path counting.
pub fn fan_out<S: GraphStore + ?Sized>(
    store: &S,
    graph: &GraphConfig,
    request: &TraversalRequest,
) -> Result<Vec<Value>> {
    let category = request.category()?;
    let window = TimeWindow::new(request.reference_time()?, request.window()?);
    let start_id = qualify(&request.start, &graph.article_collection)?;

    if store.node(&start_id)?.is_none() {
        log::debug!("entity fan-out start {} not found", start_id);
        return Ok(Vec::new());
    }

    let name = FieldPath::parse("name")?;
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for term in &request.terms {
        let entities = store.find_nodes(
            &graph.entity_collection,
            &NodeFilter::FieldEquals { field: name.clone(), value: Value::String(term.clone()) },
        )?;
        for entity in entities {
            let query = TraversalQuery::new(&entity.id, &graph.entity_graph, Direction::Inbound, request.depth);
            for step in store.traverse(&query)? {
                let vertex = &step.vertex;
                if vertex.id == start_id
                    || !vertex.list_contains("category", category)
                    || !window.admits(vertex.get(ARTICLE_SCHEMA.timestamp))
                {
                    continue;
                }
                if seen.insert(vertex.id.clone()) {
                    out.push(shape_related(vertex, false));
                }
            }
        }
    }
    Ok(out)
}
