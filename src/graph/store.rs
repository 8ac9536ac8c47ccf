//! SQLite-backed graph store with depth-first path enumeration.

use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use super::{Direction, Edge, GraphStore, Node, NodeFilter, TraversalPath, TraversalQuery, TraversalStep};
use crate::error::{RelmcpError, Result};

pub(crate) const NODE_COLUMNS: &str = "node_id, collection, node_key, body_json";
const EDGE_COLUMNS: &str = "edge_id, collection, from_id, to_id, body_json";

/// Graph store over one SQLite connection
pub struct SqliteGraphStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteGraphStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Edge collections belonging to a named graph.
    pub fn graph_edge_collections(&self, graph: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT edge_collection FROM graph_definitions WHERE graph_name = ?1 ORDER BY edge_collection",
        )?;
        let collections = stmt
            .query_map([graph], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        Ok(collections)
    }

    /// Edges leaving (or entering) `vertex` within `collections`, paired with the far vertex.
    fn adjacent(
        &self,
        vertex: &str,
        direction: Direction,
        collections_json: &str,
    ) -> Result<Vec<(Arc<Edge>, String)>> {
        let mut out = Vec::new();
        if matches!(direction, Direction::Outbound | Direction::Any) {
            for edge in self.edges_where("from_id", vertex, collections_json)? {
                let far = edge.to.clone();
                out.push((Arc::new(edge), far));
            }
        }
        if matches!(direction, Direction::Inbound | Direction::Any) {
            for edge in self.edges_where("to_id", vertex, collections_json)? {
                let far = edge.from.clone();
                out.push((Arc::new(edge), far));
            }
        }
        Ok(out)
    }

    fn edges_where(&self, column: &'static str, vertex: &str, collections_json: &str) -> Result<Vec<Edge>> {
        let sql = format!(
            "SELECT {} FROM edges WHERE {} = ?1 \
             AND collection IN (SELECT value FROM json_each(?2)) ORDER BY rowid",
            EDGE_COLUMNS, column
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![vertex, collections_json], edge_row)?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(edge_from_parts(row?)?);
        }
        Ok(edges)
    }
}

type EdgeRow = (String, String, String, String, String);
type NodeRow = (String, String, String, String);

fn edge_row(row: &Row<'_>) -> rusqlite::Result<EdgeRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn parse_body(id: &str, body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| RelmcpError::Parse(format!("payload of {}: {}", id, e)))
}

fn node_row(row: &Row<'_>) -> rusqlite::Result<NodeRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn node_from_parts((id, collection, key, body): NodeRow) -> Result<Node> {
    let body = parse_body(&id, &body)?;
    Ok(Node { id, collection, key, body })
}

fn edge_from_parts((id, collection, from, to, body): EdgeRow) -> Result<Edge> {
    let body = parse_body(&id, &body)?;
    Ok(Edge { id, collection, from, to, body })
}

/// Run a query selecting `node_id, collection, node_key, body_json`.
pub(crate) fn query_nodes<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Node>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, node_row)?;
    let mut nodes = Vec::new();
    for row in rows {
        nodes.push(node_from_parts(row?)?);
    }
    Ok(nodes)
}

/// Bind a JSON scalar the way `json_extract` reports it.
fn sql_scalar(value: &Value) -> Option<SqlValue> {
    match value {
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        Value::Bool(b) => Some(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(SqlValue::Integer(i)),
            None => n.as_f64().map(SqlValue::Real),
        },
        // null never matches; containers are not comparable
        _ => None,
    }
}

impl GraphStore for SqliteGraphStore<'_> {
    fn node(&self, id: &str) -> Result<Option<Node>> {
        let sql = format!("SELECT {} FROM nodes WHERE node_id = ?1", NODE_COLUMNS);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let parts = stmt.query_row([id], node_row).optional()?;
        parts.map(node_from_parts).transpose()
    }

    fn find_nodes(&self, collection: &str, filter: &NodeFilter) -> Result<Vec<Node>> {
        let (sql, args): (String, Vec<SqlValue>) = match filter {
            NodeFilter::FieldEquals { field, value } => {
                let Some(value) = sql_scalar(value) else { return Ok(Vec::new()) };
                (
                    format!(
                        "SELECT {} FROM nodes WHERE collection = ?1 \
                         AND json_extract(body_json, ?2) = ?3 ORDER BY rowid",
                        NODE_COLUMNS
                    ),
                    vec![SqlValue::Text(collection.to_string()), SqlValue::Text(field.json_path()), value],
                )
            }
            NodeFilter::ElementFieldEquals { list, field, value } => {
                let Some(value) = sql_scalar(value) else { return Ok(Vec::new()) };
                (
                    format!(
                        "SELECT {} FROM nodes WHERE collection = ?1 AND EXISTS ( \
                             SELECT 1 FROM json_each(nodes.body_json, ?2) AS el \
                             WHERE json_extract(el.value, ?3) = ?4) ORDER BY rowid",
                        NODE_COLUMNS
                    ),
                    vec![
                        SqlValue::Text(collection.to_string()),
                        SqlValue::Text(list.json_path()),
                        SqlValue::Text(field.json_path()),
                        value,
                    ],
                )
            }
            NodeFilter::KeyOrFieldEquals { field, value } => (
                format!(
                    "SELECT {} FROM nodes WHERE collection = ?1 \
                     AND (node_key = ?2 OR json_extract(body_json, ?3) = ?2) ORDER BY rowid",
                    NODE_COLUMNS
                ),
                vec![
                    SqlValue::Text(collection.to_string()),
                    SqlValue::Text(value.clone()),
                    SqlValue::Text(field.json_path()),
                ],
            ),
        };

        query_nodes(self.conn, &sql, rusqlite::params_from_iter(args))
    }

    fn traverse(&self, query: &TraversalQuery) -> Result<Vec<TraversalStep>> {
        let collections = self.graph_edge_collections(&query.graph)?;
        if collections.is_empty() {
            return Err(RelmcpError::invalid(format!("unknown graph: {}", query.graph)));
        }

        let Some(start) = self.node(&query.start)? else {
            log::debug!("traversal start {} not found", query.start);
            return Ok(Vec::new());
        };

        let collections_json = serde_json::to_string(&collections)
            .map_err(|e| RelmcpError::Parse(format!("graph collections: {}", e)))?;

        let mut walk = Walk {
            store: self,
            collections_json,
            query,
            nodes: HashMap::new(),
            adjacency: HashMap::new(),
            steps: Vec::new(),
        };
        let mut vertices = vec![Arc::new(start)];
        let mut edges = Vec::new();
        walk.descend(&mut vertices, &mut edges)?;

        log::debug!(
            "traversal from {} in {} ({:?}, depth {}..={}) emitted {} steps",
            query.start,
            query.graph,
            query.direction,
            query.min_depth,
            query.max_depth,
            walk.steps.len()
        );
        Ok(walk.steps)
    }
}

/// State of one traversal: lookups are memoized for the duration of the call only.
struct Walk<'s, 'c, 'q> {
    store: &'s SqliteGraphStore<'c>,
    collections_json: String,
    query: &'q TraversalQuery,
    nodes: HashMap<String, Option<Arc<Node>>>,
    adjacency: HashMap<String, Vec<(Arc<Edge>, String)>>,
    steps: Vec<TraversalStep>,
}

impl Walk<'_, '_, '_> {
    fn vertex(&mut self, id: &str) -> Result<Option<Arc<Node>>> {
        if let Some(hit) = self.nodes.get(id) {
            return Ok(hit.clone());
        }
        let loaded = self.store.node(id)?.map(Arc::new);
        self.nodes.insert(id.to_string(), loaded.clone());
        Ok(loaded)
    }

    fn neighbours(&mut self, id: &str) -> Result<Vec<(Arc<Edge>, String)>> {
        if let Some(hit) = self.adjacency.get(id) {
            return Ok(hit.clone());
        }
        let found = self.store.adjacent(id, self.query.direction, &self.collections_json)?;
        self.adjacency.insert(id.to_string(), found.clone());
        Ok(found)
    }

    /// Pre-order DFS; an edge is used at most once per path.
    fn descend(&mut self, vertices: &mut Vec<Arc<Node>>, edges: &mut Vec<Arc<Edge>>) -> Result<()> {
        let depth = edges.len() as u32;
        if depth >= self.query.max_depth {
            return Ok(());
        }
        let Some(current) = vertices.last().map(|v| v.id.clone()) else {
            return Ok(());
        };

        for (edge, far) in self.neighbours(&current)? {
            if edges.iter().any(|e| e.id == edge.id) {
                continue;
            }
            // dangling edge
            let Some(next) = self.vertex(&far)? else { continue };

            vertices.push(Arc::clone(&next));
            edges.push(Arc::clone(&edge));

            if depth + 1 >= self.query.min_depth {
                self.steps.push(TraversalStep {
                    vertex: next,
                    edge,
                    path: TraversalPath {
                        vertices: vertices.clone(),
                        edges: edges.clone(),
                    },
                });
            }
            self.descend(vertices, edges)?;

            vertices.pop();
            edges.pop();
        }
        Ok(())
    }
}
