//! Import of vertices, edges and named graphs from JSON-lines exports.
//!
//! Each line is one document in the export shape of a document store:
//! vertices carry `_id` (or `_key` plus a collection), edges additionally
//! carry `_from` and `_to`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{node_id, split_id, validate_collection, validate_key, Edge, Node};
use crate::error::{RelmcpError, Result};

/// Read one JSON object per non-blank line.
pub fn read_json_lines(path: &Path) -> Result<Vec<Value>> {
    let reader = BufReader::new(File::open(path)?);
    let mut values = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .map_err(|e| RelmcpError::Parse(format!("{}:{}: {}", path.display(), idx + 1, e)))?;
        values.push(value);
    }
    Ok(values)
}

fn take_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(RelmcpError::Parse(format!("expected a JSON object, got {}", other))),
    }
}

/// Work out `(collection, key)` from `_id`, or from `_key` and the fallback collection.
/// A missing key gets a fresh UUID.
fn identity(map: &Map<String, Value>, fallback: Option<&str>) -> Result<(String, String)> {
    if let Some(id) = map.get("_id").and_then(Value::as_str) {
        let (collection, key) = split_id(id)?;
        return Ok((collection.to_string(), key.to_string()));
    }
    let collection = fallback
        .ok_or_else(|| RelmcpError::Parse("document has no _id and no collection was given".to_string()))?;
    validate_collection(collection)?;
    let key = match map.get("_key").and_then(Value::as_str) {
        Some(key) => {
            validate_key(key)?;
            key.to_string()
        }
        None => Uuid::new_v4().to_string(),
    };
    Ok((collection.to_string(), key))
}

/// Build a vertex, normalizing `_id`/`_key` into the payload.
pub fn parse_node(value: Value, collection: Option<&str>) -> Result<Node> {
    let mut map = take_object(value)?;
    let (collection, key) = identity(&map, collection)?;
    let id = node_id(&collection, &key);
    map.insert("_id".to_string(), Value::String(id.clone()));
    map.insert("_key".to_string(), Value::String(key.clone()));
    map.remove("_rev");
    Ok(Node { id, collection, key, body: Value::Object(map) })
}

/// Build an edge; `_from` and `_to` must be full identities.
pub fn parse_edge(value: Value, collection: Option<&str>) -> Result<Edge> {
    let mut map = take_object(value)?;
    let (collection, key) = identity(&map, collection)?;
    let endpoint = |field: &str| -> Result<String> {
        let raw = map
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| RelmcpError::Parse(format!("edge {}/{} has no {}", collection, key, field)))?;
        split_id(raw)?;
        Ok(raw.to_string())
    };
    let from = endpoint("_from")?;
    let to = endpoint("_to")?;
    let id = node_id(&collection, &key);
    map.insert("_id".to_string(), Value::String(id.clone()));
    map.insert("_key".to_string(), Value::String(key));
    map.remove("_rev");
    Ok(Edge { id, collection, from, to, body: Value::Object(map) })
}

fn to_json(id: &str, body: &Value) -> Result<String> {
    serde_json::to_string(body).map_err(|e| RelmcpError::Parse(format!("payload of {}: {}", id, e)))
}

/// Upsert vertices in one transaction. Returns the number written.
pub fn insert_nodes(conn: &mut Connection, nodes: &[Node]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO nodes (node_id, collection, node_key, body_json) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(node_id) DO UPDATE SET body_json = excluded.body_json",
        )?;
        for node in nodes {
            stmt.execute(params![node.id, node.collection, node.key, to_json(&node.id, &node.body)?])?;
        }
    }
    tx.commit()?;
    Ok(nodes.len())
}

/// Upsert edges in one transaction. Returns the number written.
pub fn insert_edges(conn: &mut Connection, edges: &[Edge]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO edges (edge_id, collection, from_id, to_id, body_json) VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(edge_id) DO UPDATE SET \
                 from_id = excluded.from_id, to_id = excluded.to_id, body_json = excluded.body_json",
        )?;
        for edge in edges {
            stmt.execute(params![edge.id, edge.collection, edge.from, edge.to, to_json(&edge.id, &edge.body)?])?;
        }
    }
    tx.commit()?;
    Ok(edges.len())
}

/// Declare (or extend) a named graph over the given edge collections.
pub fn define_graph(conn: &Connection, graph: &str, edge_collections: &[String]) -> Result<()> {
    if graph.trim().is_empty() {
        return Err(RelmcpError::invalid("graph name must not be empty"));
    }
    for collection in edge_collections {
        validate_collection(collection)?;
        conn.execute(
            "INSERT OR IGNORE INTO graph_definitions (graph_name, edge_collection) VALUES (?1, ?2)",
            params![graph, collection],
        )?;
    }
    Ok(())
}

/// Parse a `name=coll1,coll2` graph declaration.
pub fn parse_graph_spec(spec: &str) -> Result<(String, Vec<String>)> {
    let (name, collections) = spec
        .split_once('=')
        .ok_or_else(|| RelmcpError::invalid(format!("graph spec must be name=collection,...: {}", spec)))?;
    let collections: Vec<String> = collections
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect();
    if name.trim().is_empty() || collections.is_empty() {
        return Err(RelmcpError::invalid(format!("graph spec must be name=collection,...: {}", spec)));
    }
    Ok((name.trim().to_string(), collections))
}
