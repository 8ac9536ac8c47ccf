use rusqlite::{params, Connection};
use serde_json::Value;

use crate::config::GraphConfig;
use crate::error::{RelmcpError, Result};
use crate::graph::qualify;

/// Edges touching a document across the listed edge collections, each tagged
/// with `_edgeCollection`. `limit` applies per collection.
pub fn document_edges(conn: &Connection, graph: &GraphConfig, document: &str, limit: usize) -> Result<Vec<Value>> {
    let id = qualify(document, &graph.document_collection)?;
    let mut stmt = conn.prepare_cached(
        "SELECT edge_id, body_json FROM edges \
         WHERE collection = ?1 AND (from_id = ?2 OR to_id = ?2) ORDER BY rowid LIMIT ?3",
    )?;

    let mut out = Vec::new();
    for collection in &graph.listed_edge_collections {
        let rows = stmt.query_map(params![collection, id, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (edge_id, body) = row?;
            let mut edge: Value = serde_json::from_str(&body)
                .map_err(|e| RelmcpError::Parse(format!("payload of {}: {}", edge_id, e)))?;
            if let Value::Object(map) = &mut edge {
                map.insert("_edgeCollection".to_string(), Value::String(collection.clone()));
            }
            out.push(edge);
        }
    }
    Ok(out)
}
