//! Article-only listings.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;

use super::{list_where, Listing, SortSpec, Target};
use crate::config::GraphConfig;
use crate::error::{RelmcpError, Result};
use crate::graph::{query_nodes, FieldPath, GraphStore, NodeFilter, SqliteGraphStore};
use crate::shape::ARTICLE_SCHEMA;

fn articles(graph: &GraphConfig) -> Target<'_> {
    Target { collection: &graph.article_collection, schema: &ARTICLE_SCHEMA }
}

fn required<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(RelmcpError::invalid(format!("{} must not be empty", name)))
    } else {
        Ok(value)
    }
}

/// All articles, sorted.
pub fn recent(conn: &Connection, graph: &GraphConfig, sort: &SortSpec, listing: &Listing) -> Result<Value> {
    list_where(conn, articles(graph), "1", Vec::new(), Some(sort), listing)
}

/// Articles listing `category`, and `subcategory` when given.
pub fn by_category(
    conn: &Connection,
    graph: &GraphConfig,
    category: &str,
    subcategory: Option<&str>,
    sort: &SortSpec,
    listing: &Listing,
) -> Result<Value> {
    let mut condition =
        String::from("EXISTS (SELECT 1 FROM json_each(body_json, '$.category') WHERE value = ?2)");
    let mut args = vec![SqlValue::Text(required("category", category)?.to_string())];
    if let Some(sub) = subcategory.map(str::trim).filter(|s| !s.is_empty()) {
        condition.push_str(" AND EXISTS (SELECT 1 FROM json_each(body_json, '$.subcategory') WHERE value = ?3)");
        args.push(SqlValue::Text(sub.to_string()));
    }
    list_where(conn, articles(graph), &condition, args, Some(sort), listing)
}

/// Articles whose `author` equals `author` exactly.
pub fn by_author(conn: &Connection, graph: &GraphConfig, author: &str, sort: &SortSpec, listing: &Listing) -> Result<Value> {
    list_where(
        conn,
        articles(graph),
        "json_extract(body_json, '$.author') = ?2",
        vec![SqlValue::Text(required("author", author)?.to_string())],
        Some(sort),
        listing,
    )
}

/// Articles linked to an entity (matched by key or name), newest first.
/// An unknown entity yields an empty list.
pub fn by_entity(conn: &Connection, graph: &GraphConfig, entity: &str, listing: &Listing) -> Result<Value> {
    let entity = required("entity", entity)?;
    let store = SqliteGraphStore::new(conn);
    let filter = NodeFilter::KeyOrFieldEquals {
        field: FieldPath::parse("name")?,
        value: entity.to_string(),
    };
    let Some(entity) = store.find_nodes(&graph.entity_collection, &filter)?.into_iter().next() else {
        log::debug!("no entity matches {:?}", entity);
        return Ok(listing.finish(&[], &ARTICLE_SCHEMA));
    };

    let sql = "SELECT a.node_id, a.collection, a.node_key, a.body_json \
               FROM edges e JOIN nodes a ON a.node_id = e.from_id \
               WHERE e.collection = ?1 AND e.to_id = ?2 AND a.collection = ?3 \
               ORDER BY json_extract(a.body_json, ?4) DESC, e.rowid LIMIT ?5 OFFSET ?6";
    let args = vec![
        SqlValue::Text(graph.article_entity_edges.clone()),
        SqlValue::Text(entity.id),
        SqlValue::Text(graph.article_collection.clone()),
        SqlValue::Text(format!("$.{}", ARTICLE_SCHEMA.timestamp)),
        SqlValue::Integer(listing.page.limit as i64),
        SqlValue::Integer(listing.page.offset as i64),
    ];
    let nodes = query_nodes(conn, sql, params_from_iter(args))?;
    Ok(listing.finish(&nodes, &ARTICLE_SCHEMA))
}
