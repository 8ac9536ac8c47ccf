//! Property graph model and the store seam the discovery strategies run against.
//!
//! Vertices and edges carry JSON payloads addressed by collection-qualified
//! identities (`Article/123`). A named graph is a set of edge collections;
//! traversal enumerates every path from a start vertex up to a depth bound.

pub mod loader;
mod store;

pub use store::SqliteGraphStore;
pub(crate) use store::{query_nodes, NODE_COLUMNS};

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RelmcpError, Result};

fn key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-:.@()+,=;$!*'%]{1,254}$").expect("Invalid regex pattern"))
}

fn collection_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]{0,255}$").expect("Invalid regex pattern"))
}

fn field_segment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex pattern"))
}

/// Check a collection name.
pub fn validate_collection(name: &str) -> Result<()> {
    if collection_regex().is_match(name) {
        Ok(())
    } else {
        Err(RelmcpError::invalid(format!("invalid collection name: {:?}", name)))
    }
}

/// Check a document key.
pub fn validate_key(key: &str) -> Result<()> {
    if key_regex().is_match(key) {
        Ok(())
    } else {
        Err(RelmcpError::invalid(format!("invalid document key: {:?}", key)))
    }
}

/// Build a collection-qualified identity.
pub fn node_id(collection: &str, key: &str) -> String {
    format!("{}/{}", collection, key)
}

/// Split `collection/key`.
pub fn split_id(id: &str) -> Result<(&str, &str)> {
    let (collection, key) = id
        .split_once('/')
        .ok_or_else(|| RelmcpError::invalid(format!("identity must be collection/key: {:?}", id)))?;
    validate_collection(collection)?;
    validate_key(key)?;
    Ok((collection, key))
}

/// Accept either a bare key (qualified with `collection`) or a full identity.
pub fn qualify(raw: &str, collection: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RelmcpError::invalid("identity must not be empty"));
    }
    if raw.contains('/') {
        split_id(raw)?;
        Ok(raw.to_string())
    } else {
        validate_key(raw)?;
        Ok(node_id(collection, raw))
    }
}

/// Numeric cast for stored values: numbers and numeric strings.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Dotted path into a JSON payload, e.g. `default.epoch_time`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.split('.').all(|seg| field_segment_regex().is_match(seg)) {
            return Err(RelmcpError::invalid(format!("invalid field path: {:?}", raw)));
        }
        Ok(Self { raw: raw.to_string() })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.raw.split('.')
    }

    /// SQLite JSON path (`$.default.epoch_time`)
    pub fn json_path(&self) -> String {
        format!("$.{}", self.raw)
    }

    pub fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments().try_fold(value, |v, seg| v.get(seg))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Traversal direction relative to edge orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outbound,
    Inbound,
    Any,
}

/// A vertex with its JSON payload (which includes `_id` and `_key`)
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub collection: String,
    pub key: String,
    pub body: Value,
}

impl Node {
    /// Read a dotted field without validation; unknown paths yield `None`.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        dotted.split('.').try_fold(&self.body, |v, seg| v.get(seg))
    }

    pub fn field(&self, path: &FieldPath) -> Option<&Value> {
        path.lookup(&self.body)
    }

    pub fn number(&self, path: &FieldPath) -> Option<f64> {
        self.field(path).and_then(to_number)
    }

    pub fn str_field(&self, dotted: &str) -> Option<&str> {
        self.get(dotted).and_then(Value::as_str)
    }

    /// Whether a list-valued field contains `needle`.
    pub fn list_contains(&self, dotted: &str, needle: &str) -> bool {
        self.get(dotted)
            .and_then(Value::as_array)
            .map_or(false, |items| items.iter().any(|v| v.as_str() == Some(needle)))
    }
}

/// A directed edge between two vertices
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: String,
    pub collection: String,
    pub from: String,
    pub to: String,
    pub body: Value,
}

impl Edge {
    pub fn number(&self, field: &str) -> Option<f64> {
        self.body.get(field).and_then(to_number)
    }

    /// String members of a list-valued field; absent or non-list yields empty.
    pub fn strings(&self, field: &str) -> Vec<&str> {
        self.body
            .get(field)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Vertices and edges walked from the start vertex; `vertices[0]` is the start.
#[derive(Debug, Clone)]
pub struct TraversalPath {
    pub vertices: Vec<Arc<Node>>,
    pub edges: Vec<Arc<Edge>>,
}

/// One emitted traversal row: the reached vertex, the edge that reached it, and the path.
#[derive(Debug, Clone)]
pub struct TraversalStep {
    pub vertex: Arc<Node>,
    pub edge: Arc<Edge>,
    pub path: TraversalPath,
}

impl TraversalStep {
    pub fn depth(&self) -> usize {
        self.path.edges.len()
    }
}

/// Bounded traversal inside a named graph
#[derive(Debug, Clone)]
pub struct TraversalQuery {
    pub start: String,
    pub graph: String,
    pub direction: Direction,
    pub min_depth: u32,
    pub max_depth: u32,
}

impl TraversalQuery {
    pub fn new(start: impl Into<String>, graph: impl Into<String>, direction: Direction, max_depth: u32) -> Self {
        Self {
            start: start.into(),
            graph: graph.into(),
            direction,
            min_depth: 1,
            max_depth,
        }
    }

    /// Only emit steps at `min_depth` hops or deeper; shallower vertices are still walked through.
    pub fn with_min_depth(mut self, min_depth: u32) -> Self {
        self.min_depth = min_depth;
        self
    }
}

/// Vertex predicate the store evaluates itself
#[derive(Debug, Clone)]
pub enum NodeFilter {
    /// `field == value`
    FieldEquals { field: FieldPath, value: Value },
    /// some element of list `list` has `field == value`
    ElementFieldEquals { list: FieldPath, field: FieldPath, value: Value },
    /// `_key == value || field == value`
    KeyOrFieldEquals { field: FieldPath, value: String },
}

/// The graph-capable document store the discovery strategies depend on.
pub trait GraphStore {
    /// Resolve a vertex by collection-qualified identity.
    fn node(&self, id: &str) -> Result<Option<Node>>;

    /// Vertices of `collection` matching `filter`, in storage order.
    fn find_nodes(&self, collection: &str, filter: &NodeFilter) -> Result<Vec<Node>>;

    /// Enumerate paths from `query.start`. An unknown start yields no steps.
    fn traverse(&self, query: &TraversalQuery) -> Result<Vec<TraversalStep>>;
}
