//! Tool catalogue and handlers.
//!
//! Every handler validates its arguments before resolving a store, runs its
//! query on a read-only connection and returns the result as pretty JSON text.

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::browse::{self, articles, edges, Listing, Page, SortSpec, Target};
use crate::config::{BrowseConfig, GraphConfig};
use crate::error::{RelmcpError, Result, ResultExt};
use crate::mcp::types::{Tool, ToolsCallResult};
use crate::related::{direct, entity, ranking, Param, StoreRegistry, TraversalSpec};
use crate::shape::{CollectionSchema, Detail, ProjectionSpec, ARTICLE_SCHEMA, DOCUMENT_SCHEMA};

fn tool(name: &str, description: &str, input_schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn db_url_prop(required: bool) -> Value {
    let description = if required {
        "Store endpoint URL, as configured under [store.endpoints]"
    } else {
        "Store endpoint URL; may be omitted when only one endpoint is configured"
    };
    json!({ "type": "string", "description": description })
}

fn listing_props(sortable: bool) -> serde_json::Map<String, Value> {
    let mut props = json!({
        "db_url": db_url_prop(false),
        "limit": { "type": "integer", "minimum": 1, "default": 10, "description": "Maximum number of items to return" },
        "offset": { "type": "integer", "minimum": 0, "default": 0, "description": "Number of items to skip" },
        "detail": { "type": "string", "enum": ["minimal", "summary", "full"], "default": "summary", "description": "Level of detail" },
        "projection": { "type": "array", "items": { "type": "string" }, "description": "Dotted field paths to return instead of a detail level" },
        "group_by": { "type": "string", "description": "Group results by this field" }
    });
    if sortable {
        props["sort_by"] = json!({ "type": "string", "default": "default.epoch_time", "description": "Dotted field path to sort by" });
        props["sort_order"] = json!({ "type": "string", "enum": ["asc", "desc"], "default": "desc" });
    }
    match props {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

fn listing_schema(sortable: bool, extra: Value, required: &[&str]) -> Value {
    let mut props = listing_props(sortable);
    if let Value::Object(extra) = extra {
        props.extend(extra);
    }
    json!({ "type": "object", "properties": props, "required": required })
}

fn distinct_schema(key_field: &str, what: &str) -> Value {
    let mut props = serde_json::Map::new();
    props.insert("db_url".into(), db_url_prop(false));
    props.insert("limit".into(), json!({ "type": "integer", "minimum": 1, "default": 100 }));
    props.insert("offset".into(), json!({ "type": "integer", "minimum": 0, "default": 0 }));
    props.insert(
        key_field.into(),
        json!({ "type": "string", "description": format!("Only values of this {}", what) }),
    );
    json!({ "type": "object", "properties": props, "required": [] })
}

fn by_key_schema(what: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "db_url": db_url_prop(false),
            "key": { "type": "string", "description": format!("{} _key or _id", what) },
            "detail": { "type": "string", "enum": ["minimal", "summary", "full"], "default": "full" },
            "projection": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["key"]
    })
}

/// Get all tool definitions for tools/list
pub fn get_tool_definitions() -> Vec<Tool> {
    let similar = json!({
        "type": "object",
        "properties": {
            "db_url": db_url_prop(true),
            "article_key": { "type": "string", "description": "Key of the query article" },
            "depth": { "type": "integer", "minimum": 1, "description": "Maximum traversal depth" },
            "edge_collection": { "type": "string", "description": "Edge collection the last hop must belong to" },
            "threshold": { "type": "number", "description": "Edge weights must be strictly below this value" }
        },
        "required": ["db_url", "article_key", "depth", "edge_collection", "threshold"]
    });
    let date_range = json!({
        "start_epoch": { "type": "number", "description": "Start of range (epoch seconds, inclusive)" },
        "end_epoch": { "type": "number", "description": "End of range (epoch seconds, inclusive)" }
    });
    let search = json!({ "query": { "type": "string", "description": "Case-insensitive text to look for" } });

    vec![
        tool(
            "related_similar_redacted",
            "Articles reachable through low-weight similarity edges, with media and link fields removed",
            similar.clone(),
        ),
        tool(
            "related_similar",
            "Articles reachable through low-weight similarity edges, returning full related-article objects",
            similar,
        ),
        tool(
            "related_by_shared_source",
            "Articles ranked by the number of paths connecting them through documents of the same source, within a time window of the query article",
            json!({
                "type": "object",
                "properties": {
                    "db_url": db_url_prop(true),
                    "article_key": { "type": "string", "description": "Key of the query article" },
                    "depth": { "type": "integer", "minimum": 1 },
                    "limit": { "type": "integer", "minimum": 1 },
                    "window": { "type": "number", "minimum": 0, "description": "Half-width of the time window in seconds" }
                },
                "required": ["db_url", "article_key", "depth", "limit", "window"]
            }),
        ),
        tool(
            "related_by_origin",
            "Articles of a category ranked by the number of origin-tagged paths from the query article, within a time window",
            json!({
                "type": "object",
                "properties": {
                    "db_url": db_url_prop(true),
                    "article_key": { "type": "string", "description": "Key of the query article" },
                    "depth": { "type": "integer", "minimum": 1 },
                    "category": { "type": "string" },
                    "window": { "type": "number", "minimum": 0, "description": "Half-width of the time window in seconds" },
                    "limit": { "type": "integer", "minimum": 1 },
                    "origins": { "type": "array", "items": { "type": "string" }, "description": "Edge origin tags to accept; any tagged edge when omitted" }
                },
                "required": ["db_url", "article_key", "depth", "category", "window", "limit"]
            }),
        ),
        tool(
            "related_by_entities",
            "Articles of a category linked to any of the named entities, within a time window of a reference time",
            json!({
                "type": "object",
                "properties": {
                    "db_url": db_url_prop(true),
                    "terms": { "type": "array", "items": { "type": "string" }, "description": "Entity names" },
                    "article_key": { "type": "string", "description": "Key of the query article, excluded from results" },
                    "depth": { "type": "integer", "minimum": 1 },
                    "reference_time": { "type": "number", "description": "Window center (epoch seconds)" },
                    "category": { "type": "string" },
                    "window": { "type": "number", "minimum": 0, "description": "Half-width of the time window in seconds" }
                },
                "required": ["db_url", "terms", "article_key", "depth", "reference_time", "category", "window"]
            }),
        ),
        tool(
            "related_docs_by_url",
            "Articles owning a read URL, and everything the first of them reaches through an edge type",
            json!({
                "type": "object",
                "properties": {
                    "db_url": db_url_prop(true),
                    "url": { "type": "string", "description": "URL listed in an article's read entries" },
                    "depth": { "type": "integer", "minimum": 1 },
                    "edge_collection": { "type": "string" }
                },
                "required": ["db_url", "url", "depth", "edge_collection"]
            }),
        ),
        tool(
            "related_docs_path_counts",
            "Articles ranked by the number of typed-edge paths reaching them as the second hop, with aligned path counts",
            json!({
                "type": "object",
                "properties": {
                    "db_url": db_url_prop(true),
                    "doc_id": { "type": "string", "description": "Article _id or _key" },
                    "depth": { "type": "integer", "minimum": 1 },
                    "edge_collection": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1 }
                },
                "required": ["db_url", "doc_id", "depth", "edge_collection", "limit"]
            }),
        ),
        tool("articles_recent", "List articles, newest first by default", listing_schema(true, json!({}), &[])),
        tool(
            "articles_by_category",
            "Articles in a category and optional subcategory",
            listing_schema(
                true,
                json!({ "category": { "type": "string" }, "subcategory": { "type": "string" } }),
                &["category"],
            ),
        ),
        tool(
            "articles_by_author",
            "Articles by author (exact match)",
            listing_schema(true, json!({ "author": { "type": "string" } }), &["author"]),
        ),
        tool(
            "articles_search",
            "Articles whose title, summary or description contains the query",
            listing_schema(false, search.clone(), &["query"]),
        ),
        tool(
            "articles_by_entity",
            "Articles linked to an entity, matched by key or name, newest first",
            listing_schema(
                false,
                json!({ "entity": { "type": "string", "description": "Entity name or _key" } }),
                &["entity"],
            ),
        ),
        tool(
            "articles_by_date_range",
            "Articles published within an inclusive range, newest first",
            listing_schema(false, date_range.clone(), &["start_epoch", "end_epoch"]),
        ),
        tool("article_by_key", "A single article, or null", by_key_schema("Article")),
        tool(
            "article_categories",
            "Distinct article categories and subcategories",
            distinct_schema("article_key", "article"),
        ),
        tool("article_authors", "Distinct article authors", distinct_schema("article_key", "article")),
        tool("document_by_key", "A single document, or null", by_key_schema("Document")),
        tool(
            "documents_by_date_range",
            "Documents published within an inclusive range, newest first",
            listing_schema(false, date_range, &["start_epoch", "end_epoch"]),
        ),
        tool(
            "documents_search",
            "Documents whose title, description or content contains the query",
            listing_schema(false, search, &["query"]),
        ),
        tool(
            "document_categories",
            "Distinct document categories and subcategories",
            distinct_schema("document_key", "document"),
        ),
        tool("document_authors", "Distinct document authors", distinct_schema("document_key", "document")),
        tool(
            "document_edges",
            "Edges touching a document in the listed edge collections, each tagged with _edgeCollection",
            json!({
                "type": "object",
                "properties": {
                    "db_url": db_url_prop(false),
                    "document_id": { "type": "string", "description": "Document _id or _key" },
                    "limit": { "type": "integer", "minimum": 1, "default": 20, "description": "Maximum edges per collection" }
                },
                "required": ["document_id"]
            }),
        ),
        tool(
            "system_time",
            "Current time of the server in RFC 3339 format",
            json!({ "type": "object", "properties": {}, "required": [] }),
        ),
    ]
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments.clone() };
    serde_json::from_value(arguments)
        .map_err(|e| RelmcpError::invalid(format!("invalid {} arguments: {}", tool, e)))
}

/// Callers may send integers as JSON floats; fractional values are rejected.
fn integer(name: &str, value: Option<f64>) -> Result<Option<i64>> {
    match value {
        None => Ok(None),
        Some(v) if v.is_finite() && v.fract() == 0.0 => Ok(Some(v as i64)),
        Some(v) => Err(RelmcpError::invalid(format!("{} must be an integer, got {}", name, v))),
    }
}

fn required<'a>(name: &str, value: Option<&'a String>) -> Result<&'a str> {
    value
        .map(String::as_str)
        .ok_or_else(|| RelmcpError::invalid(format!("{} is required", name)))
}

/// Items in a result, for logging.
fn result_size(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        Value::Object(map) => match map.get("related_articles") {
            Some(Value::Array(items)) => items.len(),
            _ => map.len(),
        },
        _ => 1,
    }
}

fn to_json<T: Serialize>(output: T) -> Result<Value> {
    serde_json::to_value(output).map_err(|e| RelmcpError::McpProtocol(format!("JSON serialization error: {}", e)))
}

fn respond<T: Serialize>(tool: &str, started: Instant, output: &T) -> Result<ToolsCallResult> {
    let value = to_json(output)?;
    log::info!(
        "{}: {} result(s) in {}ms",
        tool,
        result_size(&value),
        started.elapsed().as_millis()
    );
    let text = serde_json::to_string_pretty(&value)
        .map_err(|e| RelmcpError::McpProtocol(format!("JSON serialization error: {}", e)))?;
    Ok(ToolsCallResult::text(text))
}

/// Arguments of the discovery tools
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RelatedArgs {
    pub db_url: Option<String>,
    pub article_key: Option<String>,
    pub url: Option<String>,
    pub doc_id: Option<String>,
    pub depth: Option<f64>,
    pub edge_collection: Option<String>,
    pub threshold: Option<f64>,
    pub window: Option<f64>,
    pub category: Option<String>,
    pub origins: Option<Vec<String>>,
    pub terms: Option<Vec<String>>,
    pub reference_time: Option<f64>,
    pub limit: Option<f64>,
}

impl RelatedArgs {
    fn spec(&self, start: Option<&String>) -> Result<TraversalSpec> {
        Ok(TraversalSpec {
            start: start.cloned(),
            depth: integer("depth", self.depth)?,
            edge_collection: self.edge_collection.clone(),
            threshold: self.threshold,
            window: self.window,
            category: self.category.clone(),
            origins: self.origins.clone(),
            terms: self.terms.clone(),
            reference_time: self.reference_time,
            limit: integer("limit", self.limit)?,
        })
    }
}

/// Which discovery strategy a tool runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    Similar { redact: bool },
    SharedSource,
    Origin,
    Entities,
    CrossDocument,
    PathCounts,
}

impl Discovery {
    fn required(self) -> &'static [Param] {
        match self {
            Discovery::Similar { .. } => &[Param::Start, Param::Depth, Param::EdgeCollection, Param::Threshold],
            Discovery::SharedSource => &[Param::Start, Param::Depth, Param::Limit, Param::Window],
            Discovery::Origin => &[Param::Start, Param::Depth, Param::Category, Param::Window, Param::Limit],
            Discovery::Entities => &[
                Param::Start,
                Param::Terms,
                Param::Depth,
                Param::ReferenceTime,
                Param::Category,
                Param::Window,
            ],
            Discovery::CrossDocument => &[Param::Start, Param::Depth, Param::EdgeCollection],
            Discovery::PathCounts => &[Param::Start, Param::Depth, Param::EdgeCollection, Param::Limit],
        }
    }

    fn start(self, args: &RelatedArgs) -> Option<&String> {
        match self {
            Discovery::CrossDocument => args.url.as_ref(),
            Discovery::PathCounts => args.doc_id.as_ref(),
            _ => args.article_key.as_ref(),
        }
    }
}

/// Handle one of the related-article discovery tools
pub async fn handle_related(
    registry: &StoreRegistry,
    tool: &str,
    discovery: Discovery,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let started = Instant::now();
    let args: RelatedArgs = parse_args(tool, arguments)?;
    let db_url = required("db_url", args.db_url.as_ref())?;
    let ctx = registry.resolve(db_url)?;
    let request = args
        .spec(discovery.start(&args))?
        .validate(discovery.required(), ctx.ranking.max_depth)?;

    let label = format!("{}(start={}, depth={})", tool, request.start, request.depth);
    log::debug!("{} on {}", label, ctx.endpoint);
    let orders = ctx.ranking.clone();

    let output = ctx
        .read(move |store, graph| {
            match discovery {
                Discovery::Similar { redact } => to_json(direct::find_similar(store, graph, &request, redact)?),
                Discovery::SharedSource => {
                    to_json(ranking::rank_via_shared_source(store, graph, &request, orders.shared_source_order)?)
                }
                Discovery::Origin => to_json(ranking::rank_by_origin(store, graph, &request, orders.origin_order)?),
                Discovery::Entities => to_json(entity::fan_out(store, graph, &request)?),
                Discovery::CrossDocument => to_json(direct::cross_document(store, graph, &request)?),
                Discovery::PathCounts => {
                    to_json(ranking::rank_by_shared_identity(store, graph, &request, orders.shared_identity_order)?)
                }
            }
        })
        .await
        .context(|| label.clone())?;

    respond(tool, started, &output)
}

/// Arguments of the listing tools
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListArgs {
    pub db_url: Option<String>,
    pub limit: Option<f64>,
    pub offset: Option<f64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub detail: Option<String>,
    pub projection: Vec<String>,
    pub group_by: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub author: Option<String>,
    pub query: Option<String>,
    pub entity: Option<String>,
    pub start_epoch: Option<f64>,
    pub end_epoch: Option<f64>,
}

impl ListArgs {
    fn listing(&self, browse: &BrowseConfig) -> Result<Listing> {
        Ok(Listing {
            page: Page::new(
                integer("offset", self.offset)?,
                integer("limit", self.limit)?,
                browse.default_limit,
                browse.max_limit,
            )?,
            projection: ProjectionSpec::resolve(self.detail.as_deref(), &self.projection, Detail::Summary)?,
            group_by: self.group_by.clone().filter(|g| !g.trim().is_empty()),
        })
    }

    fn sort(&self, schema: &CollectionSchema) -> Result<SortSpec> {
        SortSpec::parse(self.sort_by.as_deref(), self.sort_order.as_deref(), schema)
    }
}

/// Which article listing a tool runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleListing {
    Recent,
    ByCategory,
    ByAuthor,
    ByEntity,
}

/// Handle the article-only listing tools
pub async fn handle_article_listing(
    registry: &StoreRegistry,
    browse: &BrowseConfig,
    tool: &str,
    kind: ArticleListing,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let started = Instant::now();
    let args: ListArgs = parse_args(tool, arguments)?;
    let listing = args.listing(browse)?;
    let sort = args.sort(&ARTICLE_SCHEMA)?;
    let needed = match kind {
        ArticleListing::Recent => None,
        ArticleListing::ByCategory => Some(required("category", args.category.as_ref())?.to_string()),
        ArticleListing::ByAuthor => Some(required("author", args.author.as_ref())?.to_string()),
        ArticleListing::ByEntity => Some(required("entity", args.entity.as_ref())?.to_string()),
    };
    let subcategory = args.subcategory.clone();
    let ctx = registry.resolve_or_sole(args.db_url.as_deref())?;

    let output = ctx
        .query(move |conn, graph| {
            let value = needed.as_deref().unwrap_or_default();
            match kind {
                ArticleListing::Recent => articles::recent(conn, graph, &sort, &listing),
                ArticleListing::ByCategory => {
                    articles::by_category(conn, graph, value, subcategory.as_deref(), &sort, &listing)
                }
                ArticleListing::ByAuthor => articles::by_author(conn, graph, value, &sort, &listing),
                ArticleListing::ByEntity => articles::by_entity(conn, graph, value, &listing),
            }
        })
        .await
        .context(|| tool.to_string())?;

    respond(tool, started, &output)
}

/// The collections the shared listings run over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Article,
    Document,
}

impl Collection {
    fn schema(self) -> &'static CollectionSchema {
        match self {
            Collection::Article => &ARTICLE_SCHEMA,
            Collection::Document => &DOCUMENT_SCHEMA,
        }
    }

    fn target(self, graph: &GraphConfig) -> Target<'_> {
        let collection = match self {
            Collection::Article => &graph.article_collection,
            Collection::Document => &graph.document_collection,
        };
        Target { collection, schema: self.schema() }
    }
}

/// Handle search and date-range listings over articles or documents
pub async fn handle_listing(
    registry: &StoreRegistry,
    browse: &BrowseConfig,
    tool: &str,
    collection: Collection,
    by_date: bool,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let started = Instant::now();
    let args: ListArgs = parse_args(tool, arguments)?;
    let listing = args.listing(browse)?;
    let range = if by_date {
        let start = args.start_epoch.ok_or_else(|| RelmcpError::invalid("start_epoch is required"))?;
        let end = args.end_epoch.ok_or_else(|| RelmcpError::invalid("end_epoch is required"))?;
        Some((start, end))
    } else {
        None
    };
    let query = if by_date { String::new() } else { required("query", args.query.as_ref())?.to_string() };
    let ctx = registry.resolve_or_sole(args.db_url.as_deref())?;

    let output = ctx
        .query(move |conn, graph| {
            let target = collection.target(graph);
            match range {
                Some((start, end)) => browse::by_date_range(conn, target, start, end, &listing),
                None => browse::search(conn, target, &query, &listing),
            }
        })
        .await
        .context(|| tool.to_string())?;

    respond(tool, started, &output)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeyArgs {
    db_url: Option<String>,
    key: Option<String>,
    detail: Option<String>,
    projection: Vec<String>,
}

/// Handle single-item lookups by key or id
pub async fn handle_by_key(
    registry: &StoreRegistry,
    tool: &str,
    collection: Collection,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let started = Instant::now();
    let args: KeyArgs = parse_args(tool, arguments)?;
    let key = required("key", args.key.as_ref())?.to_string();
    let projection = ProjectionSpec::resolve(args.detail.as_deref(), &args.projection, Detail::Full)?;
    let ctx = registry.resolve_or_sole(args.db_url.as_deref())?;

    let output = ctx
        .query(move |conn, graph| browse::by_key(conn, collection.target(graph), &key, &projection))
        .await
        .context(|| tool.to_string())?;

    respond(tool, started, &output)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DistinctArgs {
    db_url: Option<String>,
    limit: Option<f64>,
    offset: Option<f64>,
    article_key: Option<String>,
    document_key: Option<String>,
}

/// Handle the distinct category and author listings
pub async fn handle_distinct(
    registry: &StoreRegistry,
    browse: &BrowseConfig,
    tool: &str,
    collection: Collection,
    authors: bool,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let started = Instant::now();
    let args: DistinctArgs = parse_args(tool, arguments)?;
    let page = Page::new(
        integer("offset", args.offset)?,
        integer("limit", args.limit)?,
        browse.list_limit,
        browse.max_limit,
    )?;
    let key = match collection {
        Collection::Article => args.article_key,
        Collection::Document => args.document_key,
    }
    .filter(|k| !k.trim().is_empty());
    let ctx = registry.resolve_or_sole(args.db_url.as_deref())?;

    let output = ctx
        .query(move |conn, graph| {
            let target = collection.target(graph);
            if authors {
                browse::authors(conn, target, key.as_deref(), page)
            } else {
                browse::categories(conn, target, key.as_deref(), page)
            }
        })
        .await
        .context(|| tool.to_string())?;

    respond(tool, started, &output)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EdgeArgs {
    db_url: Option<String>,
    document_id: Option<String>,
    limit: Option<f64>,
}

/// Handle document_edges
pub async fn handle_document_edges(
    registry: &StoreRegistry,
    browse: &BrowseConfig,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let started = Instant::now();
    let args: EdgeArgs = parse_args("document_edges", arguments)?;
    let document = required("document_id", args.document_id.as_ref())?.to_string();
    let limit = Page::new(None, integer("limit", args.limit)?, 20, browse.max_limit)?.limit;
    let ctx = registry.resolve_or_sole(args.db_url.as_deref())?;

    let label = format!("document_edges(document_id={})", document);
    let output = ctx
        .query(move |conn, graph| edges::document_edges(conn, graph, &document, limit))
        .await
        .context(|| label)?;

    respond("document_edges", started, &output)
}

/// Handle system_time
pub fn handle_system_time() -> ToolsCallResult {
    ToolsCallResult::text(chrono::Local::now().to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ErrorKind;
    use crate::test_support::{store_fixture, Fixture};
    use std::collections::{BTreeMap, HashSet};

    const ENDPOINT: &str = "http://localhost:8529";

    fn registry_for(fx: &Fixture) -> (StoreRegistry, BrowseConfig) {
        let mut config: Config = toml::from_str("[store.endpoints]\n").unwrap();
        let mut endpoints = BTreeMap::new();
        endpoints.insert(ENDPOINT.to_string(), fx.db.path().to_path_buf());
        config.store.endpoints = endpoints;
        (StoreRegistry::from_config(&config).unwrap(), config.browse)
    }

    fn body(result: &ToolsCallResult) -> Value {
        serde_json::from_str(&result.content[0].text).unwrap()
    }

    #[test]
    fn test_tool_definitions_are_consistent() {
        let tools = get_tool_definitions();
        let names: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), tools.len());
        assert_eq!(tools.len(), 23);
        for tool in &tools {
            let props = tool.input_schema["properties"].as_object().unwrap();
            for req in tool.input_schema["required"].as_array().unwrap() {
                assert!(props.contains_key(req.as_str().unwrap()), "{} lacks {}", tool.name, req);
            }
        }
    }

    #[test]
    fn test_integer_arguments() {
        assert_eq!(integer("depth", Some(2.0)).unwrap(), Some(2));
        assert_eq!(integer("depth", None).unwrap(), None);
        assert!(integer("depth", Some(1.5)).is_err());
    }

    #[tokio::test]
    async fn test_related_similar() {
        let fx = store_fixture();
        let (registry, _) = registry_for(&fx);
        let args = json!({
            "db_url": ENDPOINT, "article_key": "a1", "depth": 1,
            "edge_collection": "similarity", "threshold": 0.5
        });
        let out = handle_related(&registry, "related_similar_redacted", Discovery::Similar { redact: true }, &args)
            .await
            .unwrap();
        let items = body(&out);
        assert_eq!(items[0]["articleID"], "a2");
        assert!(items[0]["default"].get("url").is_none());
    }

    #[tokio::test]
    async fn test_related_rejects_before_io() {
        let fx = store_fixture();
        let (registry, _) = registry_for(&fx);
        let missing_depth = json!({ "db_url": ENDPOINT, "article_key": "a1", "edge_collection": "similarity", "threshold": 0.5 });
        let err = handle_related(&registry, "related_similar", Discovery::Similar { redact: false }, &missing_depth)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let no_url = json!({ "article_key": "a1", "depth": 1, "limit": 3, "window": 100 });
        let err = handle_related(&registry, "related_by_shared_source", Discovery::SharedSource, &no_url)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_related_path_counts_pair() {
        let fx = store_fixture();
        let (registry, _) = registry_for(&fx);
        let args = json!({
            "db_url": ENDPOINT, "doc_id": "Article/a1", "depth": 2,
            "edge_collection": "similarity", "limit": 10
        });
        let out = handle_related(&registry, "related_docs_path_counts", Discovery::PathCounts, &args)
            .await
            .unwrap();
        let pair = body(&out);
        assert_eq!(
            pair["related_articles"].as_array().unwrap().len(),
            pair["path_counts"].as_array().unwrap().len()
        );
    }

    #[tokio::test]
    async fn test_article_listing_default_endpoint() {
        let fx = store_fixture();
        let (registry, browse) = registry_for(&fx);
        let out = handle_article_listing(
            &registry,
            &browse,
            "articles_by_author",
            ArticleListing::ByAuthor,
            &json!({ "author": "Ada", "detail": "minimal" }),
        )
        .await
        .unwrap();
        assert_eq!(body(&out), json!([
            { "_key": "a2", "title": "Title a2" },
            { "_key": "a1", "title": "Title a1" }
        ]));

        let err = handle_article_listing(&registry, &browse, "articles_by_author", ArticleListing::ByAuthor, &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_listing_limit_bounds() {
        let fx = store_fixture();
        let (registry, browse) = registry_for(&fx);
        let args = json!({ "query": "title", "limit": browse.max_limit + 1 });
        let err = handle_listing(&registry, &browse, "articles_search", Collection::Article, false, &args)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_by_key_missing_is_null() {
        let fx = store_fixture();
        let (registry, _) = registry_for(&fx);
        let out = handle_by_key(&registry, "document_by_key", Collection::Document, &json!({ "key": "d9" }))
            .await
            .unwrap();
        assert_eq!(body(&out), Value::Null);
        let out = handle_by_key(&registry, "document_by_key", Collection::Document, &json!({ "key": "d1", "projection": ["source"] }))
            .await
            .unwrap();
        assert_eq!(body(&out), json!({ "source": "wire" }));
    }

    #[tokio::test]
    async fn test_document_distinct_and_edges() {
        let fx = store_fixture();
        let (registry, browse) = registry_for(&fx);
        let out = handle_distinct(&registry, &browse, "document_authors", Collection::Document, true, &json!({}))
            .await
            .unwrap();
        assert_eq!(body(&out), json!(["Blogger", "Wire Desk"]));

        let out = handle_document_edges(&registry, &browse, &json!({ "document_id": "d1" })).await.unwrap();
        assert_eq!(body(&out), json!([]));
    }

    #[test]
    fn test_system_time_is_rfc3339() {
        let out = handle_system_time();
        assert!(chrono::DateTime::parse_from_rfc3339(&out.content[0].text).is_ok());
    }
}
