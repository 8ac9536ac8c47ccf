//! Paginated listings over articles and documents.
//!
//! Offset and limit go into the SQL query itself, so a page bounds the work
//! done, not just the output. Projection and grouping are applied to the rows
//! of the page.

pub mod articles;
pub mod edges;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::{json, Value};

use crate::db::FOLD_LOWER;
use crate::error::{RelmcpError, Result};
use crate::graph::{node_id, query_nodes, split_id, validate_key, FieldPath, Node, NODE_COLUMNS};
use crate::related::SortOrder;
use crate::shape::{group_values, CollectionSchema, ProjectionSpec};

/// Offset and limit of one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    /// Validate caller values; `limit` falls back to `default` and may not exceed `max`.
    pub fn new(offset: Option<i64>, limit: Option<i64>, default: usize, max: usize) -> Result<Self> {
        let offset = match offset {
            Some(o) if o < 0 => return Err(RelmcpError::invalid(format!("offset must not be negative, got {}", o))),
            Some(o) => o as usize,
            None => 0,
        };
        let limit = match limit {
            Some(l) if l < 1 => return Err(RelmcpError::invalid(format!("limit must be at least 1, got {}", l))),
            Some(l) if l as u64 > max as u64 => {
                return Err(RelmcpError::invalid(format!("limit {} exceeds the maximum of {}", l, max)))
            }
            Some(l) => l as usize,
            None => default,
        };
        Ok(Self { offset, limit })
    }

    fn bind(&self) -> [SqlValue; 2] {
        [SqlValue::Integer(self.limit as i64), SqlValue::Integer(self.offset as i64)]
    }
}

/// Sort key for listings
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: FieldPath,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn parse(field: Option<&str>, order: Option<&str>, schema: &CollectionSchema) -> Result<Self> {
        let field = FieldPath::parse(field.unwrap_or(schema.timestamp))?;
        let order = match order.map(|o| o.trim().to_ascii_lowercase()) {
            None => SortOrder::Desc,
            Some(o) if o == "desc" => SortOrder::Desc,
            Some(o) if o == "asc" => SortOrder::Asc,
            Some(o) => return Err(RelmcpError::invalid(format!("sort order must be asc or desc, got {:?}", o))),
        };
        Ok(Self { field, order })
    }

    pub fn newest_first(schema: &CollectionSchema) -> Result<Self> {
        Ok(Self {
            field: FieldPath::parse(schema.timestamp)?,
            order: SortOrder::Desc,
        })
    }

    fn keyword(&self) -> &'static str {
        match self.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// How the rows of a page are emitted
#[derive(Debug, Clone)]
pub struct Listing {
    pub page: Page,
    pub projection: ProjectionSpec,
    pub group_by: Option<String>,
}

impl Listing {
    pub fn finish(&self, nodes: &[Node], schema: &CollectionSchema) -> Value {
        let items: Vec<Value> = nodes.iter().map(|n| self.projection.apply(n, schema)).collect();
        match &self.group_by {
            Some(field) => group_values(items, field),
            None => Value::Array(items),
        }
    }
}

/// A collection and the layout of its payloads
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub collection: &'a str,
    pub schema: &'a CollectionSchema,
}

fn json_path(dotted: &str) -> String {
    format!("$.{}", dotted)
}

/// Rows of `target` matching `condition` (placeholders start at `?2`),
/// sorted, paged and shaped.
pub(crate) fn list_where(
    conn: &Connection,
    target: Target<'_>,
    condition: &str,
    mut args: Vec<SqlValue>,
    sort: Option<&SortSpec>,
    listing: &Listing,
) -> Result<Value> {
    let mut bound = vec![SqlValue::Text(target.collection.to_string())];
    bound.append(&mut args);

    let order_by = match sort {
        Some(sort) => {
            bound.push(SqlValue::Text(sort.field.json_path()));
            format!("json_extract(body_json, ?{}) {}, rowid", bound.len(), sort.keyword())
        }
        None => "rowid".to_string(),
    };
    let [limit, offset] = listing.page.bind();
    bound.push(limit);
    bound.push(offset);

    let sql = format!(
        "SELECT {} FROM nodes WHERE collection = ?1 AND ({}) ORDER BY {} LIMIT ?{} OFFSET ?{}",
        NODE_COLUMNS,
        condition,
        order_by,
        bound.len() - 1,
        bound.len()
    );
    let nodes = query_nodes(conn, &sql, params_from_iter(bound))?;
    Ok(listing.finish(&nodes, target.schema))
}

/// One node by `_key` or full `_id`, projected; `None` when absent or in another collection.
pub fn by_key(conn: &Connection, target: Target<'_>, key: &str, projection: &ProjectionSpec) -> Result<Option<Value>> {
    let key = key.trim();
    let id = if key.contains('/') {
        split_id(key)?;
        key.to_string()
    } else {
        validate_key(key)?;
        node_id(target.collection, key)
    };
    let sql = format!("SELECT {} FROM nodes WHERE node_id = ?1 AND collection = ?2", NODE_COLUMNS);
    let nodes = query_nodes(conn, &sql, [id.as_str(), target.collection])?;
    Ok(nodes.first().map(|n| projection.apply(n, target.schema)))
}

/// Nodes whose timestamp lies in `[start, end]`, newest first.
pub fn by_date_range(conn: &Connection, target: Target<'_>, start: f64, end: f64, listing: &Listing) -> Result<Value> {
    if !start.is_finite() || !end.is_finite() {
        return Err(RelmcpError::invalid("date range bounds must be finite numbers"));
    }
    let ts = json_path(target.schema.timestamp);
    let sort = SortSpec::newest_first(target.schema)?;
    list_where(
        conn,
        target,
        "json_extract(body_json, ?2) >= ?3 AND json_extract(body_json, ?2) <= ?4",
        vec![SqlValue::Text(ts), SqlValue::Real(start), SqlValue::Real(end)],
        Some(&sort),
        listing,
    )
}

/// Case-insensitive containment over the collection's search fields.
pub fn search(conn: &Connection, target: Target<'_>, query: &str, listing: &Listing) -> Result<Value> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Err(RelmcpError::invalid("search query must not be empty"));
    }
    let mut args = vec![SqlValue::Text(needle)];
    let mut clauses = Vec::new();
    for field in target.schema.search_fields {
        args.push(SqlValue::Text(json_path(field)));
        clauses.push(format!(
            "instr({}(coalesce(json_extract(body_json, ?{}), '')), ?2) > 0",
            FOLD_LOWER,
            args.len() + 1
        ));
    }
    list_where(conn, target, &clauses.join(" OR "), args, None, listing)
}

fn to_json(value: SqlValue) -> Option<Value> {
    match value {
        SqlValue::Text(s) => Some(Value::String(s)),
        SqlValue::Integer(i) => Some(Value::from(i)),
        SqlValue::Real(f) => Some(Value::from(f)),
        SqlValue::Null | SqlValue::Blob(_) => None,
    }
}

/// Distinct members of a list field, sorted, optionally for one node.
fn distinct_members(conn: &Connection, target: Target<'_>, list: &str, key: Option<&str>, page: Page) -> Result<Vec<Value>> {
    let mut sql = String::from(
        "SELECT DISTINCT j.value FROM nodes, json_each(nodes.body_json, ?2) AS j WHERE nodes.collection = ?1",
    );
    let [limit, offset] = page.bind();
    let mut args = vec![SqlValue::Text(target.collection.to_string()), SqlValue::Text(json_path(list)), limit, offset];
    if let Some(key) = key {
        args.push(SqlValue::Text(key.to_string()));
        sql.push_str(" AND nodes.node_key = ?5");
    }
    sql.push_str(" AND j.value IS NOT NULL ORDER BY j.value LIMIT ?3 OFFSET ?4");

    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), |row| row.get::<_, SqlValue>(0))?;
    let mut out = Vec::new();
    for row in rows {
        if let Some(v) = to_json(row?) {
            out.push(v);
        }
    }
    Ok(out)
}

/// Distinct categories and subcategories.
pub fn categories(conn: &Connection, target: Target<'_>, key: Option<&str>, page: Page) -> Result<Value> {
    let categories = distinct_members(conn, target, "category", key, page)?;
    let subcategories = distinct_members(conn, target, "subcategory", key, page)?;
    Ok(json!({ "categories": categories, "subcategories": subcategories }))
}

/// Distinct non-null authors.
pub fn authors(conn: &Connection, target: Target<'_>, key: Option<&str>, page: Page) -> Result<Value> {
    let mut sql = String::from(
        "SELECT DISTINCT json_extract(body_json, '$.author') FROM nodes \
         WHERE collection = ?1 AND json_extract(body_json, '$.author') IS NOT NULL",
    );
    let [limit, offset] = page.bind();
    let mut args = vec![SqlValue::Text(target.collection.to_string()), limit, offset];
    if let Some(key) = key {
        args.push(SqlValue::Text(key.to_string()));
        sql.push_str(" AND node_key = ?4");
    }
    sql.push_str(" ORDER BY 1 LIMIT ?2 OFFSET ?3");

    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), |row| row.get::<_, SqlValue>(0))?;
    let mut out = Vec::new();
    for row in rows {
        if let Some(v) = to_json(row?) {
            out.push(v);
        }
    }
    Ok(Value::Array(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{Detail, ARTICLE_SCHEMA, DOCUMENT_SCHEMA};
    use crate::test_support::{add_node, article, store_fixture, T0};

    const ARTICLES: Target<'static> = Target { collection: "Article", schema: &ARTICLE_SCHEMA };
    const DOCUMENTS: Target<'static> = Target { collection: "Document", schema: &DOCUMENT_SCHEMA };

    fn listing(limit: usize, detail: Detail) -> Listing {
        Listing {
            page: Page { offset: 0, limit },
            projection: detail.into(),
            group_by: None,
        }
    }

    fn keys(value: &Value) -> Vec<&str> {
        value.as_array().unwrap().iter().filter_map(|v| v["_key"].as_str()).collect()
    }

    #[test]
    fn test_page_validation() {
        assert_eq!(Page::new(None, None, 10, 100).unwrap(), Page { offset: 0, limit: 10 });
        assert!(Page::new(Some(-1), None, 10, 100).is_err());
        assert!(Page::new(None, Some(0), 10, 100).is_err());
        assert!(Page::new(None, Some(101), 10, 100).is_err());
    }

    #[test]
    fn test_sort_spec_parse() {
        let sort = SortSpec::parse(None, None, &ARTICLE_SCHEMA).unwrap();
        assert_eq!(sort.field.as_str(), "default.epoch_time");
        assert_eq!(sort.order, SortOrder::Desc);
        assert!(SortSpec::parse(Some("default.title"), Some("sideways"), &ARTICLE_SCHEMA).is_err());
        assert!(SortSpec::parse(Some("title; DROP TABLE nodes"), None, &ARTICLE_SCHEMA).is_err());
    }

    #[test]
    fn test_by_key_and_id() {
        let fx = store_fixture();
        let found = by_key(&fx.conn, ARTICLES, "a3", &ProjectionSpec::Minimal).unwrap().unwrap();
        assert_eq!(found, json!({"_key": "a3", "title": "Title a3"}));
        assert!(by_key(&fx.conn, ARTICLES, "Article/a3", &ProjectionSpec::Full).unwrap().is_some());
        // an identity from another collection is not an article
        assert!(by_key(&fx.conn, ARTICLES, "Document/d1", &ProjectionSpec::Full).unwrap().is_none());
        assert!(by_key(&fx.conn, DOCUMENTS, "d9", &ProjectionSpec::Full).unwrap().is_none());
    }

    #[test]
    fn test_date_range_inclusive_newest_first() {
        let fx = store_fixture();
        let out = by_date_range(&fx.conn, ARTICLES, T0 as f64, (T0 + 200) as f64, &listing(10, Detail::Minimal)).unwrap();
        assert_eq!(keys(&out), vec!["a4", "a2", "a1"]);
        let docs = by_date_range(&fx.conn, DOCUMENTS, T0 as f64, (T0 + 100) as f64, &listing(10, Detail::Summary)).unwrap();
        assert_eq!(keys(&docs), vec!["d2", "d1"]);
        assert_eq!(docs[0]["description"], "About a2");
    }

    #[test]
    fn test_search_case_insensitive() {
        let fx = store_fixture();
        let out = search(&fx.conn, ARTICLES, "TITLE A4", &listing(10, Detail::Minimal)).unwrap();
        assert_eq!(keys(&out), vec!["a4"]);
        let docs = search(&fx.conn, DOCUMENTS, "body text", &listing(2, Detail::Minimal)).unwrap();
        assert_eq!(keys(&docs), vec!["d1", "d2"]);
        assert!(search(&fx.conn, ARTICLES, "  ", &listing(2, Detail::Minimal)).is_err());
    }

    #[test]
    fn test_search_folds_accented_capitals() {
        let mut fx = store_fixture();
        let mut school = article("u1", T0, "world", "Ada");
        school["default"]["title"] = json!("École ouverte à Zürich");
        add_node(&mut fx.conn, "Article", school);

        for query in ["école", "ÉCOLE", "zürich", "ZÜRICH"] {
            let out = search(&fx.conn, ARTICLES, query, &listing(10, Detail::Minimal)).unwrap();
            assert_eq!(keys(&out), vec!["u1"], "query {:?}", query);
        }
    }

    #[test]
    fn test_categories_distinct_sorted() {
        let fx = store_fixture();
        let page = Page { offset: 0, limit: 100 };
        let out = categories(&fx.conn, ARTICLES, None, page).unwrap();
        assert_eq!(out["categories"], json!(["sports", "world"]));
        assert_eq!(out["subcategories"], json!(["sports-sub", "world-sub"]));
        let one = categories(&fx.conn, ARTICLES, Some("a3"), page).unwrap();
        assert_eq!(one["categories"], json!(["sports"]));
    }

    #[test]
    fn test_authors_distinct() {
        let fx = store_fixture();
        let page = Page { offset: 0, limit: 100 };
        assert_eq!(authors(&fx.conn, ARTICLES, None, page).unwrap(), json!(["Ada", "Bo", "Cy"]));
        assert_eq!(
            authors(&fx.conn, ARTICLES, None, Page { offset: 1, limit: 1 }).unwrap(),
            json!(["Bo"])
        );
        assert_eq!(authors(&fx.conn, DOCUMENTS, Some("d4"), page).unwrap(), json!(["Blogger"]));
    }

    #[test]
    fn test_grouped_listing() {
        let fx = store_fixture();
        let grouped = Listing {
            page: Page { offset: 0, limit: 10 },
            projection: ProjectionSpec::Full,
            group_by: Some("author".to_string()),
        };
        let out = by_date_range(&fx.conn, ARTICLES, (T0 - 100_000) as f64, (T0 + 10_000) as f64, &grouped).unwrap();
        let groups = out.as_object().unwrap();
        assert_eq!(groups.len(), 3);
        let total: usize = groups.values().map(|v| v.as_array().unwrap().len()).sum();
        assert_eq!(total, 5);
    }
}
