//! Small news graph shared by unit tests.
//!
//! Articles a1..a5 sit around `T0`; a5 is far outside any short window.
//! `newsGraph` holds similarity, closeness and mentions edges;
//! `articleGraph` holds article-to-entity edges.

use rusqlite::Connection;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::db::{migrate, Db};
use crate::graph::loader::{define_graph, insert_edges, insert_nodes, parse_edge, parse_node};

pub const T0: i64 = 1_700_000_000;

pub struct Fixture {
    pub conn: Connection,
    pub db: Db,
    pub _dir: TempDir,
}

pub fn article(key: &str, epoch: i64, category: &str, author: &str) -> Value {
    json!({
        "_key": key,
        "category": [category],
        "subcategory": [format!("{}-sub", category)],
        "author": author,
        "default": {
            "title": format!("Title {}", key),
            "summary": format!("Summary {}", key),
            "description": format!("Description {}", key),
            "url": format!("https://news.example/{}", key),
            "image": format!("https://img.example/{}.jpg", key),
            "docID": format!("doc-{}", key),
            "epoch_time": epoch,
            "lang": "en"
        },
        "default_summary": format!("Short {}", key),
        "default_image": format!("https://img.example/{}-default.jpg", key),
        "read": [
            {
                "url": format!("https://read.example/{}", key),
                "title": format!("Read {}", key),
                "description": "read description",
                "docID": format!("read-{}", key),
                "image": "https://img.example/read.jpg",
                "summary": "read summary"
            },
            { "url": format!("https://read.example/{}-2", key), "title": "second read" }
        ],
        "watch": [
            {
                "videoID": format!("vid-{}", key),
                "title": format!("Watch {}", key),
                "description": "watch description",
                "image": "https://img.example/watch.jpg",
                "url": format!("https://watch.example/{}", key)
            }
        ],
        "source_tags": ["reuters", "ap"]
    })
}

fn document(key: &str, url_of: &str, source: &str, epoch: i64) -> Value {
    json!({
        "_key": key,
        "url": format!("https://news.example/{}", url_of),
        "source": source,
        "title": format!("Doc {}", key),
        "description": format!("About {}", url_of),
        "content": format!("Body text for {}", key),
        "epoch_published": epoch,
        "author": if source == "wire" { "Wire Desk" } else { "Blogger" },
        "category": ["world"],
        "subcategory": ["wires"]
    })
}

fn edge(key: &str, from: &str, to: &str, extra: Value) -> Value {
    let mut body = json!({ "_key": key, "_from": from, "_to": to });
    if let (Some(map), Value::Object(extra)) = (body.as_object_mut(), extra) {
        map.extend(extra);
    }
    body
}

/// Write the fixture graph into an open, migrated connection.
pub fn populate(conn: &mut Connection) {
    let articles = vec![
        article("a1", T0, "world", "Ada"),
        article("a2", T0 + 100, "world", "Ada"),
        article("a3", T0 + 5000, "sports", "Bo"),
        article("a4", T0 + 200, "world", "Cy"),
        article("a5", T0 - 50_000, "world", "Cy"),
    ];
    let documents = vec![
        document("d1", "a1", "wire", T0),
        document("d2", "a2", "wire", T0 + 100),
        document("d3", "a4", "wire", T0 + 200),
        document("d4", "a3", "blog", T0 + 5000),
    ];
    let entities = vec![
        json!({"_key": "e_mars", "name": "Mars"}),
        json!({"_key": "e_nasa", "name": "NASA"}),
        json!({"_key": "e_zero", "name": "Zero"}),
    ];

    let mut nodes = Vec::new();
    nodes.extend(articles.into_iter().map(|v| parse_node(v, Some("Article")).unwrap()));
    nodes.extend(documents.into_iter().map(|v| parse_node(v, Some("Document")).unwrap()));
    nodes.extend(entities.into_iter().map(|v| parse_node(v, Some("Entity")).unwrap()));
    insert_nodes(conn, &nodes).unwrap();

    let edges = vec![
        ("similarity", edge("s1", "Article/a1", "Article/a2", json!({"sim_value": 0.2}))),
        ("similarity", edge("s2", "Article/a1", "Article/a3", json!({"sim_value": 0.9}))),
        ("similarity", edge("s3", "Article/a2", "Article/a4", json!({"sim_value": 0.1}))),
        ("similarity", edge("s4", "Article/a3", "Article/a4", json!({"sim_value": 0.3}))),
        ("closeness", edge("c1", "Article/a1", "Article/a5", json!({"origin": ["ip1"]}))),
        ("closeness", edge("c2", "Article/a4", "Article/a1", json!({"origin": ["ip2"]}))),
        ("closeness", edge("c3", "Article/a2", "Article/a4", json!({"origin": ["ip1"]}))),
        ("mentions", edge("m1", "Document/d1", "Entity/e_mars", json!({"ne_tf": 2, "np_tf": 0, "ep_tf": 0}))),
        ("mentions", edge("m2", "Document/d1", "Entity/e_nasa", json!({"ne_tf": 0, "np_tf": 1, "ep_tf": 0}))),
        ("mentions", edge("m3", "Document/d2", "Entity/e_mars", json!({"ne_tf": 1}))),
        ("mentions", edge("m4", "Document/d2", "Entity/e_nasa", json!({"ep_tf": "3"}))),
        ("mentions", edge("m5", "Document/d3", "Entity/e_mars", json!({"ne_tf": 1}))),
        ("mentions", edge("m6", "Document/d4", "Entity/e_mars", json!({"ne_tf": 4}))),
        ("mentions", edge("m7", "Document/d1", "Entity/e_zero", json!({"ne_tf": 0, "np_tf": 0, "ep_tf": 0}))),
        ("mentions", edge("m8", "Document/d3", "Entity/e_zero", json!({"ne_tf": 5}))),
        ("article_entities", edge("ae1", "Article/a1", "Entity/e_mars", json!({}))),
        ("article_entities", edge("ae2", "Article/a2", "Entity/e_mars", json!({}))),
        ("article_entities", edge("ae3", "Article/a3", "Entity/e_mars", json!({}))),
        ("article_entities", edge("ae4", "Article/a4", "Entity/e_nasa", json!({}))),
        ("article_entities", edge("ae5", "Article/a5", "Entity/e_mars", json!({}))),
    ];
    let edges: Vec<_> = edges
        .into_iter()
        .map(|(collection, v)| parse_edge(v, Some(collection)).unwrap())
        .collect();
    insert_edges(conn, &edges).unwrap();

    define_graph(
        conn,
        "newsGraph",
        &["similarity".into(), "closeness".into(), "mentions".into()],
    )
    .unwrap();
    define_graph(conn, "articleGraph", &["article_entities".into()]).unwrap();
}

/// Add one more vertex to a populated fixture.
pub fn add_node(conn: &mut Connection, collection: &str, value: Value) {
    let node = parse_node(value, Some(collection)).unwrap();
    insert_nodes(conn, &[node]).unwrap();
}

/// Add one more edge to a populated fixture.
pub fn add_edge(conn: &mut Connection, collection: &str, value: Value) {
    let edge = parse_edge(value, Some(collection)).unwrap();
    insert_edges(conn, &[edge]).unwrap();
}

pub fn edge_value(key: &str, from: &str, to: &str, extra: Value) -> Value {
    edge(key, from, to, extra)
}

/// Migrated, populated store in a temp directory.
pub fn store_fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let db = Db::new(dir.path().join("news.db"));
    let mut conn = db.open_connection().unwrap();
    migrate::run_migrations(&mut conn).unwrap();
    populate(&mut conn);
    Fixture { conn, db, _dir: dir }
}
