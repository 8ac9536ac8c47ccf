use clap::Parser;
use relmcp::db::migrate;
use relmcp::graph::loader::{
    define_graph, insert_edges, insert_nodes, parse_edge, parse_graph_spec, parse_node, read_json_lines,
};
use relmcp::related::StoreRegistry;
use relmcp::Config;
use std::path::PathBuf;
use std::time::Instant;
use anyhow::{Context, Result};

#[derive(Parser, Debug)]
#[command(name = "load")]
#[command(about = "Import JSON-lines vertex and edge exports into a configured store endpoint")]
struct Args {
    /// Endpoint URL as configured under [store.endpoints] (optional with a single endpoint)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// JSON-lines vertex file; repeatable
    #[arg(short, long)]
    nodes: Vec<PathBuf>,

    /// JSON-lines edge file; repeatable
    #[arg(short = 'E', long)]
    edges: Vec<PathBuf>,

    /// Collection for records without an `_id` (defaults to the file stem)
    #[arg(short, long)]
    collection: Option<String>,

    /// Named graph declaration, `name=collection1,collection2`; repeatable
    #[arg(short, long)]
    graph: Vec<String>,
}

fn collection_for(args: &Args, path: &PathBuf) -> Option<String> {
    args.collection
        .clone()
        .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(String::from))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.nodes.is_empty() && args.edges.is_empty() && args.graph.is_empty() {
        anyhow::bail!("nothing to do: pass --nodes, --edges or --graph");
    }

    let config = Config::load()?;
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", &config.relmcp.log_level))
        .init();
    let registry = StoreRegistry::from_config(&config)?;
    let ctx = registry.resolve_or_sole(args.endpoint.as_deref())?;
    log::info!("Loading into {} ({})", ctx.endpoint, ctx.db.path().display());

    // Parse everything before touching the database
    let started = Instant::now();
    let mut nodes = Vec::new();
    for path in &args.nodes {
        let collection = collection_for(&args, path);
        for value in read_json_lines(path)? {
            nodes.push(
                parse_node(value, collection.as_deref())
                    .with_context(|| format!("in {}", path.display()))?,
            );
        }
    }
    let mut edges = Vec::new();
    for path in &args.edges {
        let collection = collection_for(&args, path);
        for value in read_json_lines(path)? {
            edges.push(
                parse_edge(value, collection.as_deref())
                    .with_context(|| format!("in {}", path.display()))?,
            );
        }
    }
    let graphs = args
        .graph
        .iter()
        .map(|spec| parse_graph_spec(spec))
        .collect::<relmcp::Result<Vec<_>>>()?;
    log::info!("Parsed {} vertices and {} edges", nodes.len(), edges.len());

    let (node_count, edge_count) = ctx
        .db
        .with_connection(move |conn| {
            migrate::run_migrations(conn)?;
            let node_count = insert_nodes(conn, &nodes)?;
            let edge_count = insert_edges(conn, &edges)?;
            for (name, collections) in &graphs {
                define_graph(conn, name, collections)?;
                log::info!("Graph {} covers {}", name, collections.join(", "));
            }
            Ok((node_count, edge_count))
        })
        .await?;

    log::info!(
        "✓ Loaded {} vertices and {} edges in {:.2}s",
        node_count,
        edge_count,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
