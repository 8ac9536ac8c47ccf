use anyhow::Result;
use chrono::{DateTime, Utc};
use relmcp::db::{migrate, Db};
use relmcp::error::RelmcpError;
use relmcp::mcp::McpServer;
use relmcp::related::StoreRegistry;
use relmcp::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");
    if !matches!(command, "serve" | "verify") {
        anyhow::bail!("unknown command {:?} (expected serve or verify)", command);
    }

    let config = Config::load()?;
    init_logging(&config);

    if command == "serve" {
        run_mcp_server(config).await?;
    } else {
        run_schema_verification(&config).await?;
    }

    Ok(())
}

/// `RUST_LOG` wins over `[relmcp].log_level`. stdout carries MCP traffic, so
/// logs go to stderr.
fn init_logging(config: &Config) {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", &config.relmcp.log_level))
        .init();
}

/// Run MCP server (stdio transport)
async fn run_mcp_server(config: Config) -> Result<()> {
    let server = McpServer::new(config)?;
    server.run().await?;
    Ok(())
}

/// Apply migrations to every configured endpoint and verify its schema
async fn run_schema_verification(config: &Config) -> Result<()> {
    log::info!("Starting RelMcp v{}", env!("CARGO_PKG_VERSION"));
    let registry = StoreRegistry::from_config(config)?;

    let mut failed = 0;
    for (endpoint, db) in registry.endpoints() {
        log::info!("Endpoint {} -> {}", endpoint, db.path().display());
        match verify_store(db, &config.graph.article_collection).await {
            Ok(()) => log::info!("✓ {} verified", endpoint),
            Err(e) => {
                log::error!("{}: {}", endpoint, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} endpoint(s) failed verification", failed);
    }
    log::info!("✓ Store verification complete");
    Ok(())
}

fn rfc3339(epoch: f64) -> String {
    DateTime::<Utc>::from_timestamp(epoch as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| format!("{} (out of range)", epoch))
}

async fn verify_store(db: &Db, article_collection: &str) -> relmcp::Result<()> {
    let article_collection = article_collection.to_string();
    db.with_connection(move |conn| {
        migrate::run_migrations(conn)?;

        let missing = migrate::missing_tables(conn)?;
        if !missing.is_empty() {
            return Err(RelmcpError::Config(format!("missing tables: {}", missing.join(", "))));
        }
        log::debug!("✓ {} migrations applied", migrate::get_applied_migrations(conn)?.len());

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(RelmcpError::Config(format!("Database integrity check failed: {}", integrity)));
        }

        let (nodes, edges, graphs): (i64, i64, i64) = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM nodes), (SELECT COUNT(*) FROM edges), \
             (SELECT COUNT(DISTINCT graph_name) FROM graph_definitions)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        log::info!("{} nodes, {} edges, {} named graphs", nodes, edges, graphs);

        let span: (Option<f64>, Option<f64>) = conn.query_row(
            "SELECT MIN(CAST(json_extract(body_json, '$.default.epoch_time') AS REAL)), \
                    MAX(CAST(json_extract(body_json, '$.default.epoch_time') AS REAL)) \
             FROM nodes WHERE collection = ?1",
            [&article_collection],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if let (Some(first), Some(last)) = span {
            log::info!("Articles span {} .. {}", rfc3339(first), rfc3339(last));
        }
        Ok(())
    })
    .await
}
