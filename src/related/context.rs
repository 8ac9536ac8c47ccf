//! Endpoint registry and the per-call store context.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use url::Url;

use crate::config::{Config, GraphConfig, RankingConfig};
use crate::db::Db;
use crate::error::{RelmcpError, Result};
use crate::graph::SqliteGraphStore;

/// Canonical form of an endpoint URL, so `http://host:8529` and
/// `HTTP://host:8529/` resolve to the same store.
pub fn normalize_endpoint(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim())
        .map_err(|e| RelmcpError::invalid(format!("db_url is not a valid URL ({}): {:?}", e, raw)))?;
    Ok(url.to_string())
}

/// Configured endpoints, keyed by normalized URL.
#[derive(Debug, Clone)]
pub struct StoreRegistry {
    stores: HashMap<String, Db>,
    graph: Arc<GraphConfig>,
    ranking: RankingConfig,
}

impl StoreRegistry {
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_millis(config.store.busy_timeout_ms);
        let mut stores = HashMap::new();
        for (endpoint, path) in &config.store.endpoints {
            let key = normalize_endpoint(endpoint)
                .map_err(|e| RelmcpError::Config(format!("store.endpoints: {}", e)))?;
            stores.insert(key, Db::new(path).with_busy_timeout(timeout));
        }
        Ok(Self {
            stores,
            graph: Arc::new(config.graph.clone()),
            ranking: config.ranking.clone(),
        })
    }

    /// Every configured endpoint with its database.
    pub fn endpoints(&self) -> impl Iterator<Item = (&str, &Db)> {
        self.stores.iter().map(|(k, db)| (k.as_str(), db))
    }

    /// Look up the store behind a caller-supplied `db_url`.
    pub fn resolve(&self, db_url: &str) -> Result<StoreContext> {
        let endpoint = normalize_endpoint(db_url)?;
        let db = self
            .stores
            .get(&endpoint)
            .cloned()
            .ok_or_else(|| RelmcpError::invalid(format!("unknown store endpoint: {}", endpoint)))?;
        Ok(StoreContext {
            endpoint,
            db,
            graph: Arc::clone(&self.graph),
            ranking: self.ranking.clone(),
        })
    }

    /// Like [`resolve`](Self::resolve), but an absent `db_url` picks the
    /// single configured endpoint.
    pub fn resolve_or_sole(&self, db_url: Option<&str>) -> Result<StoreContext> {
        if let Some(url) = db_url {
            return self.resolve(url);
        }
        let mut endpoints = self.stores.keys();
        match (endpoints.next(), endpoints.next()) {
            (Some(only), None) => self.resolve(only),
            (None, _) => Err(RelmcpError::Config("no store endpoints configured".into())),
            _ => Err(RelmcpError::invalid(
                "db_url is required when more than one store endpoint is configured",
            )),
        }
    }
}

/// Everything one discovery call needs to reach its store.
#[derive(Debug, Clone)]
pub struct StoreContext {
    pub endpoint: String,
    pub db: Db,
    pub graph: Arc<GraphConfig>,
    pub ranking: RankingConfig,
}

impl StoreContext {
    /// Run a strategy against the graph store on a read-only connection.
    pub async fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&SqliteGraphStore<'_>, &GraphConfig) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let graph = Arc::clone(&self.graph);
        self.db
            .with_read_connection(move |conn| {
                let store = SqliteGraphStore::new(conn);
                f(&store, &graph)
            })
            .await
    }

    /// Run a listing query on a read-only connection.
    pub async fn query<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection, &GraphConfig) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let graph = Arc::clone(&self.graph);
        self.db.with_read_connection(move |conn| f(conn, &graph)).await
    }
}
