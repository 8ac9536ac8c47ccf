use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::related::SortOrder;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relmcp: RelmcpConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub browse: BrowseConfig,
}

/// RelMcp-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelmcpConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RelmcpConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Graph store endpoints.
///
/// Each key is the endpoint URL callers pass as `db_url`; the value is the
/// SQLite database file that backs it.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub endpoints: BTreeMap<String, PathBuf>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Names of graphs, collections and edge fields inside the store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub similarity_graph: String,
    pub entity_graph: String,
    pub article_collection: String,
    pub document_collection: String,
    pub entity_collection: String,
    pub article_entity_edges: String,
    pub listed_edge_collections: Vec<String>,
    pub weight_field: String,
    pub origin_field: String,
    pub term_frequency_fields: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            similarity_graph: "newsGraph".to_string(),
            entity_graph: "articleGraph".to_string(),
            article_collection: "Article".to_string(),
            document_collection: "Document".to_string(),
            entity_collection: "Entity".to_string(),
            article_entity_edges: "article_entities".to_string(),
            listed_edge_collections: vec![
                "edges".to_string(),
                "closeness".to_string(),
                "connections".to_string(),
            ],
            weight_field: "sim_value".to_string(),
            origin_field: "origin".to_string(),
            term_frequency_fields: vec![
                "ne_tf".to_string(),
                "np_tf".to_string(),
                "ep_tf".to_string(),
            ],
        }
    }
}

/// Path-ranking configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub shared_source_order: SortOrder,
    pub origin_order: SortOrder,
    pub shared_identity_order: SortOrder,
    pub max_depth: u32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            shared_source_order: SortOrder::Desc,
            origin_order: SortOrder::Desc,
            shared_identity_order: SortOrder::Asc,
            max_depth: 6,
        }
    }
}

/// Listing defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowseConfig {
    pub default_limit: usize,
    pub list_limit: usize,
    pub max_limit: usize,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            list_limit: 100,
            max_limit: 1000,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in RELMCP_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("RELMCP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::from_file(&config_path)
    }

    /// Load and validate a specific config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.store.endpoints.is_empty() {
            anyhow::bail!("store.endpoints must name at least one endpoint");
        }

        for endpoint in self.store.endpoints.keys() {
            url::Url::parse(endpoint)
                .with_context(|| format!("store.endpoints key is not a URL: {}", endpoint))?;
        }

        if self.ranking.max_depth == 0 {
            anyhow::bail!("ranking.max_depth must be greater than 0");
        }

        if self.browse.default_limit == 0 || self.browse.list_limit == 0 {
            anyhow::bail!("browse limits must be greater than 0");
        }

        if self.browse.default_limit > self.browse.max_limit
            || self.browse.list_limit > self.browse.max_limit
        {
            anyhow::bail!("browse.default_limit and browse.list_limit must not exceed browse.max_limit");
        }

        if self.graph.term_frequency_fields.is_empty() {
            anyhow::bail!("graph.term_frequency_fields must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const MINIMAL: &str = r#"
[store.endpoints]
"http://localhost:8529" = "./news.db"
"#;

    #[test]
    fn test_config_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, MINIMAL).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.relmcp.log_level, "info");
        assert_eq!(config.graph.similarity_graph, "newsGraph");
        assert_eq!(config.graph.entity_graph, "articleGraph");
        assert_eq!(config.ranking.shared_identity_order, SortOrder::Asc);
        assert_eq!(config.ranking.origin_order, SortOrder::Desc);
        assert_eq!(config.browse.default_limit, 10);
        assert_eq!(config.store.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_config_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[relmcp]
log_level = "debug"

[store]
busy_timeout_ms = 100

[store.endpoints]
"http://arango.internal:8529" = "/var/lib/relmcp/news.db"

[graph]
similarity_graph = "simGraph"

[ranking]
shared_identity_order = "desc"
max_depth = 3
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.relmcp.log_level, "debug");
        assert_eq!(config.graph.similarity_graph, "simGraph");
        assert_eq!(config.graph.article_collection, "Article");
        assert_eq!(config.ranking.shared_identity_order, SortOrder::Desc);
        assert_eq!(config.ranking.max_depth, 3);
    }

    #[test]
    fn test_example_config_parses() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, include_str!("../config.example.toml")).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.store.endpoints.len(), 1);
        assert_eq!(config.graph.listed_edge_collections.len(), 3);
    }

    #[test]
    fn test_config_rejects_empty_endpoints() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[store.endpoints]\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("at least one endpoint"));
    }

    #[test]
    fn test_config_rejects_non_url_endpoint() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[store.endpoints]\n\"not a url\" = \"x.db\"\n").unwrap();

        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_config_load_from_env_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        fs::write(&path, MINIMAL).unwrap();

        let original = std::env::var("RELMCP_CONFIG").ok();
        std::env::set_var("RELMCP_CONFIG", &path);
        let config = Config::load();
        std::env::remove_var("RELMCP_CONFIG");
        if let Some(v) = original {
            std::env::set_var("RELMCP_CONFIG", v);
        }

        assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("RELMCP_CONFIG").ok();
        std::env::set_var("RELMCP_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("RELMCP_CONFIG");
        if let Some(v) = original {
            std::env::set_var("RELMCP_CONFIG", v);
        }
    }
}
