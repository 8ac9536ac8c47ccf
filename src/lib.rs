pub mod config;
pub mod error;
pub mod db;
pub mod graph;
pub mod related;
pub mod shape;
pub mod browse;
pub mod mcp;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::{RelmcpError, Result};
