//! Caller parameters normalized into a validated traversal request.
//!
//! Validation is pure: nothing here touches the store, so a malformed call
//! fails with `InvalidArgument` before any connection is opened.

use crate::error::{RelmcpError, Result};
use crate::graph::validate_collection;

/// A parameter a discovery operation may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Start,
    Depth,
    EdgeCollection,
    Threshold,
    Window,
    Category,
    Limit,
    Terms,
    ReferenceTime,
}

impl Param {
    fn name(self) -> &'static str {
        match self {
            Param::Start => "start identity",
            Param::Depth => "depth",
            Param::EdgeCollection => "edge collection",
            Param::Threshold => "weight threshold",
            Param::Window => "window half-width",
            Param::Category => "category",
            Param::Limit => "limit",
            Param::Terms => "terms",
            Param::ReferenceTime => "reference timestamp",
        }
    }
}

/// Unvalidated traversal parameters as received from a caller.
#[derive(Debug, Clone, Default)]
pub struct TraversalSpec {
    pub start: Option<String>,
    pub depth: Option<i64>,
    pub edge_collection: Option<String>,
    pub threshold: Option<f64>,
    pub window: Option<f64>,
    pub category: Option<String>,
    pub origins: Option<Vec<String>>,
    pub terms: Option<Vec<String>>,
    pub reference_time: Option<f64>,
    pub limit: Option<i64>,
}

impl TraversalSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn depth(mut self, depth: i64) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn edge_collection(mut self, collection: impl Into<String>) -> Self {
        self.edge_collection = Some(collection.into());
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn window(mut self, half_width: f64) -> Self {
        self.window = Some(half_width);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn origins(mut self, origins: Vec<String>) -> Self {
        self.origins = Some(origins);
        self
    }

    pub fn terms(mut self, terms: Vec<String>) -> Self {
        self.terms = Some(terms);
        self
    }

    pub fn reference_time(mut self, epoch: f64) -> Self {
        self.reference_time = Some(epoch);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check every supplied value and require the parameters in `required`.
    pub fn validate(&self, required: &[Param], max_depth: u32) -> Result<TraversalRequest> {
        for param in required {
            if !self.has(*param) {
                return Err(RelmcpError::invalid(format!("missing required parameter: {}", param.name())));
            }
        }

        let start = match &self.start {
            Some(raw) if raw.trim().is_empty() => {
                return Err(RelmcpError::invalid("start identity must not be empty"));
            }
            Some(raw) => raw.trim().to_string(),
            None => String::new(),
        };

        let depth = match self.depth {
            Some(d) if d < 1 => {
                return Err(RelmcpError::invalid(format!("depth must be a positive integer, got {}", d)));
            }
            Some(d) if d > i64::from(max_depth) => {
                return Err(RelmcpError::invalid(format!("depth {} exceeds the maximum of {}", d, max_depth)));
            }
            Some(d) => d as u32,
            None => 1,
        };

        if let Some(collection) = &self.edge_collection {
            validate_collection(collection)?;
        }

        if let Some(threshold) = self.threshold {
            if !threshold.is_finite() {
                return Err(RelmcpError::invalid("weight threshold must be a finite number"));
            }
        }

        if let Some(window) = self.window {
            if !window.is_finite() || window < 0.0 {
                return Err(RelmcpError::invalid("window half-width must be a non-negative number"));
            }
        }

        if let Some(epoch) = self.reference_time {
            if !epoch.is_finite() {
                return Err(RelmcpError::invalid("reference timestamp must be a finite number"));
            }
        }

        let category = match &self.category {
            Some(c) if c.trim().is_empty() => return Err(RelmcpError::invalid("category must not be empty")),
            other => other.clone(),
        };

        let limit = match self.limit {
            Some(n) if n < 1 => return Err(RelmcpError::invalid(format!("limit must be at least 1, got {}", n))),
            Some(n) => Some(n as usize),
            None => None,
        };

        let terms: Vec<String> = self
            .terms
            .iter()
            .flatten()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        if required.contains(&Param::Terms) && terms.is_empty() {
            return Err(RelmcpError::invalid("terms must name at least one entity"));
        }

        // an empty origin set behaves like none supplied
        let origins = self.origins.clone().filter(|o| !o.is_empty());

        Ok(TraversalRequest {
            start,
            depth,
            edge_collection: self.edge_collection.clone(),
            threshold: self.threshold,
            window: self.window,
            category,
            origins,
            terms,
            reference_time: self.reference_time,
            limit,
        })
    }

    fn has(&self, param: Param) -> bool {
        match param {
            Param::Start => self.start.is_some(),
            Param::Depth => self.depth.is_some(),
            Param::EdgeCollection => self.edge_collection.is_some(),
            Param::Threshold => self.threshold.is_some(),
            Param::Window => self.window.is_some(),
            Param::Category => self.category.is_some(),
            Param::Limit => self.limit.is_some(),
            Param::Terms => self.terms.is_some(),
            Param::ReferenceTime => self.reference_time.is_some(),
        }
    }
}

/// A validated traversal request.
#[derive(Debug, Clone)]
pub struct TraversalRequest {
    pub start: String,
    pub depth: u32,
    pub edge_collection: Option<String>,
    pub threshold: Option<f64>,
    pub window: Option<f64>,
    pub category: Option<String>,
    pub origins: Option<Vec<String>>,
    pub terms: Vec<String>,
    pub reference_time: Option<f64>,
    pub limit: Option<usize>,
}

fn missing(param: Param) -> RelmcpError {
    RelmcpError::invalid(format!("missing required parameter: {}", param.name()))
}

impl TraversalRequest {
    pub fn edge_collection(&self) -> Result<&str> {
        self.edge_collection.as_deref().ok_or_else(|| missing(Param::EdgeCollection))
    }

    pub fn threshold(&self) -> Result<f64> {
        self.threshold.ok_or_else(|| missing(Param::Threshold))
    }

    pub fn window(&self) -> Result<f64> {
        self.window.ok_or_else(|| missing(Param::Window))
    }

    pub fn category(&self) -> Result<&str> {
        self.category.as_deref().ok_or_else(|| missing(Param::Category))
    }

    pub fn reference_time(&self) -> Result<f64> {
        self.reference_time.ok_or_else(|| missing(Param::ReferenceTime))
    }

    pub fn limit(&self) -> Result<usize> {
        self.limit.ok_or_else(|| missing(Param::Limit))
    }
}
