//! Turning stored nodes into caller-facing JSON.
//!
//! Listings pick a [`ProjectionSpec`]; discovery results use the fixed
//! related-article shapes in [`article`], with or without redaction.

pub mod article;
mod group;
mod projection;

pub use article::{shape_related, with_paths};
pub use group::{group_by, group_values, Grouped};
pub use projection::{Detail, ProjectionSpec};

/// Where a collection keeps the fields the projections and listings need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSchema {
    /// Field read as the title
    pub title: &'static str,
    /// Field read as the short summary
    pub summary: &'static str,
    /// Output key the summary is emitted under
    pub summary_key: &'static str,
    /// Epoch-seconds timestamp used for windows, ranges and default sorting
    pub timestamp: &'static str,
    /// Fields matched by substring search
    pub search_fields: &'static [&'static str],
}

pub const ARTICLE_SCHEMA: CollectionSchema = CollectionSchema {
    title: "default.title",
    summary: "default_summary",
    summary_key: "summary",
    timestamp: "default.epoch_time",
    search_fields: &["default.title", "default_summary", "description"],
};

pub const DOCUMENT_SCHEMA: CollectionSchema = CollectionSchema {
    title: "title",
    summary: "description",
    summary_key: "description",
    timestamp: "epoch_published",
    search_fields: &["title", "description", "content"],
};
