//! Related-document discovery.
//!
//! Two strategies run against a [`GraphStore`](crate::graph::GraphStore):
//! direct similarity-edge traversal ([`direct`]) and path-count ranking
//! through shared intermediate vertices ([`ranking`], [`entity`]). Both take
//! a validated [`TraversalRequest`] and the graph naming of the resolved
//! [`StoreContext`].

pub mod context;
pub mod direct;
pub mod entity;
pub mod ranking;
pub mod spec;
pub mod window;

pub use context::{StoreContext, StoreRegistry};
pub use spec::{Param, TraversalRequest, TraversalSpec};
pub use window::TimeWindow;

use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::shape::group_by;

/// Direction of a path-count sort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A candidate and the number of qualifying paths that reached it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathGroup<K> {
    pub key: K,
    pub paths: usize,
}

/// Count occurrences per key, in first-seen order.
pub fn count_paths<K, I>(keys: I) -> Vec<PathGroup<K>>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = K>,
{
    group_by(keys, K::clone)
        .into_inner()
        .into_iter()
        .map(|(key, members)| PathGroup { key, paths: members.len() })
        .collect()
}

/// Sort by path count and truncate. The sort is stable, so ties keep
/// visitation order.
pub fn rank_paths<K>(mut groups: Vec<PathGroup<K>>, order: SortOrder, limit: usize) -> Vec<PathGroup<K>> {
    match order {
        SortOrder::Desc => groups.sort_by(|a, b| b.paths.cmp(&a.paths)),
        SortOrder::Asc => groups.sort_by(|a, b| a.paths.cmp(&b.paths)),
    }
    groups.truncate(limit);
    groups
}
