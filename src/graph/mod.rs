//! Temporal relation graph reconstructed from one query result.
//!
//! One [`LivenessGraph`] per matched root entity. Nodes and edges carry the raw
//! liveness periods reported by the store; [`series`] turns those into point-in-time
//! and time-bucketed matcher sets.

mod series;

pub use series::{build_target_series, extract_matchers};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::{RelationCategory, RelationType, ResourceType, TraversalDirection};

/// Label set identifying one resource instance.
pub type Matcher = BTreeMap<String, String>;

/// Active target matchers at one bucket timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchersWithTimestamp {
    pub timestamp: i64,
    pub matchers: Vec<Matcher>,
}

/// Closed interval `[start, end]` in unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisiblePeriod {
    pub start: i64,
    pub end: i64,
}

impl VisiblePeriod {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Intersection of two periods, `None` when they are disjoint.
    pub fn overlap(&self, other: &VisiblePeriod) -> Option<VisiblePeriod> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(VisiblePeriod { start, end })
    }

    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// One resource instance observed in a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLiveness {
    pub resource_id: String,
    pub resource_type: ResourceType,
    pub labels: BTreeMap<String, String>,
    pub raw_periods: Vec<VisiblePeriod>,
}

/// One relation instance observed in a result. `from_id` is always the traversal
/// parent, whatever the relation's schema direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeLiveness {
    pub relation_id: String,
    pub relation_type: RelationType,
    pub category: RelationCategory,
    pub direction: Option<TraversalDirection>,
    pub from_id: String,
    pub to_id: String,
    pub raw_periods: Vec<VisiblePeriod>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LivenessGraph {
    pub nodes: BTreeMap<String, NodeLiveness>,
    pub edges: BTreeMap<String, EdgeLiveness>,
    pub traversal_errors: Vec<String>,
    pub query_start: i64,
    pub query_end: i64,
    /// node id -> ids of edges leaving it.
    #[serde(skip)]
    adjacency: BTreeMap<String, Vec<String>>,
}

impl LivenessGraph {
    pub fn new(query_start: i64, query_end: i64) -> Self {
        Self {
            query_start,
            query_end,
            ..Default::default()
        }
    }

    /// Insert a node unless its id is already present. Returns whether it was inserted.
    pub fn add_node(&mut self, node: NodeLiveness) -> bool {
        if self.nodes.contains_key(&node.resource_id) {
            return false;
        }
        self.nodes.insert(node.resource_id.clone(), node);
        true
    }

    /// Insert an edge unless its relation id is already present. A relation walked
    /// back from its far end keeps the first orientation seen.
    pub fn add_edge(&mut self, edge: EdgeLiveness) -> bool {
        if self.edges.contains_key(&edge.relation_id) {
            return false;
        }
        self.adjacency
            .entry(edge.from_id.clone())
            .or_default()
            .push(edge.relation_id.clone());
        self.edges.insert(edge.relation_id.clone(), edge);
        true
    }

    pub fn get_node(&self, id: &str) -> Option<&NodeLiveness> {
        self.nodes.get(id)
    }

    pub fn get_edge(&self, id: &str) -> Option<&EdgeLiveness> {
        self.edges.get(id)
    }

    /// Edges leaving `node_id`, in insertion order.
    pub fn outgoing_edges(&self, node_id: &str) -> Vec<&EdgeLiveness> {
        self.adjacency
            .get(node_id)
            .map(|ids| ids.iter().filter_map(|id| self.edges.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn add_traversal_error(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        log::debug!("traversal error: {}", msg);
        self.traversal_errors.push(msg);
    }

    pub fn has_errors(&self) -> bool {
        !self.traversal_errors.is_empty()
    }

    /// Labels of every node of `target_type`, keyed by resource id.
    pub fn extract_target_matchers_with_id(
        &self,
        target_type: &ResourceType,
    ) -> BTreeMap<String, Matcher> {
        self.nodes
            .values()
            .filter(|n| &n.resource_type == target_type)
            .map(|n| (n.resource_id.clone(), n.labels.clone()))
            .collect()
    }

    /// A node's periods clipped to the query window.
    pub fn visible_periods(&self, node_id: &str) -> Vec<VisiblePeriod> {
        let window = VisiblePeriod::new(self.query_start, self.query_end);
        self.nodes
            .get(node_id)
            .map(|n| {
                n.raw_periods
                    .iter()
                    .filter_map(|p| p.overlap(&window))
                    .collect()
            })
            .unwrap_or_default()
    }
}
