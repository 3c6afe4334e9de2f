//! Path enumeration over the relation schema.
//!
//! Relation opportunities for a resource type are computed once here and shared by
//! [`PathFinder`] and the query builder, so both agree on which edges exist.

use serde::Serialize;
use std::collections::HashSet;

use crate::query::DEFAULT_MAX_HOPS;
use crate::schema::{
    relation_schemas, RelationCategory, RelationSchema, RelationType, ResourceType,
    TraversalDirection,
};
use crate::{RelgraphError, Result};

/// One traversal step. The root step carries only its resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathStepV2 {
    pub resource_type: ResourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<RelationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<RelationCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<TraversalDirection>,
}

impl PathStepV2 {
    pub fn root(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            relation_type: None,
            category: None,
            direction: None,
        }
    }

    pub fn via(
        resource_type: ResourceType,
        relation_type: RelationType,
        category: RelationCategory,
        direction: TraversalDirection,
    ) -> Self {
        Self {
            resource_type,
            relation_type: Some(relation_type),
            category: Some(category),
            direction: Some(direction),
        }
    }
}

/// A full ordered path from the source type to the target type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathV2 {
    pub steps: Vec<PathStepV2>,
}

impl PathV2 {
    /// Number of relation hops (steps minus the root).
    pub fn hops(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &ResourceType> {
        self.steps.iter().map(|s| &s.resource_type)
    }
}

/// One admissible way to leave a resource type through a relation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationQueryInfo {
    pub schema: &'static RelationSchema,
    pub direction: TraversalDirection,
    /// `_outbound`/`_inbound` for dynamic relations, empty for static ones.
    pub key_suffix: &'static str,
    pub target_type: ResourceType,
    /// Column matched against the current entity.
    pub where_field: &'static str,
    /// Column holding the entity on the other end.
    pub select_field: &'static str,
}

impl RelationQueryInfo {
    fn outbound(schema: &'static RelationSchema) -> Self {
        Self {
            schema,
            direction: TraversalDirection::Outbound,
            key_suffix: match schema.category {
                RelationCategory::Static => "",
                RelationCategory::Dynamic => "_outbound",
            },
            target_type: schema.to_type.clone(),
            where_field: "source_id",
            select_field: "target_id",
        }
    }

    fn inbound(schema: &'static RelationSchema) -> Self {
        Self {
            schema,
            direction: TraversalDirection::Inbound,
            key_suffix: match schema.category {
                RelationCategory::Static => "",
                RelationCategory::Dynamic => "_inbound",
            },
            target_type: schema.from_type.clone(),
            where_field: "target_id",
            select_field: "source_id",
        }
    }

    /// Key of this opportunity inside a hop object, e.g. `system_to_pod_outbound`.
    pub fn key_name(&self) -> String {
        format!("{}{}", self.schema.relation_type, self.key_suffix)
    }
}

/// Every relation opportunity leaving `resource_type`, in registration order.
///
/// Static relations have a single direction fixed by which end `resource_type` sits
/// on. Dynamic relations are gated by `dynamic_direction`; a self-relation such as
/// `pod_to_pod` yields both directions as distinct opportunities.
pub fn relations_for_type(
    resource_type: &ResourceType,
    categories: &[RelationCategory],
    dynamic_direction: TraversalDirection,
) -> Vec<RelationQueryInfo> {
    let mut out = Vec::new();

    for schema in relation_schemas() {
        if !categories.contains(&schema.category) {
            continue;
        }

        let gate = |direction: TraversalDirection| match schema.category {
            RelationCategory::Static => true,
            RelationCategory::Dynamic => direction.permitted_by(dynamic_direction),
        };

        if &schema.from_type == resource_type && gate(TraversalDirection::Outbound) {
            out.push(RelationQueryInfo::outbound(schema));
        }
        if &schema.to_type == resource_type && gate(TraversalDirection::Inbound) {
            // A static self-relation would otherwise be offered twice.
            if schema.category == RelationCategory::Static && &schema.from_type == resource_type {
                continue;
            }
            out.push(RelationQueryInfo::inbound(schema));
        }
    }

    out
}

/// True when `required` occurs in `types` as an ordered, not necessarily
/// contiguous subsequence.
pub fn satisfies_path_constraint<'a, I>(types: I, required: &[ResourceType]) -> bool
where
    I: IntoIterator<Item = &'a ResourceType>,
{
    let mut pending = required.iter().peekable();
    for t in types {
        if pending.peek() == Some(&t) {
            pending.next();
        }
    }
    pending.peek().is_none()
}

/// Depth-bounded enumerator of concrete paths between two resource types.
#[derive(Debug, Clone)]
pub struct PathFinder {
    allowed_categories: Vec<RelationCategory>,
    dynamic_direction: TraversalDirection,
    max_hops: usize,
}

impl Default for PathFinder {
    fn default() -> Self {
        Self {
            allowed_categories: RelationCategory::ALL.to_vec(),
            dynamic_direction: TraversalDirection::Both,
            max_hops: DEFAULT_MAX_HOPS,
        }
    }
}

/// DFS frame; each branch owns its steps and visited set.
struct Frame {
    current: ResourceType,
    steps: Vec<PathStepV2>,
    visited: HashSet<ResourceType>,
}

impl PathFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict traversal to the given categories. An empty slice keeps all.
    pub fn with_allowed_categories(mut self, categories: &[RelationCategory]) -> Self {
        if !categories.is_empty() {
            self.allowed_categories = categories.to_vec();
        }
        self
    }

    pub fn with_dynamic_direction(mut self, direction: TraversalDirection) -> Self {
        self.dynamic_direction = direction;
        self
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Relation opportunities leaving `resource_type` under this finder's filters.
    pub fn relations_for(&self, resource_type: &ResourceType) -> Vec<RelationQueryInfo> {
        relations_for_type(resource_type, &self.allowed_categories, self.dynamic_direction)
    }

    /// Enumerate every path from `source` to `target` of at most `max_hops` relations
    /// that visits no resource type twice and contains `path_resource` as an ordered
    /// subsequence. Results come in DFS/registration order, not by length.
    pub fn find_all_paths(
        &self,
        source: &ResourceType,
        target: &ResourceType,
        path_resource: &[ResourceType],
    ) -> Result<Vec<PathV2>> {
        if source == target {
            return Ok(vec![PathV2 {
                steps: vec![PathStepV2::root(source.clone())],
            }]);
        }

        let mut paths = Vec::new();
        let mut stack = vec![Frame {
            current: source.clone(),
            steps: vec![PathStepV2::root(source.clone())],
            visited: HashSet::from([source.clone()]),
        }];

        while let Some(frame) = stack.pop() {
            if &frame.current == target {
                let path = PathV2 { steps: frame.steps };
                if satisfies_path_constraint(path.resource_types(), path_resource) {
                    paths.push(path);
                }
                continue;
            }

            if frame.steps.len() > self.max_hops {
                continue;
            }

            let children: Vec<Frame> = self
                .relations_for(&frame.current)
                .into_iter()
                .filter(|rel| !frame.visited.contains(&rel.target_type))
                .map(|rel| {
                    let mut steps = frame.steps.clone();
                    steps.push(PathStepV2::via(
                        rel.target_type.clone(),
                        rel.schema.relation_type.clone(),
                        rel.schema.category,
                        rel.direction,
                    ));
                    let mut visited = frame.visited.clone();
                    visited.insert(rel.target_type.clone());
                    Frame {
                        current: rel.target_type,
                        steps,
                        visited,
                    }
                })
                .collect();

            // Reversed so the first registered relation is explored first.
            stack.extend(children.into_iter().rev());
        }

        if paths.is_empty() {
            return Err(RelgraphError::NoPathsFound {
                source_type: source.to_string(),
                target_type: target.to_string(),
                path_resource: path_resource.iter().map(|r| r.to_string()).collect(),
            });
        }

        log::debug!(
            "found {} paths from {} to {} (max_hops={})",
            paths.len(),
            source,
            target,
            self.max_hops
        );

        Ok(paths)
    }
}
