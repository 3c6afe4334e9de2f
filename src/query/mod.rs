//! Query request model and SurrealQL compilation.

mod builder;

pub use builder::SurrealQueryBuilder;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::schema::{RelationCategory, ResourceType, TraversalDirection};

pub const DEFAULT_MAX_HOPS: usize = 2;
pub const MAX_ALLOWED_HOPS: usize = 5;
pub const DEFAULT_LIMIT: usize = 100;
pub const DEFAULT_LOOK_BACK_DELTA_MS: i64 = 86_400_000;
pub const DEFAULT_STEP_MS: i64 = 60_000;
pub const DEFAULT_MAX_SERIES_POINTS: usize = 11_000;

/// Process-wide defaults consulted by [`QueryRequest::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryDefaults {
    pub default_max_hops: usize,
    pub max_allowed_hops: usize,
    pub default_limit: usize,
    pub default_look_back_delta_ms: i64,
    pub default_step_ms: i64,
    /// Upper bound on buckets a range query may produce.
    pub max_series_points: usize,
}

impl QueryDefaults {
    pub const BUILTIN: QueryDefaults = QueryDefaults {
        default_max_hops: DEFAULT_MAX_HOPS,
        max_allowed_hops: MAX_ALLOWED_HOPS,
        default_limit: DEFAULT_LIMIT,
        default_look_back_delta_ms: DEFAULT_LOOK_BACK_DELTA_MS,
        default_step_ms: DEFAULT_STEP_MS,
        max_series_points: DEFAULT_MAX_SERIES_POINTS,
    };

    /// Snapshot of the installed defaults.
    pub fn current() -> Self {
        match ACTIVE_DEFAULTS.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Replace the process-wide defaults. Usually called once at startup.
    pub fn install(self) {
        match ACTIVE_DEFAULTS.write() {
            Ok(mut guard) => *guard = self,
            Err(poisoned) => *poisoned.into_inner() = self,
        }
    }
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self::BUILTIN
    }
}

static ACTIVE_DEFAULTS: RwLock<QueryDefaults> = RwLock::new(QueryDefaults::BUILTIN);

/// Parameters of one relation query. Zero values mean "use the default";
/// call [`normalize`](Self::normalize) before compiling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Evaluation instant, unix milliseconds.
    pub timestamp: i64,
    pub source_type: ResourceType,
    /// Label equality filter on the source entity.
    #[serde(default)]
    pub source_info: BTreeMap<String, String>,
    pub target_type: ResourceType,
    /// Required waypoint types, in order.
    #[serde(default)]
    pub path_resource: Vec<ResourceType>,
    #[serde(default)]
    pub max_hops: usize,
    #[serde(default)]
    pub allowed_relation_types: Vec<RelationCategory>,
    #[serde(default)]
    pub dynamic_relation_direction: Option<TraversalDirection>,
    /// Liveness window width, milliseconds.
    #[serde(default)]
    pub look_back_delta: i64,
    #[serde(default)]
    pub limit: usize,
}

impl QueryRequest {
    /// Fill defaults and clamp against the installed [`QueryDefaults`].
    pub fn normalize(&mut self) {
        self.normalize_with(&QueryDefaults::current());
    }

    /// Fill defaults and clamp against explicit defaults. Idempotent.
    pub fn normalize_with(&mut self, defaults: &QueryDefaults) {
        if self.max_hops == 0 {
            self.max_hops = defaults.default_max_hops;
        }
        if self.max_hops > defaults.max_allowed_hops {
            self.max_hops = defaults.max_allowed_hops;
        }
        if self.limit == 0 {
            self.limit = defaults.default_limit;
        }
        if self.look_back_delta <= 0 {
            self.look_back_delta = defaults.default_look_back_delta_ms;
        }
        if self.allowed_relation_types.is_empty() {
            self.allowed_relation_types = RelationCategory::ALL.to_vec();
        }
        if self.dynamic_relation_direction.is_none() {
            self.dynamic_relation_direction = Some(TraversalDirection::Both);
        }
    }

    /// Liveness window `(start, end)`: `end = max(0, timestamp)`,
    /// `start = max(0, end - look_back_delta)`. Never inverted.
    pub fn query_range(&self) -> (i64, i64) {
        let end = self.timestamp.max(0);
        let start = end.saturating_sub(self.look_back_delta).max(0);
        (start, end)
    }

    pub fn dynamic_direction(&self) -> TraversalDirection {
        self.dynamic_relation_direction
            .unwrap_or(TraversalDirection::Both)
    }
}

/// Hop budget implied by a waypoint list: one more than the number of
/// waypoints strictly between source and target. Empty → 0 (use default).
pub fn max_hops_through(
    source: &ResourceType,
    target: &ResourceType,
    path_resource: &[ResourceType],
) -> usize {
    if path_resource.is_empty() {
        return 0;
    }

    let mut waypoints = path_resource;
    if let Some((first, rest)) = waypoints.split_first() {
        if first == source {
            waypoints = rest;
        }
    }
    if let Some((last, rest)) = waypoints.split_last() {
        if last == target {
            waypoints = rest;
        }
    }

    waypoints.len() + 1
}
