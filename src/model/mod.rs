//! Resolution façade: request parsing, path enumeration, query compilation and
//! execution, and matcher extraction in one pipeline.

mod params;

pub use params::{parse_duration_ms, parse_duration_or, parse_timestamp};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

use crate::graph::{
    build_target_series, extract_matchers, LivenessGraph, Matcher, MatchersWithTimestamp,
};
use crate::path::{PathFinder, PathV2};
use crate::query::{max_hops_through, QueryDefaults, QueryRequest, SurrealQueryBuilder};
use crate::schema::ResourceType;
use crate::{RelgraphError, Result};

/// Runs compiled query text against the graph store.
///
/// Implementations either return graphs already reconstructed from their own
/// transport or delegate to [`SurrealResponseParser`](crate::parser::SurrealResponseParser).
/// Cancellation and timeouts are the implementation's concern.
#[async_trait]
pub trait GraphQueryExecutor: Send + Sync {
    async fn execute(&self, query: &str, start: i64, end: i64) -> Result<Vec<LivenessGraph>>;
}

/// Caller-facing parameters shared by instant and range resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceMatcherQuery {
    pub space_uid: String,
    /// Duration string, e.g. `10m`. Empty uses the configured default.
    #[serde(default)]
    pub look_back_delta: String,
    pub source: ResourceType,
    pub target: ResourceType,
    /// Label filter selecting the source entities.
    #[serde(default)]
    pub index_matcher: Matcher,
    /// Required waypoint types, in order.
    #[serde(default)]
    pub path_resource: Vec<ResourceType>,
}

impl ResourceMatcherQuery {
    fn validate(&self) -> Result<()> {
        if self.space_uid.trim().is_empty() {
            return Err(RelgraphError::MissingField("space_uid"));
        }
        if self.source.is_empty() {
            return Err(RelgraphError::MissingField("source"));
        }
        if self.target.is_empty() {
            return Err(RelgraphError::MissingField("target"));
        }
        Ok(())
    }

    /// Build the normalized [`QueryRequest`] evaluated at `timestamp`.
    fn to_request(&self, timestamp: i64) -> Result<QueryRequest> {
        let look_back_delta = parse_duration_or(&self.look_back_delta, 0)?;

        let mut request = QueryRequest {
            timestamp,
            source_type: self.source.clone(),
            source_info: self.index_matcher.clone(),
            target_type: self.target.clone(),
            path_resource: self.path_resource.clone(),
            max_hops: max_hops_through(&self.source, &self.target, &self.path_resource),
            look_back_delta,
            ..Default::default()
        };
        request.normalize();
        Ok(request)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceMatcherResult {
    pub source: ResourceType,
    pub index_matcher: Matcher,
    pub paths: Vec<PathV2>,
    pub target: ResourceType,
    pub matchers: Vec<Matcher>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceMatcherRangeResult {
    pub source: ResourceType,
    pub index_matcher: Matcher,
    pub paths: Vec<PathV2>,
    pub target: ResourceType,
    pub series: Vec<MatchersWithTimestamp>,
}

/// Everything [`Model::query_liveness_graph`] produced for one request.
#[derive(Debug, Clone, Default)]
pub struct LivenessQueryOutcome {
    pub graphs: Vec<LivenessGraph>,
    /// Informational; the executed query covers every opportunity, not just these.
    pub paths: Vec<PathV2>,
    pub matchers: Vec<Matcher>,
}

#[derive(Clone, Default)]
pub struct Model {
    executor: Option<Arc<dyn GraphQueryExecutor>>,
}

impl Model {
    pub fn new(executor: Arc<dyn GraphQueryExecutor>) -> Self {
        Self {
            executor: Some(executor),
        }
    }

    /// A model that compiles and enumerates paths but never executes.
    pub fn without_executor() -> Self {
        Self::default()
    }

    pub fn set_executor(&mut self, executor: Arc<dyn GraphQueryExecutor>) {
        self.executor = Some(executor);
    }

    /// Target matchers related to the source at one instant. An empty `ts` means now.
    pub async fn query_resource_matcher(
        &self,
        query: &ResourceMatcherQuery,
        ts: &str,
    ) -> Result<ResourceMatcherResult> {
        query.validate()?;
        let timestamp = parse_timestamp(ts)?;
        let request = query.to_request(timestamp)?;

        let outcome = self.query_liveness_graph(&request).await?;

        log::debug!(
            "instant {} -> {} at {}: {} paths, {} matchers",
            query.source,
            query.target,
            timestamp,
            outcome.paths.len(),
            outcome.matchers.len()
        );

        Ok(ResourceMatcherResult {
            source: query.source.clone(),
            index_matcher: query.index_matcher.clone(),
            paths: outcome.paths,
            target: query.target.clone(),
            matchers: outcome.matchers,
        })
    }

    /// Target matchers bucketed every `step` over `[start, end]`. Buckets with no
    /// active target are left out.
    pub async fn query_resource_matcher_range(
        &self,
        query: &ResourceMatcherQuery,
        step: &str,
        start: &str,
        end: &str,
    ) -> Result<ResourceMatcherRangeResult> {
        query.validate()?;
        if start.trim().is_empty() {
            return Err(RelgraphError::MissingField("start"));
        }
        if end.trim().is_empty() {
            return Err(RelgraphError::MissingField("end"));
        }

        let start = parse_timestamp(start)?;
        let end = parse_timestamp(end)?;
        if start > end {
            return Err(RelgraphError::InvalidInput(format!(
                "range start {} is after end {}",
                start, end
            )));
        }

        let defaults = QueryDefaults::current();
        let step_ms = parse_duration_or(step, defaults.default_step_ms)?;
        if step_ms <= 0 {
            return Err(RelgraphError::InvalidInput(format!(
                "step must be positive, got {:?}",
                step
            )));
        }

        let points = (i128::from(end) - i128::from(start)) / i128::from(step_ms) + 1;
        if points > defaults.max_series_points as i128 {
            return Err(RelgraphError::InvalidInput(format!(
                "range [{}, {}] at step {}ms spans {} points, limit is {}",
                start, end, step_ms, points, defaults.max_series_points
            )));
        }

        let request = query.to_request(end)?;
        let outcome = self.query_liveness_graph(&request).await?;
        let series = build_target_series(&outcome.graphs, &request.target_type, start, end, step_ms);

        log::debug!(
            "range {} -> {} over [{}, {}] step {}ms: {} paths, {} buckets",
            query.source,
            query.target,
            start,
            end,
            step_ms,
            outcome.paths.len(),
            series.len()
        );

        Ok(ResourceMatcherRangeResult {
            source: query.source.clone(),
            index_matcher: query.index_matcher.clone(),
            paths: outcome.paths,
            target: query.target.clone(),
            series,
        })
    }

    /// Compile, enumerate paths, execute, and extract target matchers.
    ///
    /// Fails with [`RelgraphError::NoPathsFound`] before touching the executor when
    /// the schema admits no path.
    pub async fn query_liveness_graph(&self, request: &QueryRequest) -> Result<LivenessQueryOutcome> {
        let builder = SurrealQueryBuilder::new(request.clone());
        let request = builder.request();
        let query = builder.build();
        let (start, end) = request.query_range();

        log::debug!(
            "compiled {} -> {} (max_hops={}, window=[{}, {}]) into {} bytes",
            request.source_type,
            request.target_type,
            request.max_hops,
            start,
            end,
            query.len()
        );

        let paths = PathFinder::new()
            .with_allowed_categories(&request.allowed_relation_types)
            .with_dynamic_direction(request.dynamic_direction())
            .with_max_hops(request.max_hops)
            .find_all_paths(&request.source_type, &request.target_type, &request.path_resource)?;

        let graphs = match &self.executor {
            Some(executor) => executor.execute(&query, start, end).await?,
            None => {
                log::debug!("no executor configured, skipping execution");
                Vec::new()
            }
        };

        let matchers = extract_matchers(&graphs, &request.target_type);

        log::debug!(
            "{} graphs, {} paths, {} matchers",
            graphs.len(),
            paths.len(),
            matchers.len()
        );

        Ok(LivenessQueryOutcome {
            graphs,
            paths,
            matchers,
        })
    }

    /// Resolve several target types one after another. A target that fails is
    /// logged and skipped.
    pub async fn resolve_targets(
        &self,
        query: &ResourceMatcherQuery,
        ts: &str,
        targets: &[ResourceType],
    ) -> Vec<ResourceMatcherResult> {
        let mut results = Vec::with_capacity(targets.len());

        for target in targets {
            let query = ResourceMatcherQuery {
                target: target.clone(),
                ..query.clone()
            };
            match self.query_resource_matcher(&query, ts).await {
                Ok(result) => results.push(result),
                Err(e) => log::warn!("skipping target {}: {}", target, e),
            }
        }

        results
    }
}

static DEFAULT_MODEL: OnceLock<Arc<Model>> = OnceLock::new();

/// Install the process-wide model. Fails if one is already in place.
pub fn install_default_model(model: Model) -> Result<()> {
    DEFAULT_MODEL
        .set(Arc::new(model))
        .map_err(|_| RelgraphError::Config("default model already initialised".to_string()))
}

/// The process-wide model; one without an executor unless one was installed first.
pub fn default_model() -> Arc<Model> {
    DEFAULT_MODEL
        .get_or_init(|| Arc::new(Model::without_executor()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeLiveness, VisiblePeriod};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockExecutor {
        graphs: Vec<LivenessGraph>,
        fail: bool,
        calls: Mutex<Vec<(String, i64, i64)>>,
    }

    #[async_trait]
    impl GraphQueryExecutor for MockExecutor {
        async fn execute(&self, query: &str, start: i64, end: i64) -> Result<Vec<LivenessGraph>> {
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), start, end));
            if self.fail {
                return Err(RelgraphError::Executor("connection refused".to_string()));
            }
            Ok(self.graphs.clone())
        }
    }

    fn labels(pairs: &[(&str, &str)]) -> Matcher {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn node(id: &str, rt: ResourceType, pairs: &[(&str, &str)], periods: Vec<VisiblePeriod>) -> NodeLiveness {
        NodeLiveness {
            resource_id: id.to_string(),
            resource_type: rt,
            labels: labels(pairs),
            raw_periods: periods,
        }
    }

    fn node_with_two_pods() -> LivenessGraph {
        let mut g = LivenessGraph::new(0, 10_000_000);
        let always = vec![VisiblePeriod::new(0, i64::MAX)];
        g.add_node(node(
            "node:⟨bcs_cluster_id=c1,node=n1⟩",
            ResourceType::NODE,
            &[("bcs_cluster_id", "c1"), ("node", "n1")],
            always.clone(),
        ));
        g.add_node(node(
            "pod:⟨bcs_cluster_id=c1,namespace=ns1,pod=p1⟩",
            ResourceType::POD,
            &[("bcs_cluster_id", "c1"), ("namespace", "ns1"), ("pod", "p1")],
            always.clone(),
        ));
        g.add_node(node(
            "pod:⟨bcs_cluster_id=c1,namespace=ns1,pod=p2⟩",
            ResourceType::POD,
            &[("bcs_cluster_id", "c1"), ("namespace", "ns1"), ("pod", "p2")],
            always,
        ));
        g
    }

    fn node_query(target: ResourceType) -> ResourceMatcherQuery {
        ResourceMatcherQuery {
            space_uid: "bkcc__2".to_string(),
            look_back_delta: "10m".to_string(),
            source: ResourceType::NODE,
            target,
            index_matcher: labels(&[("bcs_cluster_id", "c1"), ("node", "n1")]),
            path_resource: vec![],
        }
    }

    #[tokio::test]
    async fn test_instant_node_to_pod() {
        let executor = Arc::new(MockExecutor {
            graphs: vec![node_with_two_pods()],
            ..Default::default()
        });
        let model = Model::new(executor.clone());

        let result = model
            .query_resource_matcher(&node_query(ResourceType::POD), "1700000000")
            .await
            .unwrap();

        assert_eq!(result.source, ResourceType::NODE);
        assert_eq!(result.target, ResourceType::POD);
        assert!(!result.paths.is_empty());
        let mut pods: Vec<&str> = result.matchers.iter().map(|m| m["pod"].as_str()).collect();
        pods.sort();
        assert_eq!(pods, vec!["p1", "p2"]);

        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (query, start, end) = &calls[0];
        assert_eq!(*end, 1_700_000_000_000);
        assert_eq!(*start, 1_700_000_000_000 - 600_000);
        assert!(query.contains("FROM node\nWHERE bcs_cluster_id = 'c1'\n  AND node = 'n1'"));
    }

    #[tokio::test]
    async fn test_instant_empty_graph_is_not_an_error() {
        let model = Model::new(Arc::new(MockExecutor::default()));
        let result = model
            .query_resource_matcher(&node_query(ResourceType::POD), "1700000000")
            .await
            .unwrap();
        assert!(result.matchers.is_empty());
        assert!(!result.paths.is_empty());
    }

    #[tokio::test]
    async fn test_without_executor_returns_paths_only() {
        let model = Model::without_executor();
        let result = model
            .query_resource_matcher(&node_query(ResourceType::SYSTEM), "1700000000")
            .await
            .unwrap();
        assert!(result.matchers.is_empty());
        assert_eq!(result.paths[0].steps.len(), 2);
    }

    #[tokio::test]
    async fn test_executor_failure_propagates() {
        let model = Model::new(Arc::new(MockExecutor {
            fail: true,
            ..Default::default()
        }));
        let err = model
            .query_resource_matcher(&node_query(ResourceType::POD), "1700000000")
            .await
            .unwrap_err();
        assert!(matches!(err, RelgraphError::Executor(_)));
    }

    #[tokio::test]
    async fn test_no_paths_skips_executor() {
        let executor = Arc::new(MockExecutor::default());
        let model = Model::new(executor.clone());
        let err = model
            .query_resource_matcher(&node_query(ResourceType::BIZ), "1700000000")
            .await
            .unwrap_err();
        assert!(matches!(err, RelgraphError::NoPathsFound { .. }));
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_required_fields() {
        let model = Model::without_executor();

        let mut q = node_query(ResourceType::POD);
        q.space_uid.clear();
        let err = model.query_resource_matcher(&q, "").await.unwrap_err();
        assert!(matches!(err, RelgraphError::MissingField("space_uid")));

        let mut q = node_query(ResourceType::POD);
        q.source = ResourceType::default();
        let err = model.query_resource_matcher(&q, "").await.unwrap_err();
        assert!(matches!(err, RelgraphError::MissingField("source")));

        let q = node_query(ResourceType::default());
        let err = model.query_resource_matcher(&q, "").await.unwrap_err();
        assert!(matches!(err, RelgraphError::MissingField("target")));

        let q = node_query(ResourceType::POD);
        let err = model
            .query_resource_matcher_range(&q, "1m", "", "100")
            .await
            .unwrap_err();
        assert!(matches!(err, RelgraphError::MissingField("start")));
    }

    #[tokio::test]
    async fn test_invalid_parameters() {
        let model = Model::without_executor();
        let q = node_query(ResourceType::POD);

        let err = model.query_resource_matcher(&q, "noon").await.unwrap_err();
        assert!(matches!(err, RelgraphError::InvalidTimestamp { .. }));

        let mut bad_lbd = q.clone();
        bad_lbd.look_back_delta = "ten minutes".to_string();
        let err = model.query_resource_matcher(&bad_lbd, "").await.unwrap_err();
        assert!(matches!(err, RelgraphError::InvalidDuration(_)));

        let err = model
            .query_resource_matcher_range(&q, "0s", "0", "300")
            .await
            .unwrap_err();
        assert!(matches!(err, RelgraphError::InvalidInput(_)));

        let err = model
            .query_resource_matcher_range(&q, "1m", "300", "0")
            .await
            .unwrap_err();
        assert!(matches!(err, RelgraphError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_range_buckets() {
        let mut g = LivenessGraph::new(0, 300_000);
        g.add_node(node(
            "pod:⟨bcs_cluster_id=c1,namespace=ns1,pod=p1⟩",
            ResourceType::POD,
            &[("pod", "p1")],
            vec![VisiblePeriod::new(100_000, 300_000)],
        ));
        let executor = Arc::new(MockExecutor {
            graphs: vec![g],
            ..Default::default()
        });
        let model = Model::new(executor.clone());

        let result = model
            .query_resource_matcher_range(&node_query(ResourceType::POD), "100s", "0", "300")
            .await
            .unwrap();

        let stamps: Vec<i64> = result.series.iter().map(|b| b.timestamp).collect();
        assert_eq!(stamps, vec![100_000, 200_000, 300_000]);
        assert_eq!(result.series[0].matchers[0]["pod"], "p1");

        // The query is evaluated at the end of the range.
        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls[0].2, 300_000);
    }

    #[tokio::test]
    async fn test_range_point_limit() {
        let executor = Arc::new(MockExecutor::default());
        let model = Model::new(executor.clone());
        let q = node_query(ResourceType::POD);

        // One day at 1ms.
        let err = model
            .query_resource_matcher_range(&q, "1ms", "0", "86400")
            .await
            .unwrap_err();
        assert!(matches!(err, RelgraphError::InvalidInput(ref m) if m.contains("limit")));
        assert!(executor.calls.lock().unwrap().is_empty());

        // One day at 1m is 1441 points.
        assert!(model
            .query_resource_matcher_range(&q, "1m", "0", "86400")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_negative_timestamp_window_not_inverted() {
        let executor = Arc::new(MockExecutor {
            graphs: vec![node_with_two_pods()],
            ..Default::default()
        });
        let model = Model::new(executor.clone());

        let result = model
            .query_resource_matcher(&node_query(ResourceType::POD), "-5")
            .await
            .unwrap();
        assert_eq!(result.matchers.len(), 2);

        let calls = executor.calls.lock().unwrap();
        let (query, start, end) = &calls[0];
        assert!(start <= end);
        assert_eq!((*start, *end), (0, 0));
        assert!(query.contains("LET $start = 0;\nLET $end = 0;"));
    }

    #[tokio::test]
    async fn test_path_resource_limits_hops() {
        let executor = Arc::new(MockExecutor::default());
        let model = Model::new(executor.clone());
        let query = ResourceMatcherQuery {
            space_uid: "bkcc__2".to_string(),
            source: ResourceType::POD,
            target: ResourceType::NODE,
            index_matcher: labels(&[("pod", "p1")]),
            path_resource: vec![ResourceType::NODE],
            ..Default::default()
        };

        let result = model.query_resource_matcher(&query, "1700000000").await.unwrap();
        let rendered: Vec<Vec<&str>> = result
            .paths
            .iter()
            .map(|p| p.resource_types().map(|t| t.as_str()).collect())
            .collect();
        assert_eq!(rendered, vec![vec!["pod", "node"]]);

        let calls = executor.calls.lock().unwrap();
        assert!(calls[0].0.contains("hop1: {"));
        assert!(!calls[0].0.contains("hop2"));
    }

    #[tokio::test]
    async fn test_matchers_deduplicated_across_graphs() {
        let model = Model::new(Arc::new(MockExecutor {
            graphs: vec![node_with_two_pods(), node_with_two_pods()],
            ..Default::default()
        }));
        let result = model
            .query_resource_matcher(&node_query(ResourceType::POD), "1700000000")
            .await
            .unwrap();
        assert_eq!(result.matchers.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_targets_skips_failures() {
        let model = Model::new(Arc::new(MockExecutor {
            graphs: vec![node_with_two_pods()],
            ..Default::default()
        }));
        let results = model
            .resolve_targets(
                &node_query(ResourceType::POD),
                "1700000000",
                &[ResourceType::POD, ResourceType::BIZ, ResourceType::SYSTEM],
            )
            .await;

        let targets: Vec<&str> = results.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["pod", "system"]);
        assert_eq!(results[0].matchers.len(), 2);
        assert!(results[1].matchers.is_empty());
    }

    #[test]
    fn test_default_model_is_shared() {
        let a = default_model();
        let b = default_model();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(install_default_model(Model::without_executor()).is_err());
    }
}
