use std::collections::{BTreeMap, HashSet};

use super::{LivenessGraph, Matcher, MatchersWithTimestamp, VisiblePeriod};
use crate::schema::ResourceType;

/// Target matchers across all graphs, first occurrence of each resource id wins.
pub fn extract_matchers(graphs: &[LivenessGraph], target_type: &ResourceType) -> Vec<Matcher> {
    let mut seen = HashSet::new();
    let mut matchers = Vec::new();

    for graph in graphs {
        for (id, matcher) in graph.extract_target_matchers_with_id(target_type) {
            if seen.insert(id) {
                matchers.push(matcher);
            }
        }
    }

    matchers
}

struct TargetActivity<'a> {
    labels: &'a Matcher,
    periods: Vec<VisiblePeriod>,
}

impl TargetActivity<'_> {
    fn active_at(&self, ts: i64) -> bool {
        self.periods.iter().any(|p| p.contains(ts))
    }
}

/// Bucket target nodes into `[start, end]` stepped by `step_ms`.
///
/// Periods of the same resource id are merged across graphs (labels from the
/// first graph). Buckets with no active target are omitted.
pub fn build_target_series(
    graphs: &[LivenessGraph],
    target_type: &ResourceType,
    start: i64,
    end: i64,
    step_ms: i64,
) -> Vec<MatchersWithTimestamp> {
    if step_ms <= 0 {
        return Vec::new();
    }

    let mut targets: BTreeMap<&str, TargetActivity<'_>> = BTreeMap::new();
    for graph in graphs {
        for node in graph.nodes.values().filter(|n| &n.resource_type == target_type) {
            targets
                .entry(node.resource_id.as_str())
                .or_insert_with(|| TargetActivity {
                    labels: &node.labels,
                    periods: Vec::new(),
                })
                .periods
                .extend(node.raw_periods.iter().copied());
        }
    }

    if targets.is_empty() {
        return Vec::new();
    }

    let mut series = Vec::new();
    let mut ts = start;
    while ts <= end {
        let matchers: Vec<Matcher> = targets
            .values()
            .filter(|t| t.active_at(ts))
            .map(|t| t.labels.clone())
            .collect();

        if !matchers.is_empty() {
            series.push(MatchersWithTimestamp {
                timestamp: ts,
                matchers,
            });
        }

        ts = match ts.checked_add(step_ms) {
            Some(next) => next,
            None => break,
        };
    }

    series
}
