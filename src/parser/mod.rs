//! Reconstruction of [`LivenessGraph`]s from a SurrealDB response.
//!
//! The compiled query nests hop objects inside each target, so a response is a
//! right-recursive tree per root. Parsing walks that tree back into a flat node and
//! edge set. Malformed individual records become traversal errors on the graph;
//! only a structurally impossible top level is a hard error.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::graph::{EdgeLiveness, LivenessGraph, NodeLiveness, VisiblePeriod};
use crate::schema::{find_schema, RelationCategory, RelationType, ResourceType, TraversalDirection};
use crate::{RelgraphError, Result};

const HOP_PREFIX: &str = "hop";

/// `root` or `target` object of a record.
#[derive(Debug, Deserialize)]
struct WireEntity {
    entity_id: Option<String>,
    entity_type: Option<String>,
    entity_data: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient_periods")]
    liveness: Vec<VisiblePeriod>,
    /// Remaining keys; nested `hopN` objects live here.
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// One element of a hop's relation array.
#[derive(Debug, Deserialize)]
struct WireRelation {
    relation_id: Option<String>,
    relation_type: Option<String>,
    relation_category: Option<String>,
    direction: Option<String>,
    #[serde(default, deserialize_with = "lenient_periods")]
    relation_liveness: Vec<VisiblePeriod>,
    target: Option<WireEntity>,
}

fn lenient_periods<'de, D>(deserializer: D) -> std::result::Result<Vec<VisiblePeriod>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_periods(&value))
}

/// Periods from a liveness array. Items that are not objects, have a missing or
/// unparsable bound, or have `start > end` are dropped.
fn parse_periods(value: &Value) -> Vec<VisiblePeriod> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let period = item.as_object()?;
            let start = to_millis(period.get("period_start")?)?;
            let end = to_millis(period.get("period_end")?)?;
            (start <= end).then(|| VisiblePeriod::new(start, end))
        })
        .collect()
}

fn to_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn label_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn strip_direction_suffix(key: &str) -> &str {
    key.strip_suffix("_outbound")
        .or_else(|| key.strip_suffix("_inbound"))
        .unwrap_or(key)
}

struct ParsedRelation {
    edge: EdgeLiveness,
    target: NodeLiveness,
    nested_hops: Vec<Value>,
}

pub struct SurrealResponseParser {
    query_start: i64,
    query_end: i64,
}

impl SurrealResponseParser {
    pub fn new(query_start: i64, query_end: i64) -> Self {
        Self {
            query_start,
            query_end,
        }
    }

    /// Decode a raw JSON body, then [`parse`](Self::parse) it.
    pub fn parse_str(&self, body: &str) -> Result<Vec<LivenessGraph>> {
        let value: Value = serde_json::from_str(body)?;
        self.parse(&value)
    }

    /// One graph per root record of the first statement that returned an array.
    pub fn parse(&self, response: &Value) -> Result<Vec<LivenessGraph>> {
        let statements = match response {
            Value::Null => return Ok(Vec::new()),
            Value::Array(statements) => statements,
            other => {
                return Err(RelgraphError::Parse(format!(
                    "expected an array of statement results, got {}",
                    json_kind(other)
                )))
            }
        };

        // LET statements come first and return non-array results.
        let Some(records) = statements
            .iter()
            .find_map(|s| s.get("result").and_then(Value::as_array))
        else {
            return Ok(Vec::new());
        };

        let graphs: Vec<LivenessGraph> = records
            .iter()
            .filter_map(|record| self.parse_record(record))
            .collect();

        log::debug!(
            "parsed {} graphs from {} records ({} with traversal errors)",
            graphs.len(),
            records.len(),
            graphs.iter().filter(|g| g.has_errors()).count()
        );

        Ok(graphs)
    }

    fn parse_record(&self, record: &Value) -> Option<LivenessGraph> {
        let result = record.get("result")?.as_object()?;
        let root = result.get("root")?;

        let mut graph = LivenessGraph::new(self.query_start, self.query_end);

        let root = match self.parse_entity(root) {
            Ok(node) => node,
            Err(e) => {
                graph.add_traversal_error(format!("failed to parse root: {}", e));
                return Some(graph);
            }
        };
        let root_id = root.resource_id.clone();
        graph.add_node(root);

        for (key, hop) in result {
            if key.starts_with(HOP_PREFIX) {
                self.parse_hop_relations(&mut graph, &root_id, hop);
            }
        }

        Some(graph)
    }

    // Record-level failures are plain messages destined for `traversal_errors`.
    fn parse_entity(&self, value: &Value) -> std::result::Result<NodeLiveness, String> {
        let entity =
            WireEntity::deserialize(value).map_err(|e| format!("invalid entity: {}", e))?;
        self.node_from_entity(entity).map(|(node, _)| node)
    }

    /// Convert a decoded entity, returning its nested hop objects alongside.
    fn node_from_entity(
        &self,
        entity: WireEntity,
    ) -> std::result::Result<(NodeLiveness, Vec<Value>), String> {
        let resource_id = entity
            .entity_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| "missing entity_id".to_string())?;

        let resource_type = match entity.entity_type {
            Some(t) if !t.is_empty() => ResourceType::from(t),
            _ => ResourceType::from(resource_id.split(':').next().unwrap_or_default()),
        };

        let labels = entity
            .entity_data
            .unwrap_or_default()
            .iter()
            .filter_map(|(k, v)| label_value(v).map(|v| (k.clone(), v)))
            .collect();

        let nested_hops = entity
            .extra
            .into_iter()
            .filter(|(k, v)| k.starts_with(HOP_PREFIX) && v.is_object())
            .map(|(_, v)| v)
            .collect();

        Ok((
            NodeLiveness {
                resource_id,
                resource_type,
                labels,
                raw_periods: entity.liveness,
            },
            nested_hops,
        ))
    }

    fn parse_relation(
        &self,
        from_id: &str,
        key: &str,
        value: &Value,
    ) -> std::result::Result<ParsedRelation, String> {
        let relation = WireRelation::deserialize(value)
            .map_err(|e| format!("invalid relation instance: {}", e))?;

        let relation_id = relation
            .relation_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| "missing relation_id".to_string())?;
        let target = relation
            .target
            .ok_or_else(|| format!("relation {} missing target", relation_id))?;
        let (target, nested_hops) = self
            .node_from_entity(target)
            .map_err(|e| format!("relation {} target: {}", relation_id, e))?;

        let relation_type = relation
            .relation_type
            .map(RelationType::from)
            .unwrap_or_else(|| RelationType::from(strip_direction_suffix(key)));
        let category = relation
            .relation_category
            .and_then(|c| c.parse::<RelationCategory>().ok())
            .or_else(|| find_schema(&relation_type).map(|s| s.category))
            .unwrap_or(RelationCategory::Static);
        let direction = relation
            .direction
            .and_then(|d| d.parse::<TraversalDirection>().ok());

        Ok(ParsedRelation {
            edge: EdgeLiveness {
                relation_id,
                relation_type,
                category,
                direction,
                from_id: from_id.to_string(),
                to_id: target.resource_id.clone(),
                raw_periods: relation.relation_liveness,
            },
            target,
            nested_hops,
        })
    }

    /// Add every relation instance of one hop object, then recurse into the hops
    /// nested inside each target.
    fn parse_hop_relations(&self, graph: &mut LivenessGraph, from_id: &str, hop: &Value) {
        let Some(relations) = hop.as_object() else {
            return;
        };

        for (key, instances) in relations {
            let Some(instances) = instances.as_array() else {
                continue;
            };

            for instance in instances.iter().filter(|i| i.is_object()) {
                match self.parse_relation(from_id, key, instance) {
                    Ok(parsed) => {
                        let target_id = parsed.target.resource_id.clone();
                        graph.add_node(parsed.target);
                        graph.add_edge(parsed.edge);
                        for nested in &parsed.nested_hops {
                            self.parse_hop_relations(graph, &target_id, nested);
                        }
                    }
                    Err(e) => graph.add_traversal_error(format!("{}: {}", key, e)),
                }
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
