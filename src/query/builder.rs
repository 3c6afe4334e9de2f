use crate::path::{PathFinder, RelationQueryInfo};
use crate::schema::{
    liveness_id_field, liveness_table, primary_keys, relation_liveness_table, RelationCategory,
    ResourceType,
};

use super::QueryRequest;

/// Column of the relation keys inside the `hop{n}` object.
///
/// Hops 1 and 2 sit inside their parent's target; from hop 3 on the layout
/// restarts at 16 columns and moves 8 deeper per hop.
fn key_indent(hop: usize) -> usize {
    match hop {
        0 | 1 => 8,
        2 => 20,
        n => 16 + 8 * (n - 3),
    }
}

/// Column of the brace closing the `hop{n}` object.
fn hop_close_indent(hop: usize) -> usize {
    if hop <= 2 {
        key_indent(hop) - 4
    } else {
        key_indent(hop)
    }
}

/// Compiles a [`QueryRequest`] into one recursive SurrealQL statement covering
/// every relation opportunity up to `max_hops`.
pub struct SurrealQueryBuilder {
    request: QueryRequest,
    finder: PathFinder,
}

impl SurrealQueryBuilder {
    pub fn new(mut request: QueryRequest) -> Self {
        request.normalize();
        let finder = PathFinder::new()
            .with_allowed_categories(&request.allowed_relation_types)
            .with_dynamic_direction(request.dynamic_direction())
            .with_max_hops(request.max_hops);
        Self { request, finder }
    }

    /// The normalized request this builder compiles.
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    pub fn build(&self) -> String {
        let mut sql = self.variables();
        sql.push_str("\n\n");
        sql.push_str(&self.main_query());
        sql
    }

    fn variables(&self) -> String {
        let (start, end) = self.request.query_range();
        format!(
            "LET $timestamp = {};\nLET $look_back_delta = {};\nLET $start = {};\nLET $end = {};",
            self.request.timestamp, self.request.look_back_delta, start, end
        )
    }

    fn main_query(&self) -> String {
        let source = &self.request.source_type;
        let mut sql = String::from("SELECT {\n    root: ");
        sql.push_str(&self.root_select());

        if self.request.max_hops > 0 {
            sql.push_str(",\n\n    hop1: ");
            sql.push_str(&self.hop_select(1, source, "id"));
        }

        sql.push_str("\n} AS result\n");
        sql.push_str(&format!("FROM {}\n", source));
        sql.push_str(&self.where_clause());
        sql.push('\n');
        sql.push_str(&format!("LIMIT {};", self.request.limit));
        sql
    }

    fn root_select(&self) -> String {
        let source = &self.request.source_type;
        format!(
            "{{
        entity_type: meta::tb(id),
        entity_id: <string>id,
        entity_data: {{ {} }},
        created_at: created_at,
        updated_at: updated_at,
        liveness: (SELECT * FROM {} WHERE {} = $parent.id AND period_end >= $start AND period_start <= $end)
    }}",
            entity_data_fields(source, None),
            liveness_table(source),
            liveness_id_field(source),
        )
    }

    /// Object of every relation opportunity leaving `current` at depth `hop`.
    /// `parent_field` is the column of the parent row that identifies `current`.
    fn hop_select(&self, hop: usize, current: &ResourceType, parent_field: &str) -> String {
        if hop > self.request.max_hops {
            return "{}".to_string();
        }

        let relations = self.finder.relations_for(current);
        if relations.is_empty() {
            return "{}".to_string();
        }

        let body = relations
            .iter()
            .map(|rel| self.relation_select(hop, rel, parent_field))
            .collect::<Vec<_>>()
            .join(",\n");

        format!("{{\n{}\n{}}}", body, pad(hop_close_indent(hop)))
    }

    fn relation_select(&self, hop: usize, rel: &RelationQueryInfo, parent_field: &str) -> String {
        let key_col = key_indent(hop);
        let relation_type = &rel.schema.relation_type;
        let relation_liveness = relation_liveness_table(relation_type);
        let field = pad(key_col + 4);
        let target_field = pad(key_col + 8);

        let mut fields = String::new();
        fields.push_str(&format!("\n{}hop: {},", field, hop));
        fields.push_str(&format!("\n{}relation_type: '{}',", field, relation_type));
        fields.push_str(&format!(
            "\n{}relation_category: '{}',",
            field, rel.schema.category
        ));
        if rel.schema.category == RelationCategory::Dynamic {
            fields.push_str(&format!("\n{}direction: '{}',", field, rel.direction));
        }
        fields.push_str(&format!("\n{}relation_id: <string>id,", field));
        fields.push_str(&format!(
            "\n{}relation_liveness: (SELECT * FROM {} WHERE relation_id = $parent.id AND period_end >= $start AND period_start <= $end),",
            field, relation_liveness
        ));
        fields.push_str(&format!("\n{}target: {{", field));
        fields.push_str(&format!("\n{}entity_type: '{}',", target_field, rel.target_type));
        fields.push_str(&format!(
            "\n{}entity_id: <string>{},",
            target_field, rel.select_field
        ));
        fields.push_str(&format!(
            "\n{}entity_data: {{ {} }},",
            target_field,
            entity_data_fields(&rel.target_type, Some(rel.select_field))
        ));
        fields.push_str(&format!(
            "\n{}liveness: (SELECT * FROM {} WHERE {} = $parent.{} AND period_end >= $start AND period_start <= $end)",
            target_field,
            liveness_table(&rel.target_type),
            liveness_id_field(&rel.target_type),
            rel.select_field
        ));

        if hop < self.request.max_hops {
            let nested = self.hop_select(hop + 1, &rel.target_type, rel.select_field);
            fields.push_str(&format!(",\n{}hop{}: {}", target_field, hop + 1, nested));
        }
        fields.push_str(&format!("\n{}}}", field));

        format!(
            "{indent}{key}: (SELECT {{{fields}\n{indent}}} FROM {table} WHERE {where_field} = $parent.{parent_field}\n{indent}  AND (SELECT count() FROM only {liveness} WHERE relation_id = $parent.id AND $end >= period_start AND $start <= period_end GROUP ALL) > 0)",
            indent = pad(key_col),
            key = rel.key_name(),
            fields = fields,
            table = relation_type,
            where_field = rel.where_field,
            parent_field = parent_field,
            liveness = relation_liveness,
        )
    }

    /// Label keys are emitted verbatim as field names; only values are escaped.
    fn where_clause(&self) -> String {
        let source = &self.request.source_type;
        // BTreeMap iteration keeps the conditions in sorted key order.
        let mut conditions: Vec<String> = self
            .request
            .source_info
            .iter()
            .map(|(k, v)| format!("{} = '{}'", k, escape_surreal_string(v)))
            .collect();

        conditions.push(format!(
            "(SELECT count() FROM only {} WHERE {} = $parent.id AND $end >= period_start AND $start <= period_end GROUP ALL) > 0",
            liveness_table(source),
            liveness_id_field(source)
        ));

        format!("WHERE {}", conditions.join("\n  AND "))
    }
}

/// `k: k` for the root, `k: field.k` for a target reached through `field`.
fn entity_data_fields(resource_type: &ResourceType, prefix: Option<&str>) -> String {
    primary_keys(resource_type)
        .iter()
        .map(|key| match prefix {
            Some(prefix) => format!("{}: {}.{}", key, prefix, key),
            None => format!("{}: {}", key, key),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape_surreal_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

fn pad(width: usize) -> String {
    " ".repeat(width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryDefaults;
    use crate::schema::TraversalDirection;
    use std::collections::BTreeMap;

    fn node_request(max_hops: usize, categories: Vec<RelationCategory>) -> QueryRequest {
        let mut source_info = BTreeMap::new();
        source_info.insert("node".to_string(), "node-1".to_string());
        source_info.insert("bcs_cluster_id".to_string(), "BCS-K8S-00001".to_string());
        let mut req = QueryRequest {
            timestamp: 600_000,
            source_type: ResourceType::NODE,
            source_info,
            target_type: ResourceType::SYSTEM,
            max_hops,
            allowed_relation_types: categories,
            look_back_delta: 600_000,
            limit: 10,
            ..Default::default()
        };
        req.normalize_with(&QueryDefaults::BUILTIN);
        req
    }

    #[test]
    fn test_build_single_hop_static_node() {
        let sql = SurrealQueryBuilder::new(node_request(1, vec![RelationCategory::Static])).build();

        let expected = r#"LET $timestamp = 600000;
LET $look_back_delta = 600000;
LET $start = 0;
LET $end = 600000;

SELECT {
    root: {
        entity_type: meta::tb(id),
        entity_id: <string>id,
        entity_data: { bcs_cluster_id: bcs_cluster_id, node: node },
        created_at: created_at,
        updated_at: updated_at,
        liveness: (SELECT * FROM node_liveness_record WHERE node_id = $parent.id AND period_end >= $start AND period_start <= $end)
    },

    hop1: {
        node_with_system: (SELECT {
            hop: 1,
            relation_type: 'node_with_system',
            relation_category: 'static',
            relation_id: <string>id,
            relation_liveness: (SELECT * FROM node_with_system_liveness_record WHERE relation_id = $parent.id AND period_end >= $start AND period_start <= $end),
            target: {
                entity_type: 'system',
                entity_id: <string>target_id,
                entity_data: { bk_cloud_id: target_id.bk_cloud_id, bk_target_ip: target_id.bk_target_ip },
                liveness: (SELECT * FROM system_liveness_record WHERE system_id = $parent.target_id AND period_end >= $start AND period_start <= $end)
            }
        } FROM node_with_system WHERE source_id = $parent.id
          AND (SELECT count() FROM only node_with_system_liveness_record WHERE relation_id = $parent.id AND $end >= period_start AND $start <= period_end GROUP ALL) > 0),
        node_with_pod: (SELECT {
            hop: 1,
            relation_type: 'node_with_pod',
            relation_category: 'static',
            relation_id: <string>id,
            relation_liveness: (SELECT * FROM node_with_pod_liveness_record WHERE relation_id = $parent.id AND period_end >= $start AND period_start <= $end),
            target: {
                entity_type: 'pod',
                entity_id: <string>target_id,
                entity_data: { bcs_cluster_id: target_id.bcs_cluster_id, namespace: target_id.namespace, pod: target_id.pod },
                liveness: (SELECT * FROM pod_liveness_record WHERE pod_id = $parent.target_id AND period_end >= $start AND period_start <= $end)
            }
        } FROM node_with_pod WHERE source_id = $parent.id
          AND (SELECT count() FROM only node_with_pod_liveness_record WHERE relation_id = $parent.id AND $end >= period_start AND $start <= period_end GROUP ALL) > 0),
        datasource_with_node: (SELECT {
            hop: 1,
            relation_type: 'datasource_with_node',
            relation_category: 'static',
            relation_id: <string>id,
            relation_liveness: (SELECT * FROM datasource_with_node_liveness_record WHERE relation_id = $parent.id AND period_end >= $start AND period_start <= $end),
            target: {
                entity_type: 'datasource',
                entity_id: <string>source_id,
                entity_data: { bk_data_id: source_id.bk_data_id },
                liveness: (SELECT * FROM datasource_liveness_record WHERE datasource_id = $parent.source_id AND period_end >= $start AND period_start <= $end)
            }
        } FROM datasource_with_node WHERE target_id = $parent.id
          AND (SELECT count() FROM only datasource_with_node_liveness_record WHERE relation_id = $parent.id AND $end >= period_start AND $start <= period_end GROUP ALL) > 0)
    }
} AS result
FROM node
WHERE bcs_cluster_id = 'BCS-K8S-00001'
  AND node = 'node-1'
  AND (SELECT count() FROM only node_liveness_record WHERE node_id = $parent.id AND $end >= period_start AND $start <= period_end GROUP ALL) > 0
LIMIT 10;"#;

        assert_eq!(sql, expected);
    }

    #[test]
    fn test_let_bindings_come_first() {
        let sql = SurrealQueryBuilder::new(node_request(2, vec![])).build();
        let lines: Vec<&str> = sql.lines().filter(|l| !l.trim().is_empty()).take(4).collect();
        assert_eq!(
            lines,
            vec![
                "LET $timestamp = 600000;",
                "LET $look_back_delta = 600000;",
                "LET $start = 0;",
                "LET $end = 600000;",
            ]
        );
    }

    #[test]
    fn test_dynamic_relations_carry_direction_and_suffix() {
        let mut req = node_request(1, vec![RelationCategory::Dynamic]);
        req.source_type = ResourceType::SYSTEM;
        req.source_info.clear();
        req.dynamic_relation_direction = Some(TraversalDirection::Both);

        let sql = SurrealQueryBuilder::new(req).build();
        assert!(sql.contains("        system_to_pod_outbound: (SELECT {"));
        assert!(sql.contains("        pod_to_system_inbound: (SELECT {"));
        assert!(sql.contains("        system_to_system_outbound: (SELECT {"));
        assert!(sql.contains("        system_to_system_inbound: (SELECT {"));
        assert!(sql.contains("            direction: 'outbound',"));
        assert!(sql.contains("            direction: 'inbound',"));
        assert!(!sql.contains("relation_category: 'static'"));
        // Only the liveness filter remains when no source labels are given.
        assert!(sql.contains("FROM system\nWHERE (SELECT count() FROM only system_liveness_record"));
    }

    #[test]
    fn test_outbound_only_skips_inbound_dynamic() {
        let mut req = node_request(1, vec![RelationCategory::Dynamic]);
        req.source_type = ResourceType::SYSTEM;
        req.dynamic_relation_direction = Some(TraversalDirection::Outbound);

        let sql = SurrealQueryBuilder::new(req).build();
        assert!(sql.contains("system_to_pod_outbound"));
        assert!(!sql.contains("_inbound"));
    }

    #[test]
    fn test_nested_hops_reference_parent_select_field() {
        let sql = SurrealQueryBuilder::new(node_request(2, vec![RelationCategory::Static])).build();

        assert!(sql.contains("hop1: {"));
        assert!(sql.contains("                hop2: {"));
        assert!(!sql.contains("hop3"));
        // node -> pod (target_id) -> replicaset keyed off the pod.
        assert!(sql.contains(
            "                    pod_with_replicaset: (SELECT {\n                        hop: 2,"
        ));
        assert!(sql.contains("} FROM pod_with_replicaset WHERE source_id = $parent.target_id"));
        // node <- datasource (source_id) -> pod keyed off the datasource.
        assert!(sql.contains("} FROM datasource_with_pod WHERE source_id = $parent.source_id"));
    }

    #[test]
    fn test_hop_depth_terminates_at_max_hops() {
        let sql = SurrealQueryBuilder::new(node_request(3, vec![RelationCategory::Static])).build();
        assert!(sql.contains("hop3: {"));
        assert!(sql.contains("hop: 3,"));
        assert!(!sql.contains("hop4"));
    }

    #[test]
    fn test_deep_hop_layout() {
        assert_eq!(
            (1..=5).map(key_indent).collect::<Vec<_>>(),
            vec![8, 20, 16, 24, 32]
        );
        assert_eq!(
            (1..=5).map(hop_close_indent).collect::<Vec<_>>(),
            vec![4, 16, 16, 24, 32]
        );

        let sql = SurrealQueryBuilder::new(node_request(3, vec![RelationCategory::Static])).build();
        // node -> pod -> replicaset, then back to pods or on to deployments.
        assert!(sql.contains(
            "                            hop3: {\n                pod_with_replicaset: (SELECT {\n                    hop: 3,"
        ));
        assert!(sql.contains(
            "\n                } FROM deployment_with_replicaset WHERE target_id = $parent.target_id\n                  AND "
        ));
    }

    #[test]
    fn test_where_keys_are_not_escaped() {
        let mut req = node_request(1, vec![RelationCategory::Static]);
        req.source_info.insert("labels.app".to_string(), "web".to_string());
        let sql = SurrealQueryBuilder::new(req).build();
        assert!(sql.contains("labels.app = 'web'"));
    }

    #[test]
    fn test_type_without_relations_renders_empty_object() {
        let mut req = node_request(1, vec![RelationCategory::Dynamic]);
        req.source_type = ResourceType::NODE;
        let sql = SurrealQueryBuilder::new(req).build();
        assert!(sql.contains("    hop1: {}\n} AS result"));
    }

    #[test]
    fn test_where_escapes_quotes_and_backslashes() {
        let mut req = node_request(1, vec![RelationCategory::Static]);
        req.source_info.insert("node".to_string(), r"it's\here".to_string());
        let sql = SurrealQueryBuilder::new(req).build();
        assert!(sql.contains(r"AND node = 'it\'s\\here'"));
    }

    #[test]
    fn test_builder_normalizes_request() {
        let req = QueryRequest {
            timestamp: 1_000,
            source_type: ResourceType::POD,
            target_type: ResourceType::NODE,
            max_hops: 99,
            ..Default::default()
        };
        let builder = SurrealQueryBuilder::new(req);
        assert!(builder.request().max_hops >= 1);
        assert!(builder.request().limit >= 1);
        assert!(builder.request().dynamic_relation_direction.is_some());
    }
}
