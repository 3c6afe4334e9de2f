//! Static relation registry. Registration order is the traversal order used by
//! path enumeration and query compilation.

use super::{RelationCategory, RelationSchema, RelationType, ResourceType};

use RelationCategory::{Dynamic, Static};

const fn schema(
    from_type: ResourceType,
    to_type: ResourceType,
    relation_type: RelationType,
    category: RelationCategory,
) -> RelationSchema {
    RelationSchema {
        from_type,
        to_type,
        relation_type,
        category,
    }
}

static RELATION_SCHEMAS: [RelationSchema; 32] = [
    // Kubernetes topology
    schema(ResourceType::NODE, ResourceType::SYSTEM, RelationType::NODE_WITH_SYSTEM, Static),
    schema(ResourceType::NODE, ResourceType::POD, RelationType::NODE_WITH_POD, Static),
    schema(ResourceType::JOB, ResourceType::POD, RelationType::JOB_WITH_POD, Static),
    schema(ResourceType::POD, ResourceType::REPLICA_SET, RelationType::POD_WITH_REPLICA_SET, Static),
    schema(ResourceType::POD, ResourceType::STATEFUL_SET, RelationType::POD_WITH_STATEFUL_SET, Static),
    schema(ResourceType::DAEMON_SET, ResourceType::POD, RelationType::DAEMON_SET_WITH_POD, Static),
    schema(
        ResourceType::DEPLOYMENT,
        ResourceType::REPLICA_SET,
        RelationType::DEPLOYMENT_WITH_REPLICA_SET,
        Static,
    ),
    schema(ResourceType::POD, ResourceType::SERVICE, RelationType::POD_WITH_SERVICE, Static),
    schema(ResourceType::INGRESS, ResourceType::SERVICE, RelationType::INGRESS_WITH_SERVICE, Static),
    // Service addressing
    schema(
        ResourceType::K8S_ADDRESS,
        ResourceType::SERVICE,
        RelationType::K8S_ADDRESS_WITH_SERVICE,
        Static,
    ),
    schema(ResourceType::DOMAIN, ResourceType::SERVICE, RelationType::DOMAIN_WITH_SERVICE, Static),
    // APM
    schema(
        ResourceType::APM_SERVICE_INSTANCE,
        ResourceType::POD,
        RelationType::APM_SERVICE_INSTANCE_WITH_POD,
        Static,
    ),
    schema(
        ResourceType::APM_SERVICE_INSTANCE,
        ResourceType::SYSTEM,
        RelationType::APM_SERVICE_INSTANCE_WITH_SYSTEM,
        Static,
    ),
    schema(
        ResourceType::APM_SERVICE,
        ResourceType::APM_SERVICE_INSTANCE,
        RelationType::APM_SERVICE_WITH_APM_SERVICE_INSTANCE,
        Static,
    ),
    schema(ResourceType::CONTAINER, ResourceType::POD, RelationType::CONTAINER_WITH_POD, Static),
    // Data collection
    schema(ResourceType::DATA_SOURCE, ResourceType::POD, RelationType::DATA_SOURCE_WITH_POD, Static),
    schema(ResourceType::DATA_SOURCE, ResourceType::NODE, RelationType::DATA_SOURCE_WITH_NODE, Static),
    schema(
        ResourceType::BK_LOG_CONFIG,
        ResourceType::DATA_SOURCE,
        RelationType::BK_LOG_CONFIG_WITH_DATA_SOURCE,
        Static,
    ),
    // Business topology
    schema(ResourceType::BIZ, ResourceType::SET, RelationType::BIZ_WITH_SET, Static),
    schema(ResourceType::MODULE, ResourceType::SET, RelationType::MODULE_WITH_SET, Static),
    schema(ResourceType::HOST, ResourceType::MODULE, RelationType::HOST_WITH_MODULE, Static),
    schema(ResourceType::HOST, ResourceType::SYSTEM, RelationType::HOST_WITH_SYSTEM, Static),
    // Release tracking
    schema(
        ResourceType::APP_VERSION,
        ResourceType::CONTAINER,
        RelationType::APP_VERSION_WITH_CONTAINER,
        Static,
    ),
    schema(
        ResourceType::APP_VERSION,
        ResourceType::SYSTEM,
        RelationType::APP_VERSION_WITH_SYSTEM,
        Static,
    ),
    schema(
        ResourceType::CONTAINER,
        ResourceType::ENVIRONMENT,
        RelationType::CONTAINER_WITH_ENVIRONMENT,
        Static,
    ),
    schema(
        ResourceType::ENVIRONMENT,
        ResourceType::SYSTEM,
        RelationType::ENVIRONMENT_WITH_SYSTEM,
        Static,
    ),
    schema(
        ResourceType::APP_VERSION,
        ResourceType::GIT_COMMIT,
        RelationType::APP_VERSION_WITH_GIT_COMMIT,
        Static,
    ),
    // Observed traffic
    schema(ResourceType::POD, ResourceType::POD, RelationType::POD_TO_POD, Dynamic),
    schema(ResourceType::POD, ResourceType::SYSTEM, RelationType::POD_TO_SYSTEM, Dynamic),
    schema(ResourceType::SYSTEM, ResourceType::POD, RelationType::SYSTEM_TO_POD, Dynamic),
    schema(ResourceType::SYSTEM, ResourceType::SYSTEM, RelationType::SYSTEM_TO_SYSTEM, Dynamic),
    schema(ResourceType::SERVICE, ResourceType::SERVICE, RelationType::SERVICE_TO_SERVICE, Dynamic),
];

/// Every registered relation, in registration order.
pub fn relation_schemas() -> &'static [RelationSchema] {
    &RELATION_SCHEMAS
}

/// Look up the schema registered for a relation type.
pub fn find_schema(relation_type: &RelationType) -> Option<&'static RelationSchema> {
    RELATION_SCHEMAS
        .iter()
        .find(|s| &s.relation_type == relation_type)
}

/// Label keys that identify one instance of a resource type. Unknown types have none.
pub fn primary_keys(resource_type: &ResourceType) -> &'static [&'static str] {
    match resource_type.as_str() {
        "pod" => &["bcs_cluster_id", "namespace", "pod"],
        "node" => &["bcs_cluster_id", "node"],
        "container" => &["bcs_cluster_id", "namespace", "pod", "container"],
        "deployment" => &["bcs_cluster_id", "namespace", "deployment"],
        "replicaset" => &["bcs_cluster_id", "namespace", "replicaset"],
        "statefulset" => &["bcs_cluster_id", "namespace", "statefulset"],
        "daemonset" => &["bcs_cluster_id", "namespace", "daemonset"],
        "job" => &["bcs_cluster_id", "namespace", "job"],
        "service" => &["bcs_cluster_id", "namespace", "service"],
        "ingress" => &["bcs_cluster_id", "namespace", "ingress"],
        "cluster" => &["bcs_cluster_id"],
        "namespace" => &["bcs_cluster_id", "namespace"],
        "system" => &["bk_cloud_id", "bk_target_ip"],
        "k8s_address" => &["address"],
        "domain" => &["domain"],
        "apm_service" => &["bk_biz_id", "app_name", "apm_service_name"],
        "apm_service_instance" => &[
            "bk_biz_id",
            "app_name",
            "apm_service_name",
            "apm_service_instance_id",
        ],
        "datasource" => &["bk_data_id"],
        "bklogconfig" => &["bklogconfig_namespace", "bklogconfig_name"],
        "biz" => &["bk_biz_id"],
        "set" => &["bk_set_id"],
        "module" => &["bk_module_id"],
        "host" => &["bk_host_id"],
        "app_version" => &["bcs_cluster_id", "namespace", "app_version"],
        "git_commit" => &["git_repo", "commit_id"],
        "environment" => &["bcs_cluster_id", "namespace", "pod", "env_name"],
        _ => &[],
    }
}
