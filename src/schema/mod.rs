//! Typed relation schema: resource/relation kinds and the static registry.
//!
//! Resource and relation kinds are open string tags (responses may carry kinds
//! this build does not know about), with associated constants for every kind the
//! registry references. Categories and directions are closed enums.

mod registry;

pub use registry::{find_schema, primary_keys, relation_schemas};

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::RelgraphError;

/// Kind of monitored entity, e.g. `pod`, `node`, `system`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(Cow<'static, str>);

impl ResourceType {
    pub const POD: Self = Self::from_static("pod");
    pub const NODE: Self = Self::from_static("node");
    pub const CONTAINER: Self = Self::from_static("container");
    pub const DEPLOYMENT: Self = Self::from_static("deployment");
    pub const REPLICA_SET: Self = Self::from_static("replicaset");
    pub const STATEFUL_SET: Self = Self::from_static("statefulset");
    pub const DAEMON_SET: Self = Self::from_static("daemonset");
    pub const JOB: Self = Self::from_static("job");
    pub const SERVICE: Self = Self::from_static("service");
    pub const INGRESS: Self = Self::from_static("ingress");
    pub const CLUSTER: Self = Self::from_static("cluster");
    pub const NAMESPACE: Self = Self::from_static("namespace");

    pub const SYSTEM: Self = Self::from_static("system");
    pub const K8S_ADDRESS: Self = Self::from_static("k8s_address");
    pub const DOMAIN: Self = Self::from_static("domain");

    pub const APM_SERVICE: Self = Self::from_static("apm_service");
    pub const APM_SERVICE_INSTANCE: Self = Self::from_static("apm_service_instance");

    pub const DATA_SOURCE: Self = Self::from_static("datasource");
    pub const BK_LOG_CONFIG: Self = Self::from_static("bklogconfig");

    pub const BIZ: Self = Self::from_static("biz");
    pub const SET: Self = Self::from_static("set");
    pub const MODULE: Self = Self::from_static("module");
    pub const HOST: Self = Self::from_static("host");

    pub const APP_VERSION: Self = Self::from_static("app_version");
    pub const GIT_COMMIT: Self = Self::from_static("git_commit");
    pub const ENVIRONMENT: Self = Self::from_static("environment");

    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for ResourceType {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

/// Kind of edge between two resource types, e.g. `node_with_pod`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationType(Cow<'static, str>);

impl RelationType {
    pub const NODE_WITH_SYSTEM: Self = Self::from_static("node_with_system");
    pub const NODE_WITH_POD: Self = Self::from_static("node_with_pod");
    pub const JOB_WITH_POD: Self = Self::from_static("job_with_pod");
    pub const POD_WITH_REPLICA_SET: Self = Self::from_static("pod_with_replicaset");
    pub const POD_WITH_STATEFUL_SET: Self = Self::from_static("pod_with_statefulset");
    pub const DAEMON_SET_WITH_POD: Self = Self::from_static("daemonset_with_pod");
    pub const DEPLOYMENT_WITH_REPLICA_SET: Self = Self::from_static("deployment_with_replicaset");
    pub const POD_WITH_SERVICE: Self = Self::from_static("pod_with_service");
    pub const INGRESS_WITH_SERVICE: Self = Self::from_static("ingress_with_service");

    pub const K8S_ADDRESS_WITH_SERVICE: Self = Self::from_static("k8s_address_with_service");
    pub const DOMAIN_WITH_SERVICE: Self = Self::from_static("domain_with_service");

    pub const APM_SERVICE_INSTANCE_WITH_POD: Self = Self::from_static("apm_service_instance_with_pod");
    pub const APM_SERVICE_INSTANCE_WITH_SYSTEM: Self =
        Self::from_static("apm_service_instance_with_system");
    pub const APM_SERVICE_WITH_APM_SERVICE_INSTANCE: Self =
        Self::from_static("apm_service_with_apm_service_instance");

    pub const CONTAINER_WITH_POD: Self = Self::from_static("container_with_pod");

    pub const DATA_SOURCE_WITH_POD: Self = Self::from_static("datasource_with_pod");
    pub const DATA_SOURCE_WITH_NODE: Self = Self::from_static("datasource_with_node");
    pub const BK_LOG_CONFIG_WITH_DATA_SOURCE: Self = Self::from_static("bklogconfig_with_datasource");

    pub const BIZ_WITH_SET: Self = Self::from_static("biz_with_set");
    pub const MODULE_WITH_SET: Self = Self::from_static("module_with_set");
    pub const HOST_WITH_MODULE: Self = Self::from_static("host_with_module");
    pub const HOST_WITH_SYSTEM: Self = Self::from_static("host_with_system");

    pub const APP_VERSION_WITH_CONTAINER: Self = Self::from_static("app_version_with_container");
    pub const APP_VERSION_WITH_SYSTEM: Self = Self::from_static("app_version_with_system");
    pub const CONTAINER_WITH_ENVIRONMENT: Self = Self::from_static("container_with_environment");
    pub const ENVIRONMENT_WITH_SYSTEM: Self = Self::from_static("environment_with_system");
    pub const APP_VERSION_WITH_GIT_COMMIT: Self = Self::from_static("app_version_with_git_commit");

    pub const POD_TO_POD: Self = Self::from_static("pod_to_pod");
    pub const POD_TO_SYSTEM: Self = Self::from_static("pod_to_system");
    pub const SYSTEM_TO_POD: Self = Self::from_static("system_to_pod");
    pub const SYSTEM_TO_SYSTEM: Self = Self::from_static("system_to_system");
    pub const SERVICE_TO_SERVICE: Self = Self::from_static("service_to_service");

    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RelationType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for RelationType {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

/// `static` relations are topology-derived with a fixed direction; `dynamic`
/// ones are observed at runtime and traversable both ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationCategory {
    Static,
    Dynamic,
}

impl RelationCategory {
    pub const ALL: [RelationCategory; 2] = [RelationCategory::Static, RelationCategory::Dynamic];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationCategory::Static => "static",
            RelationCategory::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for RelationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationCategory {
    type Err = RelgraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(RelationCategory::Static),
            "dynamic" => Ok(RelationCategory::Dynamic),
            other => Err(RelgraphError::InvalidInput(format!(
                "unknown relation category: {}",
                other
            ))),
        }
    }
}

/// Direction in which a relation is walked relative to its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalDirection {
    Outbound,
    Inbound,
    Both,
}

impl TraversalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraversalDirection::Outbound => "outbound",
            TraversalDirection::Inbound => "inbound",
            TraversalDirection::Both => "both",
        }
    }

    /// Whether a walk in `self` is permitted by the configured `allowed` setting.
    pub fn permitted_by(&self, allowed: TraversalDirection) -> bool {
        allowed == TraversalDirection::Both || allowed == *self
    }
}

impl fmt::Display for TraversalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraversalDirection {
    type Err = RelgraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outbound" => Ok(TraversalDirection::Outbound),
            "inbound" => Ok(TraversalDirection::Inbound),
            "both" => Ok(TraversalDirection::Both),
            other => Err(RelgraphError::InvalidInput(format!(
                "unknown traversal direction: {}",
                other
            ))),
        }
    }
}

/// One registered edge definition (from_type --relation_type--> to_type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationSchema {
    pub from_type: ResourceType,
    pub to_type: ResourceType,
    pub relation_type: RelationType,
    pub category: RelationCategory,
}

/// Deterministic resource id: `{type}:⟨k1=v1,k2=v2,...⟩` with keys sorted.
pub fn generate_resource_id<I, K, V>(resource_type: &ResourceType, labels: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let sorted: BTreeMap<String, String> = labels
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect();

    let pairs = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",");

    format!("{}:⟨{}⟩", resource_type, pairs)
}

/// Table holding liveness periods of a resource type.
pub fn liveness_table(resource_type: &ResourceType) -> String {
    format!("{}_liveness_record", resource_type)
}

/// Table holding liveness periods of a relation type.
pub fn relation_liveness_table(relation_type: &RelationType) -> String {
    format!("{}_liveness_record", relation_type)
}

/// Field in a resource liveness table that points back at the resource.
pub fn liveness_id_field(resource_type: &ResourceType) -> String {
    format!("{}_id", resource_type)
}
