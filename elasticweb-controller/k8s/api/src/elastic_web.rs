use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Declares a horizontally scaled web workload in terms of throughput.
///
/// The controller runs `ceil(totalTargetCapacity / singlePodCapacity)`
/// replicas of the declared containers behind a cluster-local service.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "elasticweb.com.bolingcavalry",
    version = "v1",
    kind = "ElasticWeb",
    status = "ElasticWebStatus",
    shortname = "ew",
    printcolumn = r#"{"name":"SinglePodCapacity","type":"integer","jsonPath":".spec.singlePodCapacity"}"#,
    printcolumn = r#"{"name":"TotalTargetCapacity","type":"integer","jsonPath":".spec.totalTargetCapacity"}"#,
    printcolumn = r#"{"name":"ObservedCapacity","type":"integer","jsonPath":".status.observedCapacity"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ElasticWebSpec {
    /// Queries per second a single instance sustains. Required; the
    /// admission webhook rejects objects without it.
    pub single_pod_capacity: Option<i32>,

    /// Aggregate queries per second. Defaulted at admission when unset.
    pub total_target_capacity: Option<i32>,

    #[serde(default)]
    pub containers: Vec<ContainerSpec>,

    #[serde(default)]
    pub exposure: ExposureSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ContainerPort {
    pub name: String,
    pub port: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExposureSpec {
    #[serde(default, rename = "type")]
    pub type_: ExposureType,
    #[serde(default)]
    pub ports: Vec<ExposurePort>,
}

/// Only cluster-local exposure is supported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ExposureType {
    #[default]
    ClusterLocal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExposurePort {
    pub name: String,
    pub port: i32,
    pub target_port: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElasticWebStatus {
    /// `singlePodCapacity` times the last replica count the controller
    /// applied. Unset until the first successful reconciliation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_capacity: Option<i32>,
}
