//! Builds the desired children of an `ElasticWeb` from its declared spec.
//!
//! These functions do no I/O and cannot fail. Owner references are attached
//! by the caller before the objects are created.

use crate::k8s::{
    api::core::v1 as corev1, ContainerSpec, Deployment, DeploymentSpec, ElasticWebSpec,
    ExposureType, LabelSelector, ObjectMeta, PodSpec, PodTemplateSpec, ResourceId, Service,
    ServiceSpec, APP_LABEL,
};
use k8s_openapi::apimachinery::pkg::{api::resource::Quantity, util::intstr::IntOrString};
use std::collections::BTreeMap;

pub const CPU_REQUEST: &str = "100m";
pub const CPU_LIMIT: &str = "100m";
pub const MEMORY_REQUEST: &str = "512Mi";
pub const MEMORY_LIMIT: &str = "512Mi";

/// Reuse a cached image when the node has one.
pub const IMAGE_PULL_POLICY: &str = "IfNotPresent";

const PROTOCOL: &str = "TCP";

/// Returns `ceil(total / single)`.
///
/// `single` must be positive. Any remainder rounds up so the workload is never
/// under-provisioned.
pub fn replicas(single_pod_capacity: i32, total_target_capacity: i32) -> i32 {
    debug_assert!(single_pod_capacity > 0);
    let whole = total_target_capacity / single_pod_capacity;
    whole + i32::from(total_target_capacity % single_pod_capacity > 0)
}

pub fn service(id: &ResourceId, spec: &ElasticWebSpec) -> Service {
    let ports = spec
        .exposure
        .ports
        .iter()
        .map(|p| corev1::ServicePort {
            name: Some(p.name.clone()),
            protocol: Some(PROTOCOL.to_string()),
            port: p.port,
            target_port: Some(IntOrString::Int(p.target_port)),
            ..Default::default()
        })
        .collect();

    Service {
        metadata: metadata(id),
        spec: Some(ServiceSpec {
            type_: Some(service_type(spec.exposure.type_).to_string()),
            ports: Some(ports),
            selector: Some(selector(id)),
            ..Default::default()
        }),
        status: None,
    }
}

pub fn deployment(id: &ResourceId, spec: &ElasticWebSpec, replicas: i32) -> Deployment {
    Deployment {
        metadata: metadata(id),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(selector(id)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(selector(id)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: spec.containers.iter().map(container).collect(),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

fn container(spec: &ContainerSpec) -> corev1::Container {
    let ports = spec
        .ports
        .iter()
        .map(|p| corev1::ContainerPort {
            name: Some(p.name.clone()),
            protocol: Some(PROTOCOL.to_string()),
            container_port: p.port,
            ..Default::default()
        })
        .collect();

    corev1::Container {
        name: spec.name.clone(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some(IMAGE_PULL_POLICY.to_string()),
        ports: Some(ports),
        resources: Some(corev1::ResourceRequirements {
            requests: Some(quantities(CPU_REQUEST, MEMORY_REQUEST)),
            limits: Some(quantities(CPU_LIMIT, MEMORY_LIMIT)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn quantities(cpu: &str, memory: &str) -> BTreeMap<String, Quantity> {
    [
        ("cpu".to_string(), Quantity(cpu.to_string())),
        ("memory".to_string(), Quantity(memory.to_string())),
    ]
    .into_iter()
    .collect()
}

fn service_type(t: ExposureType) -> &'static str {
    match t {
        ExposureType::ClusterLocal => "ClusterIP",
    }
}

fn metadata(id: &ResourceId) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(id.namespace.clone()),
        name: Some(id.name.clone()),
        ..Default::default()
    }
}

fn selector(id: &ResourceId) -> BTreeMap<String, String> {
    [(APP_LABEL.to_string(), id.name.clone())]
        .into_iter()
        .collect()
}
