#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod elastic_web;
mod resource_id;

pub use self::{
    elastic_web::{
        ContainerPort, ContainerSpec, ElasticWeb, ElasticWebSpec, ElasticWebStatus, ExposurePort,
        ExposureSpec, ExposureType,
    },
    resource_id::ResourceId,
};
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{Container, PodSpec, PodTemplateSpec, Service, ServiceSpec},
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference},
    NamespaceResourceScope,
};
pub use kube::{
    api::{Api, ObjectMeta, Patch, PatchParams, PostParams, ResourceExt},
    core::ErrorResponse,
    runtime::watcher,
    Client, Error, Resource,
};

/// Label key shared by the exposure selector and the workload pod template.
pub const APP_LABEL: &str = "app";
