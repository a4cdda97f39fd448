#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use elasticweb_controller_core as core;
pub use elasticweb_controller_k8s_api as k8s;

mod admission;
mod args;
mod controller;
mod lease;
mod metrics;
mod store;

pub use self::{
    admission::{Admission, Bounds},
    args::Args,
    metrics::ReconcileMetrics,
    store::KubeStore,
};
