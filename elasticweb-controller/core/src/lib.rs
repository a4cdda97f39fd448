#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod drift;
mod error;
mod reconcile;
pub mod status;
mod store;
pub mod synthesize;


pub use self::{
    error::{ConfigError, Error},
    reconcile::{Outcome, Reconciler, Scale},
    store::{Object, Op, Store, StoreError},
};
pub use elasticweb_controller_k8s_api as k8s;
