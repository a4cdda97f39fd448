use crate::{k8s::ResourceId, store::Op, StoreError};
use thiserror::Error;

/// Why a reconciliation pass failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to {op} {kind} {id}: {source}")]
    Store {
        op: Op,
        kind: String,
        id: ResourceId,
        #[source]
        source: StoreError,
    },

    #[error("ElasticWeb {id} is misconfigured: {source}")]
    Config {
        id: ResourceId,
        #[source]
        source: ConfigError,
    },
}

/// A declared spec the controller cannot act on. These are normally rejected
/// at admission.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("spec.singlePodCapacity is unset")]
    MissingSinglePodCapacity,

    #[error("spec.singlePodCapacity must be positive, got {0}")]
    NonPositiveSinglePodCapacity(i32),

    #[error("spec.totalTargetCapacity is unset")]
    MissingTotalTargetCapacity,

    #[error("spec.totalTargetCapacity must not be negative, got {0}")]
    NegativeTotalTargetCapacity(i32),

    #[error("observed capacity overflows: {single_pod_capacity} * {replicas}")]
    CapacityOverflow {
        single_pod_capacity: i32,
        replicas: i32,
    },

    #[error("metadata.uid is unset")]
    MissingUid,
}

// === impl Error ===

impl Error {
    pub(crate) fn store(op: Op, kind: impl ToString, id: &ResourceId, source: StoreError) -> Self {
        Self::Store {
            op,
            kind: kind.to_string(),
            id: id.clone(),
            source,
        }
    }

    /// Store failures clear up on redelivery; a bad spec does not until the
    /// object is edited.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store { source, .. } => !matches!(source, StoreError::Unnamed),
            Self::Config { .. } => false,
        }
    }

    /// A short, stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store { source, .. } => match source {
                StoreError::AlreadyExists => "already_exists",
                StoreError::Conflict => "conflict",
                StoreError::NotFound => "not_found",
                StoreError::Unnamed => "unnamed",
                StoreError::Transient(_) => "transient",
            },
            Self::Config { .. } => "config",
        }
    }
}
