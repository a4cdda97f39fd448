use crate::k8s::{NamespaceResourceScope, Resource, ResourceId};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use thiserror::Error;

/// A namespaced API object the controller reads or writes.
pub trait Object:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
}

impl<K> Object for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + fmt::Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static
{
}

/// The canonical object store.
///
/// Every call is independently atomic; no transaction spans objects. Writes
/// are conditioned on the `resourceVersion` the object carries, so an update
/// built from a stale read fails with [`StoreError::Conflict`] rather than
/// overwriting a concurrent change.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Returns `Ok(None)` when no such object exists.
    async fn get<K: Object>(&self, id: &ResourceId) -> Result<Option<K>, StoreError>;

    async fn create<K: Object>(&self, obj: &K) -> Result<K, StoreError>;

    /// Replaces the main resource. The status subresource is left untouched.
    async fn update<K: Object>(&self, obj: &K) -> Result<K, StoreError>;

    /// Replaces only the status subresource.
    async fn update_status<K: Object>(&self, obj: &K) -> Result<K, StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object already exists")]
    AlreadyExists,

    #[error("object was modified concurrently")]
    Conflict,

    #[error("object not found")]
    NotFound,

    #[error("object has no namespace or name")]
    Unnamed,

    #[error(transparent)]
    Transient(Box<dyn std::error::Error + Send + Sync + 'static>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Create,
    Update,
    UpdateStatus,
}

// === impl StoreError ===

impl StoreError {
    pub fn transient(error: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Transient(error.into())
    }
}

// === impl Op ===

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::UpdateStatus => "update status of",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
