use crate::{
    core::{Object, Store, StoreError},
    k8s::{self, ErrorResponse, ResourceExt, ResourceId},
};

pub(crate) const FIELD_MANAGER: &str = "elasticweb-controller";

/// A [`Store`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: k8s::Client,
}

impl KubeStore {
    pub fn new(client: k8s::Client) -> Self {
        Self { client }
    }

    fn api<K: Object>(&self, ns: &str) -> k8s::Api<K> {
        k8s::Api::namespaced(self.client.clone(), ns)
    }
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Store for KubeStore {
    async fn get<K: Object>(&self, id: &ResourceId) -> Result<Option<K>, StoreError> {
        self.api::<K>(&id.namespace)
            .get_opt(&id.name)
            .await
            .map_err(store_error)
    }

    async fn create<K: Object>(&self, obj: &K) -> Result<K, StoreError> {
        let id = ResourceId::of(obj).ok_or(StoreError::Unnamed)?;
        self.api::<K>(&id.namespace)
            .create(&post_params(), obj)
            .await
            .map_err(store_error)
    }

    async fn update<K: Object>(&self, obj: &K) -> Result<K, StoreError> {
        let id = ResourceId::of(obj).ok_or(StoreError::Unnamed)?;
        self.api::<K>(&id.namespace)
            .replace(&id.name, &post_params(), obj)
            .await
            .map_err(store_error)
    }

    /// Writes through the status subresource. The patch carries the object's
    /// resource version so the API server rejects it if the object changed
    /// since it was read.
    async fn update_status<K: Object>(&self, obj: &K) -> Result<K, StoreError> {
        let id = ResourceId::of(obj).ok_or(StoreError::Unnamed)?;
        let patch = status_patch(obj)?;
        let params = k8s::PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.api::<K>(&id.namespace)
            .patch_status(&id.name, &params, &k8s::Patch::Merge(patch))
            .await
            .map_err(store_error)
    }
}

fn post_params() -> k8s::PostParams {
    k8s::PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

/// A merge patch that replaces `obj`'s status, conditioned on the resource
/// version `obj` was read at.
fn status_patch<K: Object>(obj: &K) -> Result<serde_json::Value, StoreError> {
    let status = serde_json::to_value(obj)
        .map_err(StoreError::transient)?
        .get("status")
        .cloned()
        .unwrap_or_default();
    Ok(serde_json::json!({
        "metadata": { "resourceVersion": obj.resource_version() },
        "status": status,
    }))
}

fn store_error(error: k8s::Error) -> StoreError {
    match error {
        k8s::Error::Api(ErrorResponse { code: 404, .. }) => StoreError::NotFound,
        k8s::Error::Api(ErrorResponse {
            code: 409,
            ref reason,
            ..
        }) if reason == "AlreadyExists" => StoreError::AlreadyExists,
        k8s::Error::Api(ErrorResponse { code: 409, .. }) => StoreError::Conflict,
        error => StoreError::transient(error),
    }
}
