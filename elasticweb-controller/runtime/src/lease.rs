use crate::{
    k8s::{self, Deployment, ObjectMeta, Resource},
    store::FIELD_MANAGER,
};
use anyhow::{anyhow, Result};
use k8s_openapi::api::coordination::v1 as coordv1;
use std::sync::Arc;
use tokio::{sync::watch, time};

const LEASE_DURATION: time::Duration = time::Duration::from_secs(30);
const LEASE_NAME: &str = "elasticweb-controller-write";
const RENEW_GRACE_PERIOD: time::Duration = time::Duration::from_secs(1);

/// Whether this replica may write. Only the holder of the lease reconciles.
#[derive(Clone, Debug)]
pub(crate) struct Leadership {
    claims: watch::Receiver<Arc<kubert::lease::Claim>>,
    hostname: String,
}

impl Leadership {
    pub(crate) fn is_leader(&self) -> bool {
        self.claims.borrow().is_current_for(&self.hostname)
    }

    /// A claim held by `holder` that never expires, as seen from `hostname`.
    #[cfg(test)]
    pub(crate) fn fixed(holder: &str, hostname: &str) -> Self {
        let claim = kubert::lease::Claim {
            holder: holder.to_string(),
            expiry: chrono::DateTime::<chrono::Utc>::MAX_UTC,
        };
        let (_claims_tx, claims) = watch::channel(Arc::new(claim));
        Self {
            claims,
            hostname: hostname.to_string(),
        }
    }
}

pub(crate) async fn init<T>(
    runtime: &kubert::Runtime<T>,
    ns: &str,
    deployment_name: &str,
    hostname: &str,
) -> Result<Leadership> {
    // The controller's own Deployment owns the Lease so that uninstalling the
    // controller removes it.
    let api = k8s::Api::<Deployment>::namespaced(runtime.client(), ns);
    let deployment = api.get(deployment_name).await?;
    let owner = deployment
        .controller_owner_ref(&())
        .ok_or_else(|| anyhow!("Deployment {ns}/{deployment_name} has no uid"))?;

    let lease = coordv1::Lease {
        metadata: ObjectMeta {
            name: Some(LEASE_NAME.to_string()),
            namespace: Some(ns.to_string()),
            // Specifying a resource version of "0" means that we will
            // only create the Lease if it does not already exist.
            resource_version: Some("0".to_string()),
            owner_references: Some(vec![owner]),
            labels: Some(
                [(
                    "app.kubernetes.io/managed-by".to_string(),
                    FIELD_MANAGER.to_string(),
                )]
                .into_iter()
                .collect(),
            ),
            ..Default::default()
        },
        spec: None,
    };
    let api = k8s::Api::<coordv1::Lease>::namespaced(runtime.client(), ns);
    match api
        .patch(
            LEASE_NAME,
            &k8s::PatchParams::apply(FIELD_MANAGER),
            &k8s::Patch::Apply(lease),
        )
        .await
    {
        Ok(lease) => tracing::info!(?lease, "Created Lease resource"),
        Err(k8s::Error::Api(_)) => tracing::debug!("Lease already exists, no need to create it"),
        Err(error) => {
            return Err(error.into());
        }
    };

    let params = kubert::lease::ClaimParams {
        lease_duration: LEASE_DURATION,
        renew_grace_period: RENEW_GRACE_PERIOD,
    };
    let (claims, _task) = kubert::lease::LeaseManager::init(api, LEASE_NAME)
        .await?
        .spawn(hostname, params)
        .await?;
    Ok(Leadership {
        claims,
        hostname: hostname.to_string(),
    })
}
