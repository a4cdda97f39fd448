use crate::{
    drift,
    error::{ConfigError, Error},
    k8s::{Deployment, ElasticWeb, OwnerReference, Resource, ResourceId, Service},
    status,
    store::{Object, Op, Store, StoreError},
    synthesize,
};
use tracing::{debug, info, instrument};

/// Drives the children of an `ElasticWeb` toward its declared spec.
///
/// A pass re-reads everything it needs from the store and keeps nothing
/// between passes, so it is safe to run against state left behind by an
/// abandoned or failed pass. Passes for the same object must not overlap.
#[derive(Clone, Debug)]
pub struct Reconciler<S> {
    store: S,
}

/// The terminal state of a successful pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The `ElasticWeb` no longer exists.
    ParentMissing,

    /// No demand and nothing built.
    Idle,

    /// Children were created with `replicas` instances.
    Bootstrapped { replicas: i32 },

    /// Existing children were brought in line with the declared `spec`.
    Converged {
        scaled: Option<Scale>,
        images_updated: usize,
        status_published: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Scale {
    pub from: Option<i32>,
    pub to: i32,
}

/// Everything derived from the parent before the first write.
#[derive(Clone, Debug)]
struct Plan {
    total_target_capacity: i32,
    replicas: i32,
    capacity: i32,
    owner: OwnerReference,
}

// === impl Reconciler ===

impl<S: Store> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(skip_all, fields(namespace = %id.namespace, name = %id.name))]
    pub async fn reconcile(&self, id: &ResourceId) -> Result<Outcome, Error> {
        let Some(web) = self.get::<ElasticWeb>(id).await? else {
            debug!("ElasticWeb not found");
            return Ok(Outcome::ParentMissing);
        };

        let plan = Plan::new(id, &web)?;

        match self.get::<Deployment>(id).await? {
            None if plan.total_target_capacity < 1 => {
                debug!("No demand and no Deployment");
                Ok(Outcome::Idle)
            }
            None => self.bootstrap(id, web, &plan).await,
            Some(deployment) => self.converge(id, web, deployment, &plan).await,
        }
    }

    async fn bootstrap(
        &self,
        id: &ResourceId,
        web: ElasticWeb,
        plan: &Plan,
    ) -> Result<Outcome, Error> {
        if self.get::<Service>(id).await?.is_some() {
            debug!("Service already exists");
        } else {
            let mut svc = synthesize::service(id, &web.spec);
            svc.metadata.owner_references = Some(vec![plan.owner.clone()]);
            self.create(id, &svc).await?;
        }

        let mut deployment = synthesize::deployment(id, &web.spec, plan.replicas);
        deployment.metadata.owner_references = Some(vec![plan.owner.clone()]);
        self.create(id, &deployment).await?;

        self.publish_status(id, web, plan.capacity).await?;
        Ok(Outcome::Bootstrapped {
            replicas: plan.replicas,
        })
    }

    async fn converge(
        &self,
        id: &ResourceId,
        web: ElasticWeb,
        mut deployment: Deployment,
        plan: &Plan,
    ) -> Result<Outcome, Error> {
        let live = deployment.spec.as_ref().and_then(|s| s.replicas);
        debug!(expected = plan.replicas, ?live, "Comparing replicas");

        let mut scaled = None;
        if live != Some(plan.replicas) {
            info!(from = ?live, to = plan.replicas, "Scaling Deployment");
            deployment.spec.get_or_insert_with(Default::default).replicas = Some(plan.replicas);
            deployment = self.update(id, &deployment).await?;
            scaled = Some(Scale {
                from: live,
                to: plan.replicas,
            });
        }

        let corrected = drift::correct_images(&mut deployment, &web.spec.containers);
        if !corrected.is_empty() {
            info!(containers = ?corrected, "Correcting container images");
            self.update(id, &deployment).await?;
        }

        // A prior pass may have scaled the Deployment and then failed to write
        // status, so a stale status is republished even when nothing scaled.
        let status_published =
            scaled.is_some() || status::observed_capacity(&web) != Some(plan.capacity);
        if status_published {
            self.publish_status(id, web, plan.capacity).await?;
        }

        Ok(Outcome::Converged {
            scaled,
            images_updated: corrected.len(),
            status_published,
        })
    }

    async fn publish_status(
        &self,
        id: &ResourceId,
        mut web: ElasticWeb,
        capacity: i32,
    ) -> Result<(), Error> {
        status::set_observed_capacity(&mut web, capacity);
        self.store
            .update_status(&web)
            .await
            .map_err(|e| Error::store(Op::UpdateStatus, kind::<ElasticWeb>(), id, e))?;
        info!(observed_capacity = capacity, "Published status");
        Ok(())
    }

    async fn get<K: Object>(&self, id: &ResourceId) -> Result<Option<K>, Error> {
        self.store
            .get::<K>(id)
            .await
            .map_err(|e| Error::store(Op::Get, kind::<K>(), id, e))
    }

    /// An object that already exists was created by an earlier, partially
    /// applied pass.
    async fn create<K: Object>(&self, id: &ResourceId, obj: &K) -> Result<(), Error> {
        match self.store.create(obj).await {
            Ok(_) => {
                info!(kind = %kind::<K>(), "Created");
                Ok(())
            }
            Err(StoreError::AlreadyExists) => {
                debug!(kind = %kind::<K>(), "Already exists");
                Ok(())
            }
            Err(e) => Err(Error::store(Op::Create, kind::<K>(), id, e)),
        }
    }

    async fn update<K: Object>(&self, id: &ResourceId, obj: &K) -> Result<K, Error> {
        self.store
            .update(obj)
            .await
            .map_err(|e| Error::store(Op::Update, kind::<K>(), id, e))
    }
}

// === impl Plan ===

impl Plan {
    fn new(id: &ResourceId, web: &ElasticWeb) -> Result<Self, Error> {
        Self::derive(web).map_err(|source| {
            tracing::error!(error = %source, "Refusing to reconcile");
            Error::Config {
                id: id.clone(),
                source,
            }
        })
    }

    fn derive(web: &ElasticWeb) -> Result<Self, ConfigError> {
        let single = web
            .spec
            .single_pod_capacity
            .ok_or(ConfigError::MissingSinglePodCapacity)?;
        if single <= 0 {
            return Err(ConfigError::NonPositiveSinglePodCapacity(single));
        }

        let total = web
            .spec
            .total_target_capacity
            .ok_or(ConfigError::MissingTotalTargetCapacity)?;
        if total < 0 {
            return Err(ConfigError::NegativeTotalTargetCapacity(total));
        }

        let replicas = synthesize::replicas(single, total);
        let capacity =
            status::capacity(single, replicas).ok_or(ConfigError::CapacityOverflow {
                single_pod_capacity: single,
                replicas,
            })?;

        let owner = web
            .controller_owner_ref(&())
            .ok_or(ConfigError::MissingUid)?;

        Ok(Self {
            total_target_capacity: total,
            replicas,
            capacity,
            owner,
        })
    }
}

fn kind<K: Object>() -> String {
    K::kind(&()).into_owned()
}
