use crate::{
    core::{Error, Reconciler},
    k8s::{self, Deployment, ElasticWeb, ResourceId, Service},
    lease::Leadership,
    metrics::ReconcileMetrics,
    store::KubeStore,
};
use futures::prelude::*;
use kube::runtime::controller::{self, Action, Controller};
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Delay before retrying a pass that failed against the API server.
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Delay before retrying an object whose spec cannot be acted on. Editing the
/// object triggers a pass sooner.
const CONFIG_BACKOFF: Duration = Duration::from_secs(60);

/// Delay before a replica that does not hold the lease checks again, so a
/// newly elected leader picks up every object promptly.
const STANDBY_REQUEUE: Duration = Duration::from_secs(5);

pub(crate) struct Context {
    pub(crate) reconciler: Reconciler<KubeStore>,
    pub(crate) metrics: ReconcileMetrics,
    pub(crate) leadership: Option<Leadership>,
    pub(crate) requeue_interval: Duration,
}

/// Runs reconciliation passes for every `ElasticWeb` until `drain` signals.
///
/// A pass is triggered by a change to an `ElasticWeb`, by a change to a
/// Deployment or Service it owns, and periodically after each successful pass.
pub(crate) async fn run(client: k8s::Client, ctx: Arc<Context>, drain: drain::Watch) {
    let (close_tx, close_rx) = tokio::sync::oneshot::channel::<()>();
    let controller = Controller::new(
        k8s::Api::<ElasticWeb>::all(client.clone()),
        k8s::watcher::Config::default(),
    )
    .owns(
        k8s::Api::<Deployment>::all(client.clone()),
        k8s::watcher::Config::default(),
    )
    .owns(
        k8s::Api::<Service>::all(client),
        k8s::watcher::Config::default(),
    )
    .graceful_shutdown_on(close_rx.map(|_| ()))
    .run(reconcile, error_policy, ctx)
    .for_each(|res| async move {
        match res {
            Ok((obj, _)) => debug!(%obj, "Reconciled"),
            Err(controller::Error::ReconcilerFailed(error, obj)) => {
                warn!(%obj, %error, "Reconciliation failed")
            }
            Err(error) => warn!(%error, "Controller error"),
        }
    });
    tokio::pin!(controller);

    info!("ElasticWeb controller running");
    tokio::select! {
        () = (&mut controller) => {}
        handle = drain.signaled() => {
            let _ = close_tx.send(());
            handle.release_after(controller).await;
        }
    }
    info!("ElasticWeb controller stopped");
}

async fn reconcile(web: Arc<ElasticWeb>, ctx: Arc<Context>) -> Result<Action, Error> {
    if let Some(action) = standby(ctx.leadership.as_ref()) {
        return Ok(action);
    }

    let Some(id) = ResourceId::of(web.as_ref()) else {
        return Ok(Action::await_change());
    };

    let start = Instant::now();
    let result = ctx.reconciler.reconcile(&id).await;
    ctx.metrics.observe(&result, start.elapsed());
    let outcome = result?;
    debug!(%id, ?outcome);
    Ok(Action::requeue(ctx.requeue_interval))
}

fn error_policy(_web: Arc<ElasticWeb>, error: &Error, _ctx: Arc<Context>) -> Action {
    Action::requeue(backoff(error))
}

/// Returns the requeue for a replica that must not write, if this is one.
fn standby(leadership: Option<&Leadership>) -> Option<Action> {
    match leadership {
        Some(leadership) if !leadership.is_leader() => Some(Action::requeue(STANDBY_REQUEUE)),
        _ => None,
    }
}

fn backoff(error: &Error) -> Duration {
    if error.is_retryable() {
        RETRY_BACKOFF
    } else {
        CONFIG_BACKOFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConfigError, Op, StoreError};

    #[test]
    fn store_failures_retry_quickly() {
        let error = Error::Store {
            op: Op::Update,
            kind: "Deployment".to_string(),
            id: ResourceId::new("ns-0", "web"),
            source: StoreError::Conflict,
        };
        assert_eq!(backoff(&error), RETRY_BACKOFF);
    }

    #[test]
    fn config_failures_back_off() {
        let error = Error::Config {
            id: ResourceId::new("ns-0", "web"),
            source: ConfigError::MissingSinglePodCapacity,
        };
        assert_eq!(backoff(&error), CONFIG_BACKOFF);
    }

    #[test]
    fn followers_requeue_promptly() {
        let follower = Leadership::fixed("elasticweb-controller-0", "elasticweb-controller-1");
        assert_eq!(
            standby(Some(&follower)),
            Some(Action::requeue(STANDBY_REQUEUE))
        );
        assert!(STANDBY_REQUEUE < Duration::from_secs(30));
    }

    #[test]
    fn leaders_and_single_replicas_reconcile() {
        let leader = Leadership::fixed("elasticweb-controller-0", "elasticweb-controller-0");
        assert_eq!(standby(Some(&leader)), None);
        assert_eq!(standby(None), None);
    }
}
