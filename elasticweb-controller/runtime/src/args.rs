use crate::{
    admission::{Admission, Bounds},
    controller::{self, Context},
    core::Reconciler,
    lease,
    metrics::ReconcileMetrics,
    store::KubeStore,
};
use anyhow::{bail, ensure, Context as _, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "elasticweb", about = "An ElasticWeb resource controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "elasticweb=info,warn",
        env = "ELASTICWEB_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Disables the admission controller server.
    #[clap(long)]
    admission_controller_disabled: bool,

    /// Total target capacity applied at admission when an ElasticWeb omits it.
    #[clap(long, default_value = "1200")]
    default_total_target_capacity: i32,

    /// Largest single pod capacity accepted at admission.
    #[clap(long, default_value = "1000")]
    max_single_pod_capacity: i32,

    /// Only reconcile while holding the controller's Lease.
    #[clap(long)]
    leader_election: bool,

    #[clap(long, default_value = "elasticweb-system")]
    controller_namespace: String,

    #[clap(long, default_value = "elasticweb-controller")]
    controller_deployment_name: String,

    /// Seconds between periodic passes over an unchanged ElasticWeb.
    #[clap(long, default_value = "300")]
    requeue_interval_secs: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            admission_controller_disabled,
            default_total_target_capacity,
            max_single_pod_capacity,
            leader_election,
            controller_namespace,
            controller_deployment_name,
            requeue_interval_secs,
        } = self;

        ensure!(
            default_total_target_capacity >= 0,
            "--default-total-target-capacity must not be negative"
        );
        ensure!(
            max_single_pod_capacity > 0,
            "--max-single-pod-capacity must be positive"
        );
        ensure!(
            requeue_interval_secs > 0,
            "--requeue-interval-secs must be positive"
        );

        let server = if admission_controller_disabled {
            None
        } else {
            Some(server)
        };

        let mut prom = <Registry>::default();
        let metrics =
            ReconcileMetrics::register(prom.sub_registry_with_prefix("elasticweb_reconcile"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(server)
            .build()
            .await?;

        let leadership = if leader_election {
            let hostname = std::env::var("HOSTNAME")
                .context("Failed to fetch `HOSTNAME` environment variable")?;
            let leadership = lease::init(
                &runtime,
                &controller_namespace,
                &controller_deployment_name,
                &hostname,
            )
            .await?;
            info!(%hostname, "Leader election enabled");
            Some(leadership)
        } else {
            None
        };

        let ctx = Arc::new(Context {
            reconciler: Reconciler::new(KubeStore::new(runtime.client())),
            metrics,
            leadership,
            requeue_interval: Duration::from_secs(requeue_interval_secs),
        });
        tokio::spawn(
            controller::run(runtime.client(), ctx, runtime.shutdown_handle())
                .instrument(info_span!("elasticwebs")),
        );

        let admission = Admission::new(Bounds {
            default_total_target_capacity,
            max_single_pod_capacity,
        });
        let runtime = runtime.spawn_server(move || admission);

        // Block the main thread on the shutdown signal. Once it fires, wait for the background
        // tasks to complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
