use super::*;
use crate::{
    k8s::{Service, ServiceSpec},
    tests::memory::Write,
    ConfigError, Error, Op, Outcome, StoreError,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use pretty_assertions::assert_eq;

fn write(op: Op, kind: &str) -> Write {
    Write {
        op,
        kind: kind.to_string(),
        name: NAME.to_string(),
    }
}

#[tokio::test]
async fn creates_children_and_publishes_capacity() {
    let reconciler = reconciler();
    let store = reconciler.store();
    store.seed(make_web(
        make_spec(Some(100), Some(250), &[("web", "nginx:1.0")]),
        None,
    ));

    let outcome = reconciler.reconcile(&id()).await.expect("pass must succeed");
    assert_eq!(outcome, Outcome::Bootstrapped { replicas: 3 });

    assert_eq!(
        store.writes(),
        vec![
            write(Op::Create, "Service"),
            write(Op::Create, "Deployment"),
            write(Op::UpdateStatus, "ElasticWeb"),
        ]
    );

    let svc = store.object::<Service>(&id()).expect("service must exist");
    let ports = svc
        .spec
        .and_then(|s| s.ports)
        .expect("service must have ports")
        .into_iter()
        .map(|p| (p.name.unwrap_or_default(), p.port, p.target_port))
        .collect::<Vec<_>>();
    assert_eq!(
        ports,
        vec![("http".to_string(), 80, Some(IntOrString::Int(80)))]
    );

    assert_eq!(live_replicas(store), Some(3));
    assert_eq!(
        live_images(store),
        vec![("web".to_string(), Some("nginx:1.0".to_string()))]
    );
    assert_eq!(observed_capacity(store), Some(300));
}

#[tokio::test]
async fn children_are_owned_by_the_parent() {
    let reconciler = reconciler();
    let store = reconciler.store();
    store.seed(make_web(
        make_spec(Some(100), Some(100), &[("web", "nginx:1.0")]),
        None,
    ));

    reconciler.reconcile(&id()).await.expect("pass must succeed");

    let svc = store.object::<Service>(&id()).unwrap();
    let deploy = store.object::<Deployment>(&id()).unwrap();
    for owners in [svc.metadata.owner_references, deploy.metadata.owner_references] {
        let owners = owners.expect("child must have owner references");
        assert_eq!(owners.len(), 1);
        let owner = &owners[0];
        assert_eq!(owner.kind, "ElasticWeb");
        assert_eq!(owner.api_version, "elasticweb.com.bolingcavalry/v1");
        assert_eq!(owner.name, NAME);
        assert_eq!(owner.uid, PARENT_UID);
        assert_eq!(owner.controller, Some(true));
    }
}

#[tokio::test]
async fn second_pass_creates_nothing() {
    let reconciler = reconciler();
    let store = reconciler.store();
    store.seed(make_web(
        make_spec(Some(100), Some(250), &[("web", "nginx:1.0")]),
        None,
    ));

    reconciler.reconcile(&id()).await.expect("first pass must succeed");
    let writes = store.writes().len();

    let outcome = reconciler.reconcile(&id()).await.expect("second pass must succeed");
    assert_eq!(
        outcome,
        Outcome::Converged {
            scaled: None,
            images_updated: 0,
            status_published: false,
        }
    );
    assert_eq!(store.writes().len(), writes);
    assert_eq!(store.count::<Service>(), 1);
    assert_eq!(store.count::<Deployment>(), 1);
}

#[tokio::test]
async fn existing_service_is_kept() {
    let reconciler = reconciler();
    let store = reconciler.store();
    store.seed(make_web(
        make_spec(Some(100), Some(1200), &[("web", "nginx:1.0")]),
        None,
    ));
    // Left by a pass that failed after creating the Service.
    store.seed(Service {
        metadata: ObjectMeta {
            namespace: Some(NAMESPACE.to_string()),
            name: Some(NAME.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        status: None,
    });

    let outcome = reconciler.reconcile(&id()).await.expect("pass must succeed");
    assert_eq!(outcome, Outcome::Bootstrapped { replicas: 12 });
    assert_eq!(
        store.writes(),
        vec![
            write(Op::Create, "Deployment"),
            write(Op::UpdateStatus, "ElasticWeb"),
        ]
    );
    assert_eq!(store.count::<Service>(), 1);
    assert_eq!(observed_capacity(store), Some(1200));
}

#[tokio::test]
async fn already_exists_on_create_is_success() {
    let reconciler = reconciler();
    let store = reconciler.store();
    store.seed(make_web(
        make_spec(Some(100), Some(250), &[("web", "nginx:1.0")]),
        None,
    ));
    store.fail_next::<Deployment>(Op::Create, StoreError::AlreadyExists);

    let outcome = reconciler.reconcile(&id()).await.expect("pass must succeed");
    assert_eq!(outcome, Outcome::Bootstrapped { replicas: 3 });
    assert_eq!(observed_capacity(store), Some(300));
}

#[tokio::test]
async fn zero_demand_builds_nothing() {
    let reconciler = reconciler();
    let store = reconciler.store();
    store.seed(make_web(
        make_spec(Some(100), Some(0), &[("web", "nginx:1.0")]),
        None,
    ));

    let outcome = reconciler.reconcile(&id()).await.expect("pass must succeed");
    assert_eq!(outcome, Outcome::Idle);
    assert!(store.writes().is_empty());
    assert_eq!(store.count::<Service>(), 0);
    assert_eq!(store.count::<Deployment>(), 0);
}

#[tokio::test]
async fn missing_parent_is_a_no_op() {
    let reconciler = reconciler();
    let outcome = reconciler.reconcile(&id()).await.expect("pass must succeed");
    assert_eq!(outcome, Outcome::ParentMissing);
    assert!(reconciler.store().writes().is_empty());
}

#[tokio::test]
async fn unset_capacity_is_a_config_error() {
    let reconciler = reconciler();
    let store = reconciler.store();
    store.seed(make_web(
        make_spec(None, Some(250), &[("web", "nginx:1.0")]),
        None,
    ));

    let error = reconciler.reconcile(&id()).await.unwrap_err();
    assert!(!error.is_retryable());
    assert_eq!(error.kind(), "config");
    match error {
        Error::Config { id: err_id, source } => {
            assert_eq!(err_id, id());
            assert_eq!(source, ConfigError::MissingSinglePodCapacity);
        }
        error => panic!("unexpected error: {error}"),
    }
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn malformed_specs_are_not_acted_on() {
    let cases = [
        (Some(0), Some(250), ConfigError::NonPositiveSinglePodCapacity(0)),
        (Some(-5), Some(250), ConfigError::NonPositiveSinglePodCapacity(-5)),
        (Some(100), None, ConfigError::MissingTotalTargetCapacity),
        (Some(100), Some(-1), ConfigError::NegativeTotalTargetCapacity(-1)),
    ];
    for (single, total, expected) in cases {
        let reconciler = reconciler();
        let store = reconciler.store();
        store.seed(make_web(make_spec(single, total, &[("web", "v1")]), None));

        match reconciler.reconcile(&id()).await {
            Err(Error::Config { source, .. }) => assert_eq!(source, expected),
            res => panic!("unexpected result: {res:?}"),
        }
        assert!(store.writes().is_empty());
    }
}

#[tokio::test]
async fn parent_without_uid_is_a_config_error() {
    let reconciler = reconciler();
    let store = reconciler.store();
    let mut web = make_web(make_spec(Some(100), Some(100), &[("web", "v1")]), None);
    web.metadata.uid = None;
    store.seed(web);

    match reconciler.reconcile(&id()).await {
        Err(Error::Config { source, .. }) => assert_eq!(source, ConfigError::MissingUid),
        res => panic!("unexpected result: {res:?}"),
    }
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn create_failures_surface() {
    let reconciler = reconciler();
    let store = reconciler.store();
    store.seed(make_web(
        make_spec(Some(100), Some(250), &[("web", "nginx:1.0")]),
        None,
    ));
    store.fail_next::<Deployment>(Op::Create, StoreError::transient("connection reset"));

    let error = reconciler.reconcile(&id()).await.unwrap_err();
    assert!(error.is_retryable());
    assert_eq!(error.kind(), "transient");
    assert_eq!(
        error.to_string(),
        "failed to create Deployment ns-0/web: connection reset"
    );
    // The Service write stands; the next pass picks up from there.
    assert_eq!(store.count::<Service>(), 1);
    assert_eq!(store.count::<Deployment>(), 0);
    assert_eq!(observed_capacity(store), None);

    let outcome = reconciler.reconcile(&id()).await.expect("retry must succeed");
    assert_eq!(outcome, Outcome::Bootstrapped { replicas: 3 });
    assert_eq!(store.count::<Service>(), 1);
    assert_eq!(store.count::<Deployment>(), 1);
    assert_eq!(observed_capacity(store), Some(300));
}
