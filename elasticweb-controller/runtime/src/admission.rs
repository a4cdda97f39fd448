use crate::{
    core::{status, synthesize},
    k8s::{ElasticWeb, ElasticWebSpec, Resource, ResourceExt},
};
use anyhow::{anyhow, bail, ensure, Result};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::core::{
    admission::{self, Operation},
    DynamicObject,
};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Defaults and validates `ElasticWeb` resources before they are persisted.
///
/// Serves two endpoints: `POST /mutate` fills in an unset total target
/// capacity and `POST /validate` rejects specs the reconciler cannot act on.
#[derive(Clone, Debug)]
pub struct Admission {
    bounds: Bounds,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub default_total_target_capacity: i32,
    pub max_single_pod_capacity: i32,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type AdmissionRequest = admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = admission::AdmissionResponse;
type AdmissionReview = admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<bytes::Bytes>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Hook {
    Mutate,
    Validate,
}

// === impl Admission ===

impl tower::Service<Request<hyper::body::Incoming>> for Admission {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        let hook = match (req.method(), req.uri().path()) {
            (&http::Method::POST, "/mutate") => Hook::Mutate,
            (&http::Method::POST, "/validate") => Hook::Validate,
            _ => {
                return Box::pin(future::ok(
                    Response::builder()
                        .status(http::StatusCode::NOT_FOUND)
                        .body(Body::default())
                        .expect("not found response must be valid"),
                ))
            }
        };

        let admission = self.clone();
        Box::pin(async move {
            let bytes = req.into_body().collect().await?.to_bytes();
            json_response(admission.review(hook, &bytes))
        })
    }
}

impl Admission {
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }

    fn review(&self, hook: Hook, body: &[u8]) -> AdmissionReview {
        let review: AdmissionReview = match serde_json::from_slice(body) {
            Ok(review) => review,
            Err(error) => {
                warn!(%error, "Failed to parse request body");
                return AdmissionResponse::invalid(error).into_review();
            }
        };
        trace!(?review);

        let rsp = match review.try_into() {
            Ok(req) => {
                debug!(?req);
                self.admit(hook, req)
            }
            Err(error) => {
                warn!(%error, "Invalid admission request");
                AdmissionResponse::invalid(error)
            }
        };
        debug!(?rsp);
        rsp.into_review()
    }

    fn admit(&self, hook: Hook, req: AdmissionRequest) -> AdmissionResponse {
        if !is_elastic_web(&req) {
            return AdmissionResponse::invalid(format_args!(
                "unsupported resource type: {}.{}.{}",
                req.kind.group, req.kind.version, req.kind.kind
            ));
        }

        let rsp = AdmissionResponse::from(&req);
        if !matches!(req.operation, Operation::Create | Operation::Update) {
            return rsp;
        }

        let (obj, spec) = match parse_spec(req) {
            Ok(parsed) => parsed,
            Err(error) => {
                info!(%error, "Failed to parse ElasticWeb spec");
                return rsp.deny(error);
            }
        };
        let ns = obj.namespace().unwrap_or_default();
        let name = obj.name_any();

        match hook {
            Hook::Mutate => match defaults(&spec, self.bounds.default_total_target_capacity) {
                Ok(None) => rsp,
                Ok(Some(patch)) => {
                    debug!(%ns, %name, "Defaulting totalTargetCapacity");
                    match rsp.with_patch(patch) {
                        Ok(rsp) => rsp,
                        Err(error) => {
                            warn!(%error, %ns, %name, "Failed to encode patch");
                            AdmissionResponse::invalid(error)
                        }
                    }
                }
                Err(error) => {
                    warn!(%error, %ns, %name, "Failed to build patch");
                    AdmissionResponse::invalid(error)
                }
            },
            Hook::Validate => match validate_spec(&spec, self.bounds.max_single_pod_capacity) {
                Ok(()) => rsp,
                Err(error) => {
                    info!(%error, %ns, %name, "Denied");
                    rsp.deny(error)
                }
            },
        }
    }
}

fn is_elastic_web(req: &AdmissionRequest) -> bool {
    req.kind.group.eq_ignore_ascii_case(&ElasticWeb::group(&()))
        && req.kind.kind.eq_ignore_ascii_case(&ElasticWeb::kind(&()))
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}

fn parse_spec(req: AdmissionRequest) -> Result<(DynamicObject, ElasticWebSpec)> {
    let obj = req
        .object
        .ok_or_else(|| anyhow!("admission request missing 'object'"))?;

    let spec = match obj.data.get("spec") {
        Some(data) => serde_json::from_value(data.clone())?,
        None => bail!("admission request missing 'spec'"),
    };

    Ok((obj, spec))
}

/// Returns a patch that sets the total target capacity when the object does
/// not declare one.
fn defaults(spec: &ElasticWebSpec, total: i32) -> serde_json::Result<Option<json_patch::Patch>> {
    if spec.total_target_capacity.is_some() {
        return Ok(None);
    }
    serde_json::from_value(serde_json::json!([{
        "op": "add",
        "path": "/spec/totalTargetCapacity",
        "value": total,
    }]))
    .map(Some)
}

fn validate_spec(spec: &ElasticWebSpec, max_single_pod_capacity: i32) -> Result<()> {
    let single = spec
        .single_pod_capacity
        .ok_or_else(|| anyhow!("singlePodCapacity must be set"))?;
    ensure!(
        single > 0,
        "singlePodCapacity must be positive, got {single}"
    );
    ensure!(
        single <= max_single_pod_capacity,
        "singlePodCapacity must not exceed {max_single_pod_capacity}, got {single}"
    );

    if let Some(total) = spec.total_target_capacity {
        ensure!(
            total >= 0,
            "totalTargetCapacity must not be negative, got {total}"
        );
        let replicas = synthesize::replicas(single, total);
        ensure!(
            status::capacity(single, replicas).is_some(),
            "totalTargetCapacity {total} overflows at {replicas} pods of {single}"
        );
    }

    ensure!(
        !spec.containers.is_empty(),
        "at least one container must be declared"
    );
    let mut names = HashSet::new();
    for c in &spec.containers {
        if !names.insert(c.name.as_str()) {
            bail!("container name {:?} is declared more than once", c.name);
        }
    }

    ensure!(
        !spec.exposure.ports.is_empty(),
        "at least one exposure port must be declared"
    );

    Ok(())
}
