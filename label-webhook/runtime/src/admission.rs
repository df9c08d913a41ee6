use crate::metrics::{AdmissionMetrics, Decision};
use bytes::Bytes;
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::core::DynamicObject;
use label_webhook_core::{Engine, ReviewRequest, Verdict};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Serves admission reviews, delegating decisions to the engine.
#[derive(Clone, Debug)]
pub struct Admission {
    engine: Engine,
    path: Arc<str>,
    metrics: AdmissionMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = kube::core::admission::AdmissionResponse;
type AdmissionReview = kube::core::admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<Bytes>;

// === impl Admission ===

impl<B> tower::Service<Request<B>> for Admission
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        trace!(method = %req.method(), uri = %req.uri(), headers = ?req.headers());
        if req.method() != http::Method::POST || req.uri().path() != &*self.path {
            return Box::pin(future::ok(empty_response(http::StatusCode::NOT_FOUND)));
        }

        if !is_json(req.headers()) {
            let content_type = req.headers().get(http::header::CONTENT_TYPE);
            warn!(?content_type, "Expected application/json");
            return Box::pin(future::ok(empty_response(
                http::StatusCode::UNSUPPORTED_MEDIA_TYPE,
            )));
        }

        let admission = self.clone();
        Box::pin(async move {
            let bytes = req
                .into_body()
                .collect()
                .await
                .map_err(|e| Error::Request(e.into()))?
                .to_bytes();
            let observer = admission.metrics.start();

            let mut review: Value = match serde_json::from_slice(&bytes) {
                Ok(review) => review,
                Err(error) => {
                    warn!(%error, "Failed to parse request body");
                    observer.end("", Decision::Invalid);
                    return json_response(AdmissionResponse::invalid(error).into_review());
                }
            };
            let uid = review
                .pointer("/request/uid")
                .and_then(Value::as_str)
                .map(str::to_owned);
            let object = take_object(&mut review)?;

            let review: AdmissionReview = match serde_json::from_value(review) {
                Ok(review) => review,
                Err(error) => {
                    warn!(%error, ?uid, "Failed to parse admission review");
                    observer.end("", Decision::Invalid);
                    return json_response(invalid(uid, error).into_review());
                }
            };
            trace!(?review);

            let req: Result<AdmissionRequest, _> = review.try_into();
            let rsp = match req {
                Ok(req) => {
                    debug!(uid = %req.uid, kind = %req.kind.kind, operation = ?req.operation);
                    let kind = req.kind.kind.clone();
                    let (rsp, decision) = admission.admit(req, object);
                    observer.end(&kind, decision);
                    rsp
                }
                Err(error) => {
                    warn!(%error, "Invalid admission request");
                    observer.end("", Decision::Invalid);
                    invalid(uid, error)
                }
            };
            debug!(?rsp);
            json_response(rsp.into_review())
        })
    }
}

impl Admission {
    pub const DEFAULT_PATH: &'static str = "/mutate";

    pub fn new(engine: Engine, path: impl Into<Arc<str>>, metrics: AdmissionMetrics) -> Self {
        Self {
            engine,
            path: path.into(),
            metrics,
        }
    }

    fn admit(&self, req: AdmissionRequest, object: Bytes) -> (AdmissionResponse, Decision) {
        let rsp = AdmissionResponse::from(&req);
        let review = ReviewRequest::new(req.uid, req.kind.kind, object);

        let kind = &review.kind;
        let uid = &review.uid;
        match self.engine.review(&review).verdict {
            Verdict::Denied { reason } => {
                info!(%uid, %kind, %reason, "Denied");
                (rsp.deny(reason), Decision::Denied)
            }
            Verdict::Allowed { patch: None } => {
                debug!(%uid, %kind, "Allowed");
                (rsp, Decision::Allowed)
            }
            Verdict::Allowed { patch: Some(patch) } => match rsp.clone().with_patch(patch) {
                Ok(rsp) => {
                    info!(%uid, %kind, "Allowed with patch");
                    (rsp, Decision::Patched)
                }
                Err(error) => {
                    warn!(%error, %uid, %kind, "Failed to serialize patch");
                    (rsp.deny(error), Decision::Denied)
                }
            },
        }
    }
}

/// Detaches the submitted object from a review so that the engine decodes it
/// as it was sent. Requests without an object produce an empty body.
///
/// The old object is dropped as well; it is never inspected and must not
/// prevent the request UID from being echoed.
fn take_object(review: &mut Value) -> serde_json::Result<Bytes> {
    if let Some(old) = review.pointer_mut("/request/oldObject") {
        *old = Value::Null;
    }
    match review.pointer_mut("/request/object").map(Value::take) {
        None | Some(Value::Null) => Ok(Bytes::new()),
        Some(object) => serde_json::to_vec(&object).map(Bytes::from),
    }
}

fn invalid(uid: Option<String>, error: impl ToString) -> AdmissionResponse {
    let mut rsp = AdmissionResponse::invalid(error);
    if let Some(uid) = uid {
        rsp.uid = uid;
    }
    rsp
}

fn is_json(headers: &http::HeaderMap) -> bool {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("application/json"))
}

fn empty_response(status: http::StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::default())
        .expect("empty response must be valid")
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}
