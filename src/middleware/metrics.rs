//! Request tracing and HTTP metrics
//!
//! [`ObservabilityLayer`] wraps the whole router. It assigns (or propagates) an
//! `x-request-id`, opens the request span and records counters and latency
//! labelled with how the tenant context was resolved. The tenant middleware
//! reports that through a [`ContextKind`] response extension; routes outside it
//! are labelled `none`.

use axum::{body::Body, http::Request, response::Response};
use metrics::{counter, gauge, histogram};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

use crate::service::TenantContext;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// How the request's tenant was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    None,
    Resolved,
    Impersonated,
}

impl ContextKind {
    pub fn of(context: &TenantContext) -> Self {
        match (&context.tenant, context.impersonating) {
            (None, _) => ContextKind::None,
            (Some(_), false) => ContextKind::Resolved,
            (Some(_), true) => ContextKind::Impersonated,
        }
    }

    fn as_label(self) -> &'static str {
        match self {
            ContextKind::None => "none",
            ContextKind::Resolved => "resolved",
            ContextKind::Impersonated => "impersonated",
        }
    }
}

#[derive(Clone)]
pub struct ObservabilityLayer;

impl<S> Layer<S> for ObservabilityLayer {
    type Service = ObservabilityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ObservabilityService { inner }
    }
}

#[derive(Clone)]
pub struct ObservabilityService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for ObservabilityService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let route = route_label(request.uri().path());
        let method = request.method().as_str().to_owned();
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let span = tracing::info_span!("http", %request_id, %method, %route);
        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                gauge!("tenantry_http_requests_in_flight").increment(1.0);
                let started = Instant::now();
                let outcome = inner.call(request).await;
                gauge!("tenantry_http_requests_in_flight").decrement(1.0);

                let mut response = outcome?;
                let context = response
                    .extensions()
                    .get::<ContextKind>()
                    .copied()
                    .unwrap_or(ContextKind::None)
                    .as_label();
                let status = response.status().as_u16().to_string();

                tracing::debug!(status = %status, context, "request finished");
                counter!(
                    "tenantry_http_requests_total",
                    "method" => method.clone(),
                    "route" => route.clone(),
                    "status" => status,
                    "context" => context
                )
                .increment(1);
                histogram!("tenantry_http_request_duration_seconds", "method" => method, "route" => route)
                    .record(started.elapsed().as_secs_f64());

                if let Ok(value) = request_id.parse() {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}

/// Path with identifier segments replaced by `{id}`, keeping label cardinality bounded.
fn route_label(path: &str) -> String {
    path.split('/')
        .map(|segment| if is_identifier(segment) { "{id}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_identifier(segment: &str) -> bool {
    Uuid::parse_str(segment).is_ok()
}
