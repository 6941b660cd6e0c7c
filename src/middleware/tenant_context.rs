//! Per-request tenant resolution
//!
//! Authenticates the caller, resolves the tenant the request acts on and runs
//! the rest of the stack inside [`ambient::scope`]. The resolved
//! [`TenantContext`] (and the principal, when authenticated) are also
//! placed in request extensions for the extractors below.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::domain::Tenant;
use crate::error::AppError;
use crate::middleware::auth::authenticate;
use crate::middleware::metrics::ContextKind;
use crate::service::context::{ambient, ResolutionRequest, TenantContext};
use crate::state::HasServices;

pub async fn tenant_context_middleware<S: HasServices>(
    State(state): State<S>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = match authenticate(&state, request.headers()).await {
        Ok(principal) => principal,
        Err(e) => return e.into_response(),
    };

    let tenancy = &state.config().tenancy;
    let selector = request
        .headers()
        .get(tenancy.selector_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let session_key = CookieJar::from_headers(request.headers())
        .get(&tenancy.session_cookie)
        .map(|c| c.value().to_string());

    let context = state
        .context_resolver()
        .resolve(&ResolutionRequest {
            principal: principal.clone(),
            selector,
            session_key,
        })
        .await;

    if let Some(principal) = principal {
        request.extensions_mut().insert(principal);
    }
    request.extensions_mut().insert(context.clone());

    let kind = ContextKind::of(&context);
    let mut response = ambient::scope(context, next.run(request)).await;
    response.extensions_mut().insert(kind);
    response
}

/// The resolved context, empty when the middleware did not run
#[derive(Debug, Clone)]
pub struct CurrentContext(pub TenantContext);

impl<S: Send + Sync> FromRequestParts<S> for CurrentContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentContext(
            parts
                .extensions
                .get::<TenantContext>()
                .cloned()
                .unwrap_or_default(),
        ))
    }
}

/// The tenant the request acts on; rejects requests that resolved none
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub Tenant);

impl<S: Send + Sync> FromRequestParts<S> for CurrentTenant {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .and_then(|ctx| ctx.tenant.clone())
            .map(CurrentTenant)
            .ok_or_else(|| AppError::Forbidden("No tenant selected for this request".to_string()))
    }
}

