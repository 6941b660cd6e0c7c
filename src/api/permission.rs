//! Capability checks for the calling principal

use crate::api::SuccessResponse;
use crate::domain::{Capability, EffectivePermissions, StringUuid};
use crate::error::{AppError, Result};
use crate::middleware::{AuthPrincipal, CurrentContext};
use crate::state::HasServices;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub tenant_id: Option<StringUuid>,
    pub permissions: EffectivePermissions,
}

#[derive(Debug, Serialize)]
pub struct CapabilityCheckResponse {
    pub capability: Capability,
    pub allowed: bool,
}

/// Everything the caller may do in the resolved tenant
pub async fn list<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    CurrentContext(context): CurrentContext,
) -> Result<impl IntoResponse> {
    let permissions = state
        .permission_engine()
        .effective_permissions(&principal, context.tenant.as_ref())
        .await?;
    Ok(Json(SuccessResponse::new(PermissionsResponse {
        tenant_id: context.tenant_id(),
        permissions,
    })))
}

pub async fn check<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    CurrentContext(context): CurrentContext,
    Path(capability): Path<String>,
) -> Result<impl IntoResponse> {
    let capability: Capability = capability.parse().map_err(AppError::BadRequest)?;
    let allowed = state
        .permission_engine()
        .authorize(&principal, capability, context.tenant.as_ref())
        .await;
    Ok(Json(SuccessResponse::new(CapabilityCheckResponse {
        capability,
        allowed,
    })))
}
