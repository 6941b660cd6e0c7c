//! Tenant API handlers

use crate::api::{require_superuser, MessageResponse, SuccessResponse};
use crate::domain::{CreateTenantInput, StringUuid};
use crate::error::{AppError, Result};
use crate::middleware::{AuthPrincipal, CurrentTenant};
use crate::state::HasServices;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

/// Sign up a tenant owned by the caller
pub async fn create<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    Json(input): Json<CreateTenantInput>,
) -> Result<impl IntoResponse> {
    let provisioned = state
        .tenant_service()
        .create(&principal, input, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(provisioned))))
}

pub async fn current(CurrentTenant(tenant): CurrentTenant) -> Result<impl IntoResponse> {
    Ok(Json(SuccessResponse::new(tenant)))
}

/// Soft delete the current tenant. Owner or superuser only.
pub async fn delete_current<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<impl IntoResponse> {
    if !(principal.is_superuser || tenant.is_owned_by(principal.id)) {
        return Err(AppError::Forbidden(
            "Only the owner can delete a tenant".to_string(),
        ));
    }
    state
        .tenant_service()
        .soft_delete(tenant.id, Some(principal.id), Utc::now())
        .await?;
    Ok(Json(MessageResponse::new("Tenant deleted")))
}

pub async fn restore<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    require_superuser(&principal)?;
    let tenant = state.tenant_service().restore(id).await?;
    Ok(Json(SuccessResponse::new(tenant)))
}
