//! Employee API handlers

use crate::api::{require_capability, MessageResponse, SuccessResponse};
use crate::domain::{Capability, CreateEmploymentInput, StringUuid};
use crate::error::Result;
use crate::middleware::{AuthPrincipal, CurrentTenant};
use crate::state::HasServices;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

pub async fn list<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<impl IntoResponse> {
    require_capability(&state, &principal, &tenant, Capability::ManageStaff).await?;
    let employees = state.employment_service().list(tenant.id).await?;
    Ok(Json(SuccessResponse::new(employees)))
}

pub async fn hire<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    CurrentTenant(tenant): CurrentTenant,
    Json(input): Json<CreateEmploymentInput>,
) -> Result<impl IntoResponse> {
    require_capability(&state, &principal, &tenant, Capability::ManageStaff).await?;
    let employment = state
        .employment_service()
        .hire(&tenant, input, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(employment))))
}

/// Soft delete
pub async fn dismiss<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    CurrentTenant(tenant): CurrentTenant,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    require_capability(&state, &principal, &tenant, Capability::ManageStaff).await?;
    state
        .employment_service()
        .dismiss(tenant.id, id, principal.id, Utc::now())
        .await?;
    Ok(Json(MessageResponse::new("Employee dismissed")))
}

pub async fn restore<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    CurrentTenant(tenant): CurrentTenant,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    require_capability(&state, &principal, &tenant, Capability::ManageStaff).await?;
    let employment = state.employment_service().restore(tenant.id, id).await?;
    Ok(Json(SuccessResponse::new(employment)))
}
