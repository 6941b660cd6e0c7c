//! Per-tenant role permission editing

use crate::api::{require_capability, SuccessResponse};
use crate::domain::{Capability, RoleLevel, UpdateRolePermissionsInput};
use crate::error::{AppError, Result};
use crate::middleware::{AuthPrincipal, CurrentTenant};
use crate::state::HasServices;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

pub async fn list<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<impl IntoResponse> {
    require_capability(&state, &principal, &tenant, Capability::ManagePermissions).await?;
    let sets = state.role_permission_service().list(tenant.id).await?;
    Ok(Json(SuccessResponse::new(sets)))
}

/// Flip individual flags for one role level; unspecified flags keep their value.
pub async fn update<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    CurrentTenant(tenant): CurrentTenant,
    Path(role_level): Path<String>,
    Json(input): Json<UpdateRolePermissionsInput>,
) -> Result<impl IntoResponse> {
    require_capability(&state, &principal, &tenant, Capability::ManagePermissions).await?;
    let role_level: RoleLevel = role_level.parse().map_err(AppError::BadRequest)?;
    let set = state
        .role_permission_service()
        .update(tenant.id, role_level, &input.flags)
        .await?;
    Ok(Json(SuccessResponse::new(set)))
}
