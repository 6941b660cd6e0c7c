//! SMS credit balance and ledger handlers

use crate::api::{
    require_any_capability, require_capability, require_superuser, PaginatedResponse,
    PaginationQuery, SuccessResponse,
};
use crate::domain::{AdjustBalanceInput, Capability, VerifyLedgerInput};
use crate::error::Result;
use crate::middleware::{AuthPrincipal, CurrentTenant};
use crate::state::HasServices;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

pub async fn balance<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<impl IntoResponse> {
    require_any_capability(
        &state,
        &principal,
        &tenant,
        &[Capability::SendSms, Capability::ViewFinancials],
    )
    .await?;
    let balance = state.sms_ledger_service().get_balance(tenant.id).await?;
    Ok(Json(SuccessResponse::new(balance)))
}

/// Ledger rows, newest first
pub async fn transactions<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    CurrentTenant(tenant): CurrentTenant,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    require_capability(&state, &principal, &tenant, Capability::ViewFinancials).await?;
    let (rows, total) = state
        .sms_ledger_service()
        .list_transactions(tenant.id, pagination.offset(), pagination.per_page)
        .await?;
    Ok(Json(PaginatedResponse::new(
        rows,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Signed manual correction on any tenant's balance
pub async fn adjust<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    Json(input): Json<AdjustBalanceInput>,
) -> Result<impl IntoResponse> {
    require_superuser(&principal)?;
    input.validate()?;
    let transaction = state
        .sms_ledger_service()
        .adjust(input.tenant_id, input.delta, principal.id, &input.description)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(transaction))))
}

/// Replay a tenant's ledger, optionally lifting a hold once it reconciles
pub async fn verify<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    Json(input): Json<VerifyLedgerInput>,
) -> Result<impl IntoResponse> {
    require_superuser(&principal)?;
    let ledger = state.sms_ledger_service();
    let audit = if input.release_hold {
        ledger.release_hold(input.tenant_id).await?
    } else {
        ledger.verify(input.tenant_id).await?
    };
    Ok(Json(SuccessResponse::new(audit)))
}
