//! Subscription and plan catalog handlers

use crate::api::{require_capability, SuccessResponse};
use crate::domain::{
    Capability, ChangePlanInput, PlanFeatures, SubscriptionStatus, TenantSubscription,
};
use crate::error::Result;
use crate::middleware::{AuthPrincipal, CurrentTenant};
use crate::state::HasServices;
use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub subscription: Option<TenantSubscription>,
    /// Stored status, or `expired` once the period has lapsed
    pub effective_status: Option<SubscriptionStatus>,
    /// Features usable right now; `None` when nothing is granted
    pub features: Option<PlanFeatures>,
}

/// Active plans, cheapest tier first
pub async fn list_plans<S: HasServices>(State(state): State<S>) -> Result<impl IntoResponse> {
    let plans = state.subscription_service().list_plans().await?;
    Ok(Json(SuccessResponse::new(plans)))
}

pub async fn get<S: HasServices>(
    State(state): State<S>,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<impl IntoResponse> {
    let now = Utc::now();
    let service = state.subscription_service();
    let subscription = service.current(tenant.id).await?;
    let features = service.enabled_features(tenant.id, now).await?;
    Ok(Json(SuccessResponse::new(SubscriptionResponse {
        effective_status: subscription.as_ref().map(|s| s.effective_status(now)),
        subscription,
        features,
    })))
}

pub async fn change_plan<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    CurrentTenant(tenant): CurrentTenant,
    Json(input): Json<ChangePlanInput>,
) -> Result<impl IntoResponse> {
    require_capability(&state, &principal, &tenant, Capability::ManageSettings).await?;
    let subscription = state
        .subscription_service()
        .change_plan(tenant.id, input.plan_id, Utc::now())
        .await?;
    Ok(Json(SuccessResponse::new(subscription)))
}

pub async fn cancel<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<impl IntoResponse> {
    require_capability(&state, &principal, &tenant, Capability::ManageSettings).await?;
    let subscription = state
        .subscription_service()
        .cancel(tenant.id, Utc::now())
        .await?;
    Ok(Json(SuccessResponse::new(subscription)))
}
