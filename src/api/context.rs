//! Tenant context API handlers
//!
//! Staff pick the tenant they want to act on; the choice is stored against the
//! session cookie and consulted by the resolver on later requests.

use crate::api::{require_admin, MessageResponse, SuccessResponse};
use crate::domain::StringUuid;
use crate::error::Result;
use crate::middleware::{AuthPrincipal, CurrentContext};
use crate::repository::SessionRepository;
use crate::service::TenantContext;
use crate::state::HasServices;
use axum::{extract::State, response::IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct SelectTenantInput {
    pub tenant_id: StringUuid,
}

/// Resolved tenant and whether it was picked explicitly
pub async fn get(CurrentContext(context): CurrentContext) -> Result<impl IntoResponse> {
    Ok(Json(SuccessResponse::new(context)))
}

/// Store a tenant selector for the caller's session, issuing a session cookie if needed.
pub async fn select<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    jar: CookieJar,
    Json(input): Json<SelectTenantInput>,
) -> Result<impl IntoResponse> {
    require_admin(&principal)?;
    let tenant = state.tenant_service().find_any(input.tenant_id).await?;

    let cookie_name = state.config().tenancy.session_cookie.clone();
    let session_key = jar
        .get(&cookie_name)
        .map(|c| c.value().to_string())
        .unwrap_or_else(|| StringUuid::new_v4().to_string());

    state
        .session_repo()
        .set_selected_tenant(&session_key, tenant.id)
        .await?;
    info!(principal_id = %principal.id, tenant_id = %tenant.id, "Tenant selected for session");

    let cookie = Cookie::build((cookie_name, session_key))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    let context = TenantContext {
        tenant: Some(tenant),
        impersonating: true,
    };
    Ok((jar.add(cookie), Json(SuccessResponse::new(context))))
}

/// Forget the session's selector; resolution falls back to ownership or employment.
pub async fn clear<S: HasServices>(
    State(state): State<S>,
    AuthPrincipal(principal): AuthPrincipal,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    require_admin(&principal)?;
    if let Some(cookie) = jar.get(&state.config().tenancy.session_cookie) {
        state
            .session_repo()
            .clear_selected_tenant(cookie.value())
            .await?;
    }
    Ok(Json(MessageResponse::new("Tenant selection cleared")))
}
