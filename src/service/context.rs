//! Tenant context resolution and the ambient per-request tenant
//!
//! [`ContextResolver`] decides which tenant a request acts on. The result is
//! bound to the request's task through [`ambient::scope`] so data access deep in
//! the call stack can read it without threading it through every signature.

use crate::config::TenancyConfig;
use crate::domain::{Principal, StringUuid, Tenant};
use crate::error::Result;
use crate::repository::{EmploymentRepository, Scope, SessionRepository, TenantRepository};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tenant a request acts on
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TenantContext {
    pub tenant: Option<Tenant>,
    /// Set when an admin picked the tenant explicitly rather than through ownership or employment
    pub impersonating: bool,
}

impl TenantContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn tenant_id(&self) -> Option<StringUuid> {
        self.tenant.as_ref().map(|t| t.id)
    }
}

/// Inputs to resolution, extracted from the request
#[derive(Debug, Clone, Default)]
pub struct ResolutionRequest {
    pub principal: Option<Principal>,
    /// Raw value of the tenant selector header
    pub selector: Option<String>,
    pub session_key: Option<String>,
}

/// How the tenant was found; used for logging and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Anonymous,
    HeaderSelector,
    SessionSelector,
    Owner,
    Employee,
    Unresolved,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Anonymous => "anonymous",
            Outcome::HeaderSelector => "header_selector",
            Outcome::SessionSelector => "session_selector",
            Outcome::Owner => "owner",
            Outcome::Employee => "employee",
            Outcome::Unresolved => "unresolved",
        }
    }
}

pub struct ContextResolver<T: TenantRepository, E: EmploymentRepository, S: SessionRepository> {
    tenants: Arc<T>,
    employments: Arc<E>,
    sessions: Arc<S>,
    config: TenancyConfig,
}

impl<T: TenantRepository, E: EmploymentRepository, S: SessionRepository> ContextResolver<T, E, S> {
    pub fn new(tenants: Arc<T>, employments: Arc<E>, sessions: Arc<S>, config: TenancyConfig) -> Self {
        Self {
            tenants,
            employments,
            sessions,
            config,
        }
    }

    /// Resolve the tenant for a request. Never fails: lookup errors are logged
    /// and resolution continues with the next source.
    pub async fn resolve(&self, request: &ResolutionRequest) -> TenantContext {
        let (context, outcome) = self.resolve_inner(request).await;
        counter!("tenantry_context_resolutions_total", "outcome" => outcome.as_str()).increment(1);
        debug!(
            outcome = outcome.as_str(),
            tenant_id = ?context.tenant_id(),
            impersonating = context.impersonating,
            "Resolved tenant context"
        );
        context
    }

    async fn resolve_inner(&self, request: &ResolutionRequest) -> (TenantContext, Outcome) {
        let Some(principal) = &request.principal else {
            return (TenantContext::none(), Outcome::Anonymous);
        };

        if principal.is_admin() && self.config.admin_bypass {
            if let Some(tenant) = self.from_header(request.selector.as_deref()).await {
                return (impersonating(tenant), Outcome::HeaderSelector);
            }
            if let Some(key) = request.session_key.as_deref() {
                if let Some(tenant) = self.from_session(key).await {
                    return (impersonating(tenant), Outcome::SessionSelector);
                }
            }
        }

        match self.tenants.find_owned_by(principal.id).await {
            Ok(Some(tenant)) if tenant.is_usable() => {
                return (acting_as(tenant), Outcome::Owner);
            }
            Ok(_) => {}
            Err(e) => warn!(principal_id = %principal.id, error = %e, "Owned tenant lookup failed"),
        }

        match self.employer_of(principal.id).await {
            Ok(Some(tenant)) => (acting_as(tenant), Outcome::Employee),
            Ok(None) => (TenantContext::none(), Outcome::Unresolved),
            Err(e) => {
                warn!(principal_id = %principal.id, error = %e, "Employment lookup failed");
                (TenantContext::none(), Outcome::Unresolved)
            }
        }
    }

    /// Admin lookup: deleted tenants are included so they can be inspected.
    async fn find_any(&self, id: StringUuid) -> Result<Option<Tenant>> {
        self.tenants
            .find(Scope::unscoped().including_deleted(), id)
            .await
    }

    async fn from_header(&self, selector: Option<&str>) -> Option<Tenant> {
        let raw = selector?.trim();
        if raw.is_empty() {
            return None;
        }
        let Ok(id) = StringUuid::parse_str(raw) else {
            debug!(selector = raw, "Ignoring malformed tenant selector header");
            return None;
        };
        match self.find_any(id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(tenant_id = %id, error = %e, "Tenant selector lookup failed");
                None
            }
        }
    }

    async fn from_session(&self, session_key: &str) -> Option<Tenant> {
        let stored = match self.sessions.get_selected_tenant(session_key).await {
            Ok(stored) => stored?,
            Err(e) => {
                warn!(error = %e, "Session selector lookup failed");
                return None;
            }
        };

        let found = match StringUuid::parse_str(&stored) {
            Ok(id) => match self.find_any(id).await {
                Ok(found) => found,
                Err(e) => {
                    // Not stale, just unreachable right now: keep the selector
                    warn!(tenant_id = %id, error = %e, "Session selector lookup failed");
                    return None;
                }
            },
            Err(_) => None,
        };

        if found.is_none() {
            debug!(selector = %stored, "Clearing stale session tenant selector");
            if let Err(e) = self.sessions.clear_selected_tenant(session_key).await {
                warn!(error = %e, "Failed to clear stale session selector");
            }
        }
        found
    }

    async fn employer_of(&self, principal_id: StringUuid) -> Result<Option<Tenant>> {
        let Some(employment) = self.employments.find_active_for_principal(principal_id).await?
        else {
            return Ok(None);
        };
        if !employment.is_usable() {
            return Ok(None);
        }
        let tenant = self
            .tenants
            .find(Scope::tenant(employment.tenant_id), employment.tenant_id)
            .await?;
        Ok(tenant.filter(Tenant::is_usable))
    }
}

fn impersonating(tenant: Tenant) -> TenantContext {
    TenantContext {
        tenant: Some(tenant),
        impersonating: true,
    }
}

fn acting_as(tenant: Tenant) -> TenantContext {
    TenantContext {
        tenant: Some(tenant),
        impersonating: false,
    }
}

/// Task-local tenant context for the request currently being handled.
///
/// The slot only exists inside [`scope`]/[`sync_scope`]; it is gone once the
/// scoped future finishes, fails, panics or is dropped.
pub mod ambient {
    use super::TenantContext;
    use crate::domain::StringUuid;
    use std::future::Future;

    tokio::task_local! {
        static CURRENT: TenantContext;
    }

    /// Run `fut` with `ctx` as the ambient tenant context.
    pub async fn scope<F: Future>(ctx: TenantContext, fut: F) -> F::Output {
        CURRENT.scope(ctx, fut).await
    }

    pub fn sync_scope<R>(ctx: TenantContext, f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(ctx, f)
    }

    pub fn current() -> Option<TenantContext> {
        CURRENT.try_with(|ctx| ctx.clone()).ok()
    }

    pub fn current_tenant_id() -> Option<StringUuid> {
        CURRENT.try_with(|ctx| ctx.tenant_id()).ok().flatten()
    }

    pub fn is_impersonating() -> bool {
        CURRENT.try_with(|ctx| ctx.impersonating).unwrap_or(false)
    }
}
