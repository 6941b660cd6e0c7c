//! Application state traits for dependency injection
//!
//! Handlers are generic over [`HasServices`] so the same router serves both the
//! production `AppState` and the in-memory state used by integration tests.

use crate::config::Config;
use crate::jwt::JwtManager;
use crate::repository::{
    EmploymentRepository, PrincipalRepository, RolePermissionRepository, SessionRepository,
    SmsRepository, SubscriptionRepository, TenantRepository,
};
use crate::service::{
    ContextResolver, EmploymentService, PermissionEngine, RolePermissionService,
    SmsLedgerService, SubscriptionService, TenantService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;

/// Trait for application state that provides access to all services.
pub trait HasServices: Clone + Send + Sync + 'static {
    type TenantRepo: TenantRepository + 'static;
    type EmploymentRepo: EmploymentRepository + 'static;
    type PrincipalRepo: PrincipalRepository + 'static;
    type RolePermissionRepo: RolePermissionRepository + 'static;
    type SubscriptionRepo: SubscriptionRepository + 'static;
    type SmsRepo: SmsRepository + 'static;
    /// Stores the tenant selector staff pick for their session
    type SessionRepo: SessionRepository + 'static;

    fn config(&self) -> &Config;

    fn jwt_manager(&self) -> &JwtManager;

    /// Used to load the principal behind a bearer token
    fn principal_repo(&self) -> &Self::PrincipalRepo;

    fn session_repo(&self) -> &Self::SessionRepo;

    fn context_resolver(
        &self,
    ) -> &ContextResolver<Self::TenantRepo, Self::EmploymentRepo, Self::SessionRepo>;

    fn permission_engine(
        &self,
    ) -> &PermissionEngine<Self::EmploymentRepo, Self::RolePermissionRepo, Self::SubscriptionRepo>;

    fn role_permission_service(&self) -> &RolePermissionService<Self::RolePermissionRepo>;

    fn tenant_service(&self) -> &TenantService<Self::TenantRepo, Self::SubscriptionRepo>;

    fn employment_service(&self) -> &EmploymentService<Self::EmploymentRepo, Self::PrincipalRepo>;

    fn subscription_service(&self) -> &SubscriptionService<Self::SubscriptionRepo>;

    fn sms_ledger_service(&self) -> &SmsLedgerService<Self::SmsRepo>;

    /// `None` when metrics are disabled
    fn prometheus_handle(&self) -> Option<&PrometheusHandle>;

    /// Readiness probe: whether the backing store answers.
    fn check_ready(&self) -> impl Future<Output = bool> + Send;
}
