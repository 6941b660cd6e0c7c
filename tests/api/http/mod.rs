//! HTTP handler tests against the production router
//!
//! [`TestAppState`] implements `HasServices` over the in-memory repositories,
//! so requests exercise the real middleware, extractors and handlers.

pub mod permission_http_test;
pub mod sms_http_test;
pub mod subscription_http_test;

use crate::api::{
    basic_plan, create_test_config, create_test_principal, standard_plan, TestEmploymentRepository,
    TestPrincipalRepository, TestRepositories, TestRolePermissionRepository, TestSessionRepository,
    TestSmsRepository, TestSubscriptionRepository, TestTenantRepository,
};
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tenantry_core::config::Config;
use tenantry_core::domain::{
    BusinessType, CreateTenantInput, Employment, Principal, ProvisionedTenant, RoleLevel,
    SubscriptionPlan, Tenant,
};
use tenantry_core::jwt::JwtManager;
use tenantry_core::server::build_router;
use tenantry_core::service::{
    ContextResolver, EmploymentService, PermissionEngine, RolePermissionService,
    SmsLedgerService, SubscriptionService, TenantService,
};
use tenantry_core::state::HasServices;
use tower::ServiceExt;

type Resolver = ContextResolver<TestTenantRepository, TestEmploymentRepository, TestSessionRepository>;
type Engine =
    PermissionEngine<TestEmploymentRepository, TestRolePermissionRepository, TestSubscriptionRepository>;

/// Test application state mirroring the production wiring
#[derive(Clone)]
pub struct TestAppState {
    pub config: Arc<Config>,
    pub jwt_manager: JwtManager,
    pub repos: TestRepositories,
    pub standard_plan: SubscriptionPlan,
    pub basic_plan: SubscriptionPlan,
    pub context_resolver: Arc<Resolver>,
    pub permission_engine: Arc<Engine>,
    pub role_permission_service: Arc<RolePermissionService<TestRolePermissionRepository>>,
    pub tenant_service: Arc<TenantService<TestTenantRepository, TestSubscriptionRepository>>,
    pub employment_service: Arc<EmploymentService<TestEmploymentRepository, TestPrincipalRepository>>,
    pub subscription_service: Arc<SubscriptionService<TestSubscriptionRepository>>,
    pub sms_ledger_service: Arc<SmsLedgerService<TestSmsRepository>>,
}

impl TestAppState {
    /// Catalog holds the standard (default) and basic plans
    pub fn new() -> Self {
        Self::with_config(create_test_config())
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, vec![standard_plan(), basic_plan()])
    }

    /// Empty plan catalog
    pub fn without_catalog() -> Self {
        Self::build(create_test_config(), vec![])
    }

    fn build(config: Config, plans: Vec<SubscriptionPlan>) -> Self {
        let standard_plan = plans.first().cloned().unwrap_or_else(standard_plan);
        let basic_plan = plans.get(1).cloned().unwrap_or_else(basic_plan);
        let repos = TestRepositories::with_plans(plans);
        let subscription_service = Arc::new(SubscriptionService::new(repos.subscriptions.clone()));

        Self {
            jwt_manager: JwtManager::new(config.jwt.clone()),
            context_resolver: Arc::new(ContextResolver::new(
                repos.tenants.clone(),
                repos.employments.clone(),
                repos.sessions.clone(),
                config.tenancy.clone(),
            )),
            permission_engine: Arc::new(PermissionEngine::new(
                repos.employments.clone(),
                repos.role_permissions.clone(),
                subscription_service.clone(),
                config.tenancy.clone(),
            )),
            role_permission_service: Arc::new(RolePermissionService::new(
                repos.role_permissions.clone(),
            )),
            tenant_service: Arc::new(TenantService::new(
                repos.tenants.clone(),
                repos.subscriptions.clone(),
                config.subscription.clone(),
            )),
            employment_service: Arc::new(EmploymentService::new(
                repos.employments.clone(),
                repos.principals.clone(),
            )),
            sms_ledger_service: Arc::new(SmsLedgerService::new(
                repos.sms.clone(),
                config.ledger.clone(),
            )),
            subscription_service,
            standard_plan,
            basic_plan,
            repos,
            config: Arc::new(config),
        }
    }

    /// Register a principal so its bearer token authenticates
    pub async fn add_principal(&self, principal: Principal) -> Principal {
        self.repos.principals.add_principal(principal.clone()).await;
        principal
    }

    pub fn token_for(&self, principal: &Principal) -> String {
        self.jwt_manager
            .create_identity_token(principal.id, &principal.email)
            .unwrap()
    }

    /// A fresh owner and the tenant they signed up
    pub async fn signup(&self, name: &str) -> (Principal, ProvisionedTenant) {
        let owner = self.add_principal(create_test_principal()).await;
        let provisioned = self
            .tenant_service
            .create(
                &owner,
                CreateTenantInput {
                    name: name.to_string(),
                    business_type: BusinessType::Salon,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        (owner, provisioned)
    }

    /// A fresh principal employed by `tenant` at `role_level`
    pub async fn employ(&self, tenant: &Tenant, role_level: RoleLevel) -> (Principal, Employment) {
        let principal = self.add_principal(create_test_principal()).await;
        let employment = Employment {
            tenant_id: tenant.id,
            principal_id: principal.id,
            role_level,
            ..Default::default()
        };
        self.repos
            .employments
            .add_employment(employment.clone())
            .await;
        (principal, employment)
    }
}

impl Default for TestAppState {
    fn default() -> Self {
        Self::new()
    }
}

impl HasServices for TestAppState {
    type TenantRepo = TestTenantRepository;
    type EmploymentRepo = TestEmploymentRepository;
    type PrincipalRepo = TestPrincipalRepository;
    type RolePermissionRepo = TestRolePermissionRepository;
    type SubscriptionRepo = TestSubscriptionRepository;
    type SmsRepo = TestSmsRepository;
    type SessionRepo = TestSessionRepository;

    fn config(&self) -> &Config {
        &self.config
    }

    fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    fn principal_repo(&self) -> &TestPrincipalRepository {
        &self.repos.principals
    }

    fn session_repo(&self) -> &TestSessionRepository {
        &self.repos.sessions
    }

    fn context_resolver(&self) -> &Resolver {
        &self.context_resolver
    }

    fn permission_engine(&self) -> &Engine {
        &self.permission_engine
    }

    fn role_permission_service(&self) -> &RolePermissionService<TestRolePermissionRepository> {
        &self.role_permission_service
    }

    fn tenant_service(&self) -> &TenantService<TestTenantRepository, TestSubscriptionRepository> {
        &self.tenant_service
    }

    fn employment_service(
        &self,
    ) -> &EmploymentService<TestEmploymentRepository, TestPrincipalRepository> {
        &self.employment_service
    }

    fn subscription_service(&self) -> &SubscriptionService<TestSubscriptionRepository> {
        &self.subscription_service
    }

    fn sms_ledger_service(&self) -> &SmsLedgerService<TestSmsRepository> {
        &self.sms_ledger_service
    }

    fn prometheus_handle(&self) -> Option<&PrometheusHandle> {
        None
    }

    async fn check_ready(&self) -> bool {
        true
    }
}

/// Build test router using the production router
pub fn build_test_router(state: TestAppState) -> Router {
    build_router(state)
}

// ============================================================================
// HTTP Test Helpers
// ============================================================================

/// Send `request` and return the status, headers and parsed JSON body
pub async fn send<R: DeserializeOwned>(
    app: &Router,
    request: Request<Body>,
) -> (StatusCode, HeaderMap, Option<R>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_default();

    if body_bytes.is_empty() {
        return (status, headers, None);
    }

    match serde_json::from_slice(&body_bytes) {
        Ok(data) => (status, headers, Some(data)),
        Err(_) => (status, headers, None),
    }
}

/// Request builder with the caller's bearer token and extra headers applied
pub fn request(
    method: Method,
    path: &str,
    token: Option<&str>,
    headers: &[(&str, &str)],
) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
}

/// Make a GET request and parse JSON response
pub async fn get_json<T: DeserializeOwned>(
    app: &Router,
    path: &str,
    token: Option<&str>,
) -> (StatusCode, Option<T>) {
    get_json_with_headers(app, path, token, &[]).await
}

pub async fn get_json_with_headers<T: DeserializeOwned>(
    app: &Router,
    path: &str,
    token: Option<&str>,
    headers: &[(&str, &str)],
) -> (StatusCode, Option<T>) {
    let request = request(Method::GET, path, token, headers)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app, request).await;
    (status, body)
}

/// Make a POST request with JSON body and parse JSON response
pub async fn post_json<T: Serialize, R: DeserializeOwned>(
    app: &Router,
    path: &str,
    token: Option<&str>,
    body: &T,
) -> (StatusCode, Option<R>) {
    let request = request(Method::POST, path, token, &[])
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap();
    let (status, _, body) = send(app, request).await;
    (status, body)
}

/// Make a PUT request with JSON body and parse JSON response
pub async fn put_json<T: Serialize, R: DeserializeOwned>(
    app: &Router,
    path: &str,
    token: Option<&str>,
    body: &T,
) -> (StatusCode, Option<R>) {
    let request = request(Method::PUT, path, token, &[])
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap();
    let (status, _, body) = send(app, request).await;
    (status, body)
}

/// Make a DELETE request and parse JSON response
pub async fn delete_json<R: DeserializeOwned>(
    app: &Router,
    path: &str,
    token: Option<&str>,
) -> (StatusCode, Option<R>) {
    let request = request(Method::DELETE, path, token, &[])
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app, request).await;
    (status, body)
}
