//! Server initialization and routing

use crate::api;
use crate::config::Config;
use crate::jwt::JwtManager;
use crate::middleware::{tenant_context_middleware, ObservabilityLayer};
use crate::repository::{
    employment::EmploymentRepositoryImpl, principal::PrincipalRepositoryImpl,
    role_permission::RolePermissionRepositoryImpl, session::SessionRepositoryImpl,
    sms::SmsRepositoryImpl, subscription::SubscriptionRepositoryImpl,
    tenant::TenantRepositoryImpl,
};
use crate::service::{
    ContextResolver, EmploymentService, PermissionEngine, RolePermissionService,
    SmsLedgerService, SubscriptionService, TenantService,
};
use crate::state::HasServices;
use crate::telemetry;
use anyhow::Result;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::{mysql::MySqlPoolOptions, MySqlPool};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

type Tenants = TenantRepositoryImpl;
type Employments = EmploymentRepositoryImpl;
type Principals = PrincipalRepositoryImpl;
type RolePermissions = RolePermissionRepositoryImpl;
type Subscriptions = SubscriptionRepositoryImpl;
type Sms = SmsRepositoryImpl;
type Sessions = SessionRepositoryImpl;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: MySqlPool,
    pub jwt_manager: JwtManager,
    pub principal_repo: Arc<Principals>,
    pub session_repo: Arc<Sessions>,
    pub context_resolver: Arc<ContextResolver<Tenants, Employments, Sessions>>,
    pub permission_engine: Arc<PermissionEngine<Employments, RolePermissions, Subscriptions>>,
    pub role_permission_service: Arc<RolePermissionService<RolePermissions>>,
    pub tenant_service: Arc<TenantService<Tenants, Subscriptions>>,
    pub employment_service: Arc<EmploymentService<Employments, Principals>>,
    pub subscription_service: Arc<SubscriptionService<Subscriptions>>,
    pub sms_ledger_service: Arc<SmsLedgerService<Sms>>,
    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire repositories and services over one pool.
    pub fn new(config: Config, db_pool: MySqlPool, prometheus_handle: Option<PrometheusHandle>) -> Self {
        let tenant_repo = Arc::new(TenantRepositoryImpl::new(db_pool.clone()));
        let employment_repo = Arc::new(EmploymentRepositoryImpl::new(db_pool.clone()));
        let principal_repo = Arc::new(PrincipalRepositoryImpl::new(db_pool.clone()));
        let role_permission_repo = Arc::new(RolePermissionRepositoryImpl::new(db_pool.clone()));
        let subscription_repo = Arc::new(SubscriptionRepositoryImpl::new(db_pool.clone()));
        let sms_repo = Arc::new(SmsRepositoryImpl::new(db_pool.clone()));
        let session_repo = Arc::new(SessionRepositoryImpl::new(db_pool.clone()));

        let subscription_service = Arc::new(SubscriptionService::new(subscription_repo.clone()));

        Self {
            jwt_manager: JwtManager::new(config.jwt.clone()),
            context_resolver: Arc::new(ContextResolver::new(
                tenant_repo.clone(),
                employment_repo.clone(),
                session_repo.clone(),
                config.tenancy.clone(),
            )),
            permission_engine: Arc::new(PermissionEngine::new(
                employment_repo.clone(),
                role_permission_repo.clone(),
                subscription_service.clone(),
                config.tenancy.clone(),
            )),
            role_permission_service: Arc::new(RolePermissionService::new(role_permission_repo)),
            tenant_service: Arc::new(TenantService::new(
                tenant_repo,
                subscription_repo,
                config.subscription.clone(),
            )),
            employment_service: Arc::new(EmploymentService::new(
                employment_repo,
                principal_repo.clone(),
            )),
            sms_ledger_service: Arc::new(SmsLedgerService::new(sms_repo, config.ledger.clone())),
            subscription_service,
            principal_repo,
            session_repo,
            prometheus_handle,
            db_pool,
            config: Arc::new(config),
        }
    }
}

impl HasServices for AppState {
    type TenantRepo = Tenants;
    type EmploymentRepo = Employments;
    type PrincipalRepo = Principals;
    type RolePermissionRepo = RolePermissions;
    type SubscriptionRepo = Subscriptions;
    type SmsRepo = Sms;
    type SessionRepo = Sessions;

    fn config(&self) -> &Config {
        &self.config
    }

    fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    fn principal_repo(&self) -> &Principals {
        &self.principal_repo
    }

    fn session_repo(&self) -> &Sessions {
        &self.session_repo
    }

    fn context_resolver(&self) -> &ContextResolver<Tenants, Employments, Sessions> {
        &self.context_resolver
    }

    fn permission_engine(&self) -> &PermissionEngine<Employments, RolePermissions, Subscriptions> {
        &self.permission_engine
    }

    fn role_permission_service(&self) -> &RolePermissionService<RolePermissions> {
        &self.role_permission_service
    }

    fn tenant_service(&self) -> &TenantService<Tenants, Subscriptions> {
        &self.tenant_service
    }

    fn employment_service(&self) -> &EmploymentService<Employments, Principals> {
        &self.employment_service
    }

    fn subscription_service(&self) -> &SubscriptionService<Subscriptions> {
        &self.subscription_service
    }

    fn sms_ledger_service(&self) -> &SmsLedgerService<Sms> {
        &self.sms_ledger_service
    }

    fn prometheus_handle(&self) -> Option<&PrometheusHandle> {
        self.prometheus_handle.as_ref()
    }

    async fn check_ready(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.db_pool).await.is_ok()
    }
}

/// Open the MySQL pool described by `config`.
pub async fn connect(config: &Config) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;
    info!("Connected to database");
    Ok(pool)
}

/// Run the HTTP server
pub async fn run(config: Config) -> Result<()> {
    let prometheus_handle = telemetry::init(&config.telemetry)?;
    let db_pool = connect(&config).await?;

    let http_addr = config.http_addr();
    let app = build_router(AppState::new(config, db_pool, prometheus_handle));

    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the HTTP router with generic state type
///
/// Generic over the state so integration tests can drive the production
/// routes with in-memory repositories.
pub fn build_router<S: HasServices>(state: S) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Routes that act on a resolved tenant
    let tenant_scoped = Router::new()
        .route("/api/v1/tenants", post(api::tenant::create::<S>))
        .route(
            "/api/v1/tenants/current",
            get(api::tenant::current).delete(api::tenant::delete_current::<S>),
        )
        .route(
            "/api/v1/tenants/{id}/restore",
            post(api::tenant::restore::<S>),
        )
        .route("/api/v1/context", get(api::context::get))
        .route(
            "/api/v1/context/select",
            post(api::context::select::<S>).delete(api::context::clear::<S>),
        )
        .route("/api/v1/permissions", get(api::permission::list::<S>))
        .route(
            "/api/v1/permissions/{capability}",
            get(api::permission::check::<S>),
        )
        .route(
            "/api/v1/role-permissions",
            get(api::role_permission::list::<S>),
        )
        .route(
            "/api/v1/role-permissions/{role_level}",
            put(api::role_permission::update::<S>),
        )
        .route(
            "/api/v1/employees",
            get(api::employee::list::<S>).post(api::employee::hire::<S>),
        )
        .route(
            "/api/v1/employees/{id}",
            delete(api::employee::dismiss::<S>),
        )
        .route(
            "/api/v1/employees/{id}/restore",
            post(api::employee::restore::<S>),
        )
        .route("/api/v1/plans", get(api::subscription::list_plans::<S>))
        .route("/api/v1/subscription", get(api::subscription::get::<S>))
        .route(
            "/api/v1/subscription/plan",
            post(api::subscription::change_plan::<S>),
        )
        .route(
            "/api/v1/subscription/cancel",
            post(api::subscription::cancel::<S>),
        )
        .route("/api/v1/sms/balance", get(api::sms::balance::<S>))
        .route(
            "/api/v1/sms/transactions",
            get(api::sms::transactions::<S>),
        )
        .route("/api/v1/sms/adjustments", post(api::sms::adjust::<S>))
        .route("/api/v1/sms/verify", post(api::sms::verify::<S>))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tenant_context_middleware::<S>,
        ));

    Router::new()
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready::<S>))
        .route("/metrics", get(api::metrics::metrics_handler::<S>))
        .merge(tenant_scoped)
        .layer(ObservabilityLayer)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
