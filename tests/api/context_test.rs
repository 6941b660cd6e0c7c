//! Tenant context resolution order

use super::http::TestAppState;
use super::{create_staff_principal, create_superuser, create_test_config, create_test_principal};
use chrono::Utc;
use tenantry_core::domain::{Principal, RoleLevel};
use tenantry_core::repository::{SessionRepository, TenantRepository};
use tenantry_core::service::{ResolutionRequest, TenantContext};

fn request(principal: &Principal) -> ResolutionRequest {
    ResolutionRequest {
        principal: Some(principal.clone()),
        selector: None,
        session_key: None,
    }
}

async fn resolve(state: &TestAppState, request: ResolutionRequest) -> TenantContext {
    state.context_resolver.resolve(&request).await
}

#[tokio::test]
async fn test_anonymous_resolves_nothing() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Public").await;

    let context = resolve(
        &state,
        ResolutionRequest {
            principal: None,
            selector: Some(provisioned.tenant.id.to_string()),
            session_key: None,
        },
    )
    .await;
    assert_eq!(context, TenantContext::none());
}

#[tokio::test]
async fn test_owner_resolves_owned_tenant() {
    let state = TestAppState::new();
    let (owner, provisioned) = state.signup("Owned").await;

    let context = resolve(&state, request(&owner)).await;
    assert_eq!(context.tenant_id(), Some(provisioned.tenant.id));
    assert!(!context.impersonating);
}

#[tokio::test]
async fn test_employee_resolves_employer() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Employer").await;
    let (worker, _) = state.employ(&provisioned.tenant, RoleLevel::Basic).await;

    let context = resolve(&state, request(&worker)).await;
    assert_eq!(context.tenant_id(), Some(provisioned.tenant.id));
    assert!(!context.impersonating);
}

#[tokio::test]
async fn test_unrelated_principal_resolves_nothing() {
    let state = TestAppState::new();
    state.signup("Elsewhere").await;
    let stranger = state.add_principal(create_test_principal()).await;

    let context = resolve(&state, request(&stranger)).await;
    assert!(context.tenant.is_none());
}

#[tokio::test]
async fn test_regular_principal_selector_header_is_ignored() {
    let state = TestAppState::new();
    let (owner, own) = state.signup("Mine").await;
    let (_, other) = state.signup("Theirs").await;

    let context = resolve(
        &state,
        ResolutionRequest {
            selector: Some(other.tenant.id.to_string()),
            ..request(&owner)
        },
    )
    .await;
    assert_eq!(context.tenant_id(), Some(own.tenant.id));
    assert!(!context.impersonating);
}

#[tokio::test]
async fn test_staff_header_selects_any_tenant_including_deleted() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Inspected").await;
    state
        .repos
        .tenants
        .soft_delete(provisioned.tenant.id, None, Utc::now())
        .await
        .unwrap();
    let staff = state.add_principal(create_staff_principal()).await;

    let context = resolve(
        &state,
        ResolutionRequest {
            selector: Some(format!(" {} ", provisioned.tenant.id)),
            ..request(&staff)
        },
    )
    .await;
    assert_eq!(context.tenant_id(), Some(provisioned.tenant.id));
    assert!(context.impersonating);
}

#[tokio::test]
async fn test_staff_malformed_or_unknown_header_falls_back() {
    let state = TestAppState::new();
    let staff = state.add_principal(create_staff_principal()).await;

    for selector in ["not-a-uuid", "", "8d3c7a57-0000-4000-8000-000000000000"] {
        let context = resolve(
            &state,
            ResolutionRequest {
                selector: Some(selector.to_string()),
                ..request(&staff)
            },
        )
        .await;
        assert_eq!(context, TenantContext::none(), "selector {:?}", selector);
    }
}

#[tokio::test]
async fn test_staff_session_selector_is_used() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Session").await;
    let superuser = state.add_principal(create_superuser()).await;
    state
        .repos
        .sessions
        .set_selected_tenant("session-1", provisioned.tenant.id)
        .await
        .unwrap();

    let context = resolve(
        &state,
        ResolutionRequest {
            session_key: Some("session-1".to_string()),
            ..request(&superuser)
        },
    )
    .await;
    assert_eq!(context.tenant_id(), Some(provisioned.tenant.id));
    assert!(context.impersonating);
}

#[tokio::test]
async fn test_header_takes_precedence_over_session() {
    let state = TestAppState::new();
    let (_, from_session) = state.signup("Session").await;
    let (_, from_header) = state.signup("Header").await;
    let staff = state.add_principal(create_staff_principal()).await;
    state
        .repos
        .sessions
        .set_selected_tenant("session-2", from_session.tenant.id)
        .await
        .unwrap();

    let context = resolve(
        &state,
        ResolutionRequest {
            principal: Some(staff),
            selector: Some(from_header.tenant.id.to_string()),
            session_key: Some("session-2".to_string()),
        },
    )
    .await;
    assert_eq!(context.tenant_id(), Some(from_header.tenant.id));
}

#[tokio::test]
async fn test_stale_session_selector_is_cleared() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Temporary").await;
    let staff = state.add_principal(create_staff_principal()).await;
    state
        .repos
        .sessions
        .set_selected_tenant("stale", provisioned.tenant.id)
        .await
        .unwrap();
    state.repos.tenants.hard_delete(provisioned.tenant.id).await.unwrap();
    state.repos.sessions.put_raw("garbage", "%%%").await;

    for key in ["stale", "garbage"] {
        let context = resolve(
            &state,
            ResolutionRequest {
                session_key: Some(key.to_string()),
                ..request(&staff)
            },
        )
        .await;
        assert!(context.tenant.is_none());
        assert!(state.repos.sessions.stored(key).await.is_none());
    }
}

#[tokio::test]
async fn test_staff_without_selector_resolves_through_employment() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Day Job").await;
    let staff = state.add_principal(create_staff_principal()).await;
    state
        .repos
        .employments
        .add_employment(super::create_test_employment(
            provisioned.tenant.id,
            staff.id,
            RoleLevel::High,
        ))
        .await;

    let context = resolve(&state, request(&staff)).await;
    assert_eq!(context.tenant_id(), Some(provisioned.tenant.id));
    assert!(!context.impersonating);
}

#[tokio::test]
async fn test_admin_bypass_disabled_ignores_selectors() {
    let mut config = create_test_config();
    config.tenancy.admin_bypass = false;
    let state = TestAppState::with_config(config);
    let (_, provisioned) = state.signup("Locked").await;
    let staff = state.add_principal(create_staff_principal()).await;

    let context = resolve(
        &state,
        ResolutionRequest {
            selector: Some(provisioned.tenant.id.to_string()),
            ..request(&staff)
        },
    )
    .await;
    assert!(context.tenant.is_none());
}

#[tokio::test]
async fn test_deleted_owned_tenant_is_not_resolved() {
    let state = TestAppState::new();
    let (owner, provisioned) = state.signup("Closed").await;
    state
        .repos
        .tenants
        .soft_delete(provisioned.tenant.id, Some(owner.id), Utc::now())
        .await
        .unwrap();

    let context = resolve(&state, request(&owner)).await;
    assert!(context.tenant.is_none());
}

#[tokio::test]
async fn test_employment_in_deleted_tenant_is_not_resolved() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Shut").await;
    let (worker, _) = state.employ(&provisioned.tenant, RoleLevel::High).await;
    state
        .repos
        .tenants
        .soft_delete(provisioned.tenant.id, None, Utc::now())
        .await
        .unwrap();

    let context = resolve(&state, request(&worker)).await;
    assert!(context.tenant.is_none());
}
