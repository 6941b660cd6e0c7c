//! Authorization decisions: ownership, role flags, subscription gating and impersonation

use super::http::TestAppState;
use super::{create_staff_principal, create_superuser, create_test_principal};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tenantry_core::domain::{
    Capability, EffectivePermissions, RoleLevel, SubscriptionStatus, Tenant,
};
use tenantry_core::repository::SubscriptionRepository;
use tenantry_core::service::context::ambient;
use tenantry_core::service::permission::DecisionRule;
use tenantry_core::service::TenantContext;

async fn lapse_subscription(state: &TestAppState, tenant: &Tenant) {
    let mut current = state
        .repos
        .subscriptions
        .find_current(tenant.id)
        .await
        .unwrap()
        .unwrap();
    current.expires_at = Utc::now() - Duration::days(1);
    state.repos.subscriptions.set_current(current).await;
}

#[tokio::test]
async fn test_owner_holds_every_capability() {
    let state = TestAppState::new();
    let (owner, provisioned) = state.signup("Owner").await;
    let tenant = provisioned.tenant;

    for capability in Capability::ALL {
        assert!(
            state
                .permission_engine
                .authorize(&owner, capability, Some(&tenant))
                .await,
            "{}",
            capability
        );
    }
    let effective = state
        .permission_engine
        .effective_permissions(&owner, Some(&tenant))
        .await
        .unwrap();
    assert_eq!(effective, EffectivePermissions::All);
}

#[tokio::test]
async fn test_owner_bypasses_feature_gates_even_when_expired() {
    let state = TestAppState::new();
    let (owner, provisioned) = state.signup("Lapsed Owner").await;
    lapse_subscription(&state, &provisioned.tenant).await;

    let decision = state
        .permission_engine
        .decide(&owner, Capability::SendSms, Some(&provisioned.tenant))
        .await
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.rule, DecisionRule::Owner);
}

#[tokio::test]
async fn test_superuser_allowed_without_tenant() {
    let state = TestAppState::new();
    let superuser = state.add_principal(create_superuser()).await;

    assert!(
        state
            .permission_engine
            .authorize(&superuser, Capability::ManagePermissions, None)
            .await
    );
    let effective = state
        .permission_engine
        .effective_permissions(&superuser, None)
        .await
        .unwrap();
    assert_eq!(effective, EffectivePermissions::All);
}

#[tokio::test]
async fn test_no_tenant_denies_regular_principal() {
    let state = TestAppState::new();
    let principal = state.add_principal(create_test_principal()).await;

    let decision = state
        .permission_engine
        .decide(&principal, Capability::ViewAppointments, None)
        .await
        .unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.rule, DecisionRule::NoTenant);

    let effective = state
        .permission_engine
        .effective_permissions(&principal, None)
        .await
        .unwrap();
    assert_eq!(effective.to_map().granted().count(), 0);
}

#[tokio::test]
async fn test_basic_employee_follows_role_defaults() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Defaults").await;
    let tenant = provisioned.tenant;
    let (worker, _) = state.employ(&tenant, RoleLevel::Basic).await;
    let engine = &state.permission_engine;

    assert!(engine.authorize(&worker, Capability::ViewAppointments, Some(&tenant)).await);
    assert!(engine.authorize(&worker, Capability::ViewClients, Some(&tenant)).await);
    assert!(!engine.authorize(&worker, Capability::ManageStaff, Some(&tenant)).await);
    assert!(!engine.authorize(&worker, Capability::SendSms, Some(&tenant)).await);
    assert!(!engine.authorize(&worker, Capability::ManagePermissions, Some(&tenant)).await);
}

#[tokio::test]
async fn test_gated_capability_denied_once_subscription_lapses() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Gated").await;
    let tenant = provisioned.tenant;
    let (worker, _) = state.employ(&tenant, RoleLevel::Medium).await;
    let engine = &state.permission_engine;

    assert!(engine.authorize(&worker, Capability::SendSms, Some(&tenant)).await);
    assert!(engine.authorize(&worker, Capability::ViewReports, Some(&tenant)).await);

    lapse_subscription(&state, &tenant).await;

    let decision = engine
        .decide(&worker, Capability::SendSms, Some(&tenant))
        .await
        .unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.rule, DecisionRule::FeatureGate);

    // Always-available and standard capabilities ignore the subscription
    assert!(engine.authorize(&worker, Capability::ViewAppointments, Some(&tenant)).await);
    assert!(engine.authorize(&worker, Capability::ManageServices, Some(&tenant)).await);
}

#[tokio::test]
async fn test_cancelled_subscription_grants_no_features() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Cancelled").await;
    let tenant = provisioned.tenant;
    let (worker, _) = state.employ(&tenant, RoleLevel::High).await;

    let now = Utc::now();
    state.subscription_service.activate(tenant.id, now).await.unwrap();
    state.subscription_service.cancel(tenant.id, now).await.unwrap();

    let engine = &state.permission_engine;
    assert!(!engine.authorize(&worker, Capability::ManageMarketing, Some(&tenant)).await);
    assert!(engine.authorize(&worker, Capability::ViewFinancials, Some(&tenant)).await);
}

#[tokio::test]
async fn test_plan_without_feature_denies_gated_capability() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Downgraded").await;
    let tenant = provisioned.tenant;
    let (worker, _) = state.employ(&tenant, RoleLevel::High).await;

    state
        .subscription_service
        .change_plan(tenant.id, state.basic_plan.id, Utc::now())
        .await
        .unwrap();

    let effective = state
        .permission_engine
        .effective_permissions(&worker, Some(&tenant))
        .await
        .unwrap();
    for capability in Capability::ALL {
        if capability.gating_feature().is_some() {
            assert!(!effective.allows(capability), "{}", capability);
        }
    }
    assert!(effective.allows(Capability::ManageStaff));
    assert!(effective.allows(Capability::ManageAppointments));
}

#[tokio::test]
async fn test_effective_permissions_matches_authorize() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Consistent").await;
    let tenant = provisioned.tenant;
    let (worker, _) = state.employ(&tenant, RoleLevel::Medium).await;
    lapse_subscription(&state, &tenant).await;

    let effective = state
        .permission_engine
        .effective_permissions(&worker, Some(&tenant))
        .await
        .unwrap();
    for capability in Capability::ALL {
        let single = state
            .permission_engine
            .authorize(&worker, capability, Some(&tenant))
            .await;
        assert_eq!(effective.allows(capability), single, "{}", capability);
    }
}

#[tokio::test]
async fn test_role_flag_update_takes_effect() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Flexible").await;
    let tenant = provisioned.tenant;
    let (worker, _) = state.employ(&tenant, RoleLevel::Basic).await;

    let flags = HashMap::from([
        (Capability::ManageStaff, true),
        (Capability::ViewAppointments, false),
    ]);
    let updated = state
        .role_permission_service
        .update(tenant.id, RoleLevel::Basic, &flags)
        .await
        .unwrap();
    assert!(updated.manage_staff);
    assert!(!updated.view_appointments);
    assert!(updated.view_clients);

    let engine = &state.permission_engine;
    assert!(engine.authorize(&worker, Capability::ManageStaff, Some(&tenant)).await);
    assert!(!engine.authorize(&worker, Capability::ViewAppointments, Some(&tenant)).await);

    let reset = state
        .role_permission_service
        .reset(tenant.id, RoleLevel::Basic)
        .await
        .unwrap();
    assert!(!reset.manage_staff);
    assert!(reset.view_appointments);
}

#[tokio::test]
async fn test_dismissed_employee_loses_access() {
    let state = TestAppState::new();
    let (owner, provisioned) = state.signup("Dismissal").await;
    let tenant = provisioned.tenant;
    let (worker, employment) = state.employ(&tenant, RoleLevel::High).await;

    state
        .employment_service
        .dismiss(tenant.id, employment.id, owner.id, Utc::now())
        .await
        .unwrap();

    let decision = state
        .permission_engine
        .decide(&worker, Capability::ViewAppointments, Some(&tenant))
        .await
        .unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.rule, DecisionRule::NoEmployment);
}

#[tokio::test]
async fn test_employee_of_other_tenant_denied() {
    let state = TestAppState::new();
    let (_, mine) = state.signup("Mine").await;
    let (_, theirs) = state.signup("Theirs").await;
    let (worker, _) = state.employ(&theirs.tenant, RoleLevel::High).await;

    assert!(
        !state
            .permission_engine
            .authorize(&worker, Capability::ViewAppointments, Some(&mine.tenant))
            .await
    );
}

#[tokio::test]
async fn test_staff_impersonation_grants_all_for_selected_tenant_only() {
    let state = TestAppState::new();
    let (_, selected) = state.signup("Selected").await;
    let (_, other) = state.signup("Other").await;
    let staff = state.add_principal(create_staff_principal()).await;
    let engine = state.permission_engine.clone();

    // Without an impersonating context staff are ordinary principals
    assert!(
        !engine
            .authorize(&staff, Capability::ViewAppointments, Some(&selected.tenant))
            .await
    );

    let context = TenantContext {
        tenant: Some(selected.tenant.clone()),
        impersonating: true,
    };
    let (on_selected, on_other, effective) = ambient::scope(context, async {
        let on_selected = engine
            .decide(&staff, Capability::ManagePermissions, Some(&selected.tenant))
            .await
            .unwrap();
        let on_other = engine
            .authorize(&staff, Capability::ViewAppointments, Some(&other.tenant))
            .await;
        let effective = engine
            .effective_permissions(&staff, Some(&selected.tenant))
            .await
            .unwrap();
        (on_selected, on_other, effective)
    })
    .await;

    assert!(on_selected.allowed);
    assert_eq!(on_selected.rule, DecisionRule::Impersonation);
    assert!(!on_other);
    assert_eq!(effective, EffectivePermissions::All);
}

#[tokio::test]
async fn test_subscription_statuses_gate_features() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Statuses").await;
    let tenant = provisioned.tenant;
    let (worker, _) = state.employ(&tenant, RoleLevel::Medium).await;

    let now = Utc::now();
    let activated = state.subscription_service.activate(tenant.id, now).await.unwrap();
    assert_eq!(activated.status, SubscriptionStatus::Active);
    assert!(
        state
            .permission_engine
            .authorize(&worker, Capability::ManageInventory, Some(&tenant))
            .await
    );

    state.subscription_service.expire(tenant.id, now).await.unwrap();
    assert!(
        !state
            .permission_engine
            .authorize(&worker, Capability::ManageInventory, Some(&tenant))
            .await
    );
}
