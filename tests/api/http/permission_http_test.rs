//! Effective permissions, capability checks and role flag management over HTTP

use super::{build_test_router, get_json, get_json_with_headers, put_json, TestAppState};
use crate::api::create_staff_principal;
use axum::http::StatusCode;
use serde_json::{json, Value};
use tenantry_core::domain::RoleLevel;

#[tokio::test]
async fn test_owner_permissions_are_all() {
    let state = TestAppState::new();
    let (owner, provisioned) = state.signup("Owned").await;
    let token = state.token_for(&owner);
    let app = build_test_router(state);

    let (status, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/permissions", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["tenant_id"], provisioned.tenant.id.to_string());
    assert_eq!(data["permissions"]["kind"], "all");
}

#[tokio::test]
async fn test_basic_employee_permissions_are_granted_map() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Staffed").await;
    let (worker, _) = state.employ(&provisioned.tenant, RoleLevel::Basic).await;
    let token = state.token_for(&worker);
    let app = build_test_router(state);

    let (status, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/permissions", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let permissions = &body.unwrap()["data"]["permissions"];
    assert_eq!(permissions["kind"], "granted");
    let capabilities = &permissions["capabilities"];
    assert_eq!(capabilities["view_appointments"], true);
    assert_eq!(capabilities["view_own_schedule"], true);
    assert_eq!(capabilities["manage_staff"], false);
    assert_eq!(capabilities["manage_permissions"], false);
}

#[tokio::test]
async fn test_capability_check() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Checked").await;
    let (worker, _) = state.employ(&provisioned.tenant, RoleLevel::Medium).await;
    let token = state.token_for(&worker);
    let app = build_test_router(state);

    let (status, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/permissions/send_sms", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["capability"], "send_sms");
    assert_eq!(data["allowed"], true);

    let (_, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/permissions/can_manage_staff", Some(&token)).await;
    assert_eq!(body.unwrap()["data"]["allowed"], false);
}

#[tokio::test]
async fn test_unknown_capability_is_bad_request() {
    let state = TestAppState::new();
    let (owner, _) = state.signup("Typos").await;
    let token = state.token_for(&owner);
    let app = build_test_router(state);

    let (status, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/permissions/fly_to_moon", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.unwrap()["error"], "bad_request");
}

#[tokio::test]
async fn test_staff_header_grants_all_in_selected_tenant() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Supported").await;
    let staff = state.add_principal(create_staff_principal()).await;
    let token = state.token_for(&staff);
    let app = build_test_router(state);

    // No selection: an ordinary principal without a tenant
    let (_, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/permissions/view_appointments", Some(&token)).await;
    assert_eq!(body.unwrap()["data"]["allowed"], false);

    let tenant_id = provisioned.tenant.id.to_string();
    let (status, body): (StatusCode, Option<Value>) = get_json_with_headers(
        &app,
        "/api/v1/permissions",
        Some(&token),
        &[("x-tenant-id", tenant_id.as_str())],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["data"]["permissions"]["kind"], "all");

    let (status, _): (StatusCode, Option<Value>) = get_json_with_headers(
        &app,
        "/api/v1/employees",
        Some(&token),
        &[("x-tenant-id", tenant_id.as_str())],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_owner_lists_and_updates_role_permissions() {
    let state = TestAppState::new();
    let (owner, provisioned) = state.signup("Configurable").await;
    let (worker, _) = state.employ(&provisioned.tenant, RoleLevel::Low).await;
    let owner_token = state.token_for(&owner);
    let worker_token = state.token_for(&worker);
    let app = build_test_router(state);

    let (status, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/role-permissions", Some(&owner_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["data"].as_array().unwrap().len(), 4);

    let (status, _): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/employees", Some(&worker_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body): (StatusCode, Option<Value>) = put_json(
        &app,
        "/api/v1/role-permissions/low",
        Some(&owner_token),
        &json!({"flags": {"manage_staff": true}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["role_level"], "LOW");
    assert_eq!(data["manage_staff"], true);
    assert_eq!(data["manage_clients"], true);

    let (status, _): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/employees", Some(&worker_token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_high_employee_cannot_manage_permissions() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Guarded").await;
    let (worker, _) = state.employ(&provisioned.tenant, RoleLevel::High).await;
    let token = state.token_for(&worker);
    let app = build_test_router(state);

    let (status, _): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/role-permissions", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _): (StatusCode, Option<Value>) = put_json(
        &app,
        "/api/v1/role-permissions/high",
        Some(&token),
        &json!({"flags": {"manage_permissions": true}}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_role_level_is_bad_request() {
    let state = TestAppState::new();
    let (owner, _) = state.signup("Levels").await;
    let token = state.token_for(&owner);
    let app = build_test_router(state);

    let (status, _): (StatusCode, Option<Value>) = put_json(
        &app,
        "/api/v1/role-permissions/supreme",
        Some(&token),
        &json!({"flags": {"manage_staff": true}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
