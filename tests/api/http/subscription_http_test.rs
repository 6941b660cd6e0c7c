//! Plan catalog and subscription management over HTTP

use super::{build_test_router, get_json, post_json, TestAppState};
use axum::http::StatusCode;
use serde_json::{json, Value};
use tenantry_core::domain::RoleLevel;

#[tokio::test]
async fn test_list_plans_is_public() {
    let app = build_test_router(TestAppState::new());

    let (status, body): (StatusCode, Option<Value>) = get_json(&app, "/api/v1/plans", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<String> = body.unwrap()["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Standard", "Basic"]);
}

#[tokio::test]
async fn test_get_subscription_reports_trial_and_features() {
    let state = TestAppState::new();
    let (owner, _) = state.signup("Trialing").await;
    let token = state.token_for(&owner);
    let app = build_test_router(state.clone());

    let (status, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/subscription", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["subscription"]["status"], "trial");
    assert_eq!(data["effective_status"], "trial");
    assert_eq!(data["subscription"]["plan_id"], state.standard_plan.id.to_string());
    assert_eq!(data["features"]["sms_notifications"], true);
}

#[tokio::test]
async fn test_owner_changes_plan_then_cancels() {
    let state = TestAppState::new();
    let (owner, _) = state.signup("Switching").await;
    let token = state.token_for(&owner);
    let app = build_test_router(state.clone());

    let (status, body): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/v1/subscription/plan",
        Some(&token),
        &json!({"plan_id": state.basic_plan.id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["plan_id"], state.basic_plan.id.to_string());
    assert_eq!(data["status"], "active");
    assert_eq!(data["price_snapshot"], state.basic_plan.price);

    let (status, body): (StatusCode, Option<Value>) =
        post_json(&app, "/api/v1/subscription/cancel", Some(&token), &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["data"]["status"], "cancelled");

    // Cancelling twice is not a legal transition
    let (status, _): (StatusCode, Option<Value>) =
        post_json(&app, "/api/v1/subscription/cancel", Some(&token), &json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/subscription", Some(&token)).await;
    assert!(body.unwrap()["data"]["features"].is_null());
}

#[tokio::test]
async fn test_cancel_trial_conflicts() {
    let state = TestAppState::new();
    let (owner, _) = state.signup("Early").await;
    let token = state.token_for(&owner);
    let app = build_test_router(state);

    let (status, _): (StatusCode, Option<Value>) =
        post_json(&app, "/api/v1/subscription/cancel", Some(&token), &json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_change_to_unknown_plan_is_not_found() {
    let state = TestAppState::new();
    let (owner, _) = state.signup("Lost").await;
    let token = state.token_for(&owner);
    let app = build_test_router(state);

    let (status, _): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/v1/subscription/plan",
        Some(&token),
        &json!({"plan_id": tenantry_core::domain::StringUuid::new_v4()}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_employee_cannot_change_plan() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Managed").await;
    let (worker, _) = state.employ(&provisioned.tenant, RoleLevel::High).await;
    let token = state.token_for(&worker);
    let app = build_test_router(state.clone());

    // High defaults include manage_settings; take it away first
    state
        .role_permission_service
        .update(
            provisioned.tenant.id,
            RoleLevel::High,
            &std::collections::HashMap::from([(
                tenantry_core::domain::Capability::ManageSettings,
                false,
            )]),
        )
        .await
        .unwrap();

    let (status, _): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/v1/subscription/plan",
        Some(&token),
        &json!({"plan_id": state.basic_plan.id}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _): (StatusCode, Option<Value>) =
        post_json(&app, "/api/v1/subscription/cancel", Some(&token), &json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_subscription_requires_tenant() {
    let app = build_test_router(TestAppState::new());

    let (status, _): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/subscription", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
