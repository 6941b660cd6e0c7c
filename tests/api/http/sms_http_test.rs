//! SMS balance, ledger listing, adjustments and audits over HTTP

use super::{build_test_router, get_json, post_json, TestAppState};
use crate::api::create_superuser;
use axum::http::StatusCode;
use serde_json::{json, Value};
use tenantry_core::domain::RoleLevel;

#[tokio::test]
async fn test_owner_reads_balance_and_transactions() {
    let state = TestAppState::new();
    let (owner, provisioned) = state.signup("Messaging").await;
    state
        .sms_ledger_service
        .debit(provisioned.tenant.id, 4, "Reminders")
        .await
        .unwrap();
    let token = state.token_for(&owner);
    let app = build_test_router(state);

    let (status, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/sms/balance", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["balance"], 96);
    assert_eq!(data["integrity_hold"], false);

    let (status, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/sms/transactions?page=1&per_page=1", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["total_pages"], 2);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["type"], "usage");
    assert_eq!(rows[0]["amount"], -4);
}

#[tokio::test]
async fn test_balance_and_transactions_capabilities() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Restricted").await;
    let (sender, _) = state.employ(&provisioned.tenant, RoleLevel::Medium).await;
    let (basic, _) = state.employ(&provisioned.tenant, RoleLevel::Basic).await;
    let sender_token = state.token_for(&sender);
    let basic_token = state.token_for(&basic);
    let app = build_test_router(state);

    // send_sms is enough to see the balance, not the ledger
    let (status, _): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/sms/balance", Some(&sender_token)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/sms/transactions", Some(&sender_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/sms/balance", Some(&basic_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_pagination_is_rejected() {
    let state = TestAppState::new();
    let (owner, _) = state.signup("Paged").await;
    let token = state.token_for(&owner);
    let app = build_test_router(state);

    let (status, _): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/sms/transactions?page=0", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let state = TestAppState::new();
    let (owner, _) = state.signup("Far Paged").await;
    let token = state.token_for(&owner);
    let app = build_test_router(state);

    let (status, body): (StatusCode, Option<Value>) = get_json(
        &app,
        "/api/v1/sms/transactions?page=9223372036854775807&per_page=2",
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["pagination"]["total"], 1);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_adjustments_are_superuser_only() {
    let state = TestAppState::new();
    let (owner, provisioned) = state.signup("Adjusted").await;
    let superuser = state.add_principal(create_superuser()).await;
    let owner_token = state.token_for(&owner);
    let super_token = state.token_for(&superuser);
    let app = build_test_router(state);
    let tenant_id = provisioned.tenant.id;

    let (status, _): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/v1/sms/adjustments",
        Some(&owner_token),
        &json!({"tenant_id": tenant_id, "delta": 1000, "description": "Free credits"}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/v1/sms/adjustments",
        Some(&super_token),
        &json!({"tenant_id": tenant_id, "delta": 50, "description": "Goodwill"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let data = &body.unwrap()["data"];
    assert_eq!(data["type"], "admin_adjustment");
    assert_eq!(data["balance_after"], 150);
    assert_eq!(data["created_by"], superuser.id.to_string());

    let (status, body): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/v1/sms/adjustments",
        Some(&super_token),
        &json!({"tenant_id": tenant_id, "delta": -151, "description": "Too much"}),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    let body = body.unwrap();
    assert_eq!(body["error"], "insufficient_credit");
    assert_eq!(body["details"]["requested"], 151);
    assert_eq!(body["details"]["available"], 150);
}

#[tokio::test]
async fn test_adjustment_needs_description() {
    let state = TestAppState::new();
    let (_, provisioned) = state.signup("Described").await;
    let superuser = state.add_principal(create_superuser()).await;
    let token = state.token_for(&superuser);
    let app = build_test_router(state);

    let (status, _): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/v1/sms/adjustments",
        Some(&token),
        &json!({"tenant_id": provisioned.tenant.id, "delta": 5, "description": ""}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_verify_reports_locked_ledger() {
    let state = TestAppState::new();
    let (owner, provisioned) = state.signup("Audited").await;
    let superuser = state.add_principal(create_superuser()).await;
    let owner_token = state.token_for(&owner);
    let super_token = state.token_for(&superuser);
    let tenant_id = provisioned.tenant.id;
    let app = build_test_router(state.clone());

    let (status, body): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/v1/sms/verify",
        Some(&super_token),
        &json!({"tenant_id": tenant_id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["replayed_balance"], 100);
    assert!(data["first_mismatch"].is_null());

    let (status, _): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/v1/sms/verify",
        Some(&owner_token),
        &json!({"tenant_id": tenant_id}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    state.repos.sms.tamper_amount(tenant_id, 1, 500).await;
    let (status, body): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/v1/sms/verify",
        Some(&super_token),
        &json!({"tenant_id": tenant_id}),
    )
    .await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body.unwrap()["error"], "integrity_violation");

    let (_, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/sms/balance", Some(&owner_token)).await;
    assert_eq!(body.unwrap()["data"]["integrity_hold"], true);

    // Still mismatched: the hold stays
    let (status, _): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/v1/sms/verify",
        Some(&super_token),
        &json!({"tenant_id": tenant_id, "release_hold": true}),
    )
    .await;
    assert_eq!(status, StatusCode::LOCKED);

    state.repos.sms.tamper_amount(tenant_id, 1, 100).await;
    let (status, _): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/v1/sms/verify",
        Some(&super_token),
        &json!({"tenant_id": tenant_id, "release_hold": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/v1/sms/balance", Some(&owner_token)).await;
    assert_eq!(body.unwrap()["data"]["integrity_hold"], false);
}
