use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Days, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use tower::ServiceExt;
use uuid::Uuid;

use super::{create_router, AppState};
use crate::auth::{issue_token, TenantContext};
use crate::store::MemoryBillStore;

const SECRET: &str = "test-secret";

fn app() -> Router {
    create_router(AppState::new(MemoryBillStore::new(), SECRET))
}

fn token_for(ctx: &TenantContext) -> String {
    issue_token(ctx, SECRET, 3600).unwrap()
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

fn due_in(days: u64) -> String {
    Utc::now()
        .date_naive()
        .checked_add_days(Days::new(days))
        .unwrap()
        .to_string()
}

/// Creates a branch, supplier and expense category over HTTP and returns
/// a bill body referencing them.
async fn bill_body(app: &Router, token: &str, original: &str, due_date: &str) -> Value {
    let (status, branch) = send(
        app,
        "POST",
        "/api/branches",
        Some(token),
        Some(json!({ "name": "Matriz", "cnpj": "12.345.678/0001-95" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", branch);

    let (_, supplier) = send(
        app,
        "POST",
        "/api/suppliers",
        Some(token),
        Some(json!({ "name": "Water Co", "person_kind": "company" })),
    )
    .await;
    let (_, category) = send(
        app,
        "POST",
        "/api/categories",
        Some(token),
        Some(json!({ "name": "Utilities", "kind": "expense" })),
    )
    .await;

    json!({
        "branch_id": branch["id"],
        "supplier_id": supplier["id"],
        "category_id": category["id"],
        "description": "Water",
        "original_amount": original,
        "due_date": due_date,
    })
}

#[tokio::test]
async fn test_health_is_public() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = send(&app, "GET", "/health/db", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let app = app();
    let (status, _) = send(&app, "GET", "/api/bills", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/bills", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_pay_and_cancel_bill() {
    let app = app();
    let token = token_for(&TenantContext::new(Uuid::new_v4(), Uuid::new_v4()));
    let body = bill_body(&app, &token, "100.00", &due_in(5)).await;

    let (status, bill) = send(&app, "POST", "/api/bills", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", bill);
    assert_eq!(bill["description"], "WATER");
    assert_eq!(bill["status"], "pending");
    assert_eq!(decimal(&bill["final_amount"]), Decimal::new(10000, 2));
    assert_eq!(bill["is_overdue"], false);

    let id = bill["id"].as_str().unwrap().to_string();
    let (status, paid) = send(
        &app,
        "POST",
        &format!("/api/bills/{}/pay", id),
        Some(&token),
        Some(json!({ "amount_paid": 40 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "pending");
    assert_eq!(decimal(&paid["remaining_balance"]), Decimal::new(6000, 2));
    assert_eq!(decimal(&paid["percent_paid"]), Decimal::new(4000, 2));

    let (status, paid) = send(
        &app,
        "POST",
        &format!("/api/bills/{}/pay", id),
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "paid");
    assert_eq!(paid["payment_date"], Utc::now().date_naive().to_string());

    let (status, cancelled) = send(
        &app,
        "POST",
        &format!("/api/bills/{}/cancel", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
}

#[tokio::test]
async fn test_recurring_creation_returns_group() {
    let app = app();
    let token = token_for(&TenantContext::new(Uuid::new_v4(), Uuid::new_v4()));
    let mut body = bill_body(&app, &token, "80.00", "2025-01-31").await;
    body["is_recurring"] = json!(true);
    body["recurrence_frequency"] = json!("monthly");
    body["recurrence_count"] = json!(3);

    let (status, group) = send(&app, "POST", "/api/bills", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", group);

    let bills = group.as_array().unwrap();
    assert_eq!(bills.len(), 3);
    let due: Vec<&str> = bills.iter().map(|b| b["due_date"].as_str().unwrap()).collect();
    assert_eq!(due, vec!["2025-01-31", "2025-02-28", "2025-03-31"]);
    assert!(bills.iter().all(|b| b["group_id"] == bills[0]["group_id"]));
    assert_eq!(bills[1]["description"], "WATER (2/3)");
}

#[tokio::test]
async fn test_validation_errors_name_the_field() {
    let app = app();
    let token = token_for(&TenantContext::new(Uuid::new_v4(), Uuid::new_v4()));
    let mut body = bill_body(&app, &token, "100.00", &due_in(1)).await;
    body["boleto_number"] = json!("12-34");

    let (status, error) = send(&app, "POST", "/api/bills", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["field"], "boleto_number");
}

#[tokio::test]
async fn test_other_tenant_sees_not_found() {
    let app = app();
    let owner = token_for(&TenantContext::new(Uuid::new_v4(), Uuid::new_v4()));
    let intruder = token_for(&TenantContext::new(Uuid::new_v4(), Uuid::new_v4()));

    let body = bill_body(&app, &owner, "100.00", &due_in(2)).await;
    let (_, bill) = send(&app, "POST", "/api/bills", Some(&owner), Some(body)).await;
    let uri = format!("/api/bills/{}", bill["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &uri, Some(&intruder), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, listed) = send(&app, "GET", "/api/bills?status=pending", Some(&intruder), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed.as_array().unwrap().is_empty());

    let (_, listed) = send(&app, "GET", "/api/bills?status=pending", Some(&owner), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_statistics_endpoint() {
    let app = app();
    let token = token_for(&TenantContext::new(Uuid::new_v4(), Uuid::new_v4()));

    let late = bill_body(&app, &token, "100.00", "2020-01-01").await;
    let (status, bill) = send(&app, "POST", "/api/bills", Some(&token), Some(late.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(bill["status"], "overdue");

    let mut soon = late;
    soon["original_amount"] = json!("50.00");
    soon["due_date"] = json!(due_in(3));
    send(&app, "POST", "/api/bills", Some(&token), Some(soon)).await;

    let (status, stats) = send(&app, "GET", "/api/bills/statistics", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["overdue_count"], 1);
    assert_eq!(decimal(&stats["overdue_amount"]), Decimal::new(10000, 2));
    assert_eq!(stats["upcoming_count"], 1);
}

#[tokio::test]
async fn test_registry_lists_are_per_company() {
    let app = app();
    let owner = token_for(&TenantContext::new(Uuid::new_v4(), Uuid::new_v4()));
    let other = token_for(&TenantContext::new(Uuid::new_v4(), Uuid::new_v4()));
    let body = bill_body(&app, &owner, "10.00", &due_in(1)).await;

    let (status, branches) = send(&app, "GET", "/api/branches", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let branches = branches.as_array().unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0]["id"], body["branch_id"]);

    let (_, suppliers) = send(&app, "GET", "/api/suppliers", Some(&owner), None).await;
    assert_eq!(suppliers[0]["id"], body["supplier_id"]);
    let (_, categories) = send(&app, "GET", "/api/categories", Some(&owner), None).await;
    assert_eq!(categories[0]["id"], body["category_id"]);

    for uri in ["/api/branches", "/api/suppliers", "/api/categories", "/api/payment-methods"] {
        let (status, listed) = send(&app, "GET", uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(listed.as_array().unwrap().is_empty(), "{} leaked", uri);
    }

    let (status, _) = send(&app, "GET", "/api/branches", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_patch_null_clears_payment_date() {
    let app = app();
    let token = token_for(&TenantContext::new(Uuid::new_v4(), Uuid::new_v4()));
    let mut body = bill_body(&app, &token, "100.00", &due_in(5)).await;
    body["payment_date"] = json!("2025-01-05");

    let (status, bill) = send(&app, "POST", "/api/bills", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", bill);
    assert_eq!(bill["payment_date"], "2025-01-05");
    let uri = format!("/api/bills/{}", bill["id"].as_str().unwrap());

    let (status, kept) = send(&app, "PATCH", &uri, Some(&token), Some(json!({ "notes": "x" }))).await;
    assert_eq!(status, StatusCode::OK, "{}", kept);
    assert_eq!(kept["payment_date"], "2025-01-05");

    let (status, cleared) = send(
        &app,
        "PATCH",
        &uri,
        Some(&token),
        Some(json!({ "payment_date": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", cleared);
    assert_eq!(cleared["payment_date"], Value::Null);
}
