//! API Integration Tests
//!
//! Drive the full router (middleware included) over the in-memory store.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use coop_ledger::api;

mod common;

struct Caller {
    user_id: Uuid,
    member_id: Option<Uuid>,
    admin: bool,
}

impl Caller {
    fn member(member_id: Uuid) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            member_id: Some(member_id),
            admin: false,
        }
    }

    fn admin() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            member_id: None,
            admin: true,
        }
    }
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    caller: Option<&Caller>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder.header("X-Actor-User-Id", caller.user_id.to_string());
        if let Some(member_id) = caller.member_id {
            builder = builder.header("X-Actor-Member-Id", member_id.to_string());
        }
        if caller.admin {
            builder = builder.header("X-Actor-Roles", "admin");
        }
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn setup() -> (Router, std::sync::Arc<coop_ledger::store::MemoryStore>) {
    let (store, services) = common::memory_services();
    (api::build_router(services), store)
}

#[tokio::test]
async fn test_health_needs_no_actor() {
    let (app, _) = setup();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_missing_actor_is_unauthenticated() {
    let (app, _) = setup();
    let (status, body) = send(&app, Method::GET, "/api/v1/entries", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "unauthenticated");
}

#[tokio::test]
async fn test_savings_deposit_flow() {
    let (app, store) = setup();
    let member_id = Uuid::new_v4();
    store.add_member(member_id).await;
    let member = Caller::member(member_id);
    let admin = Caller::admin();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/entries",
        Some(&member),
        Some(json!({"amount": 5000, "direction": "DEPOSIT", "ledger_type": "SAVINGS"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["entry"]["ledger_type"], "SAVINGS");
    let status_id = body["status"]["id"].as_str().unwrap().to_string();

    // members cannot decide
    let decision_uri = format!("/api/v1/statuses/{status_id}/decision");
    let (status, body) = send(
        &app,
        Method::POST,
        &decision_uri,
        Some(&member),
        Some(json!({"confirmed": true})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_code"], "forbidden");

    let (status, body) = send(
        &app,
        Method::POST,
        &decision_uri,
        Some(&admin),
        Some(json!({"confirmed": true, "ledger_type": "SAVINGS"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    assert_eq!(body["message"], "transaction confirmed successfully");

    let (status, body) = send(
        &app,
        Method::POST,
        &decision_uri,
        Some(&admin),
        Some(json!({"confirmed": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);
    assert_eq!(body["message"], "transaction already confirmed");

    let (status, body) = send(
        &app,
        Method::POST,
        &decision_uri,
        Some(&admin),
        Some(json!({"confirmed": false})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "conflict");
    assert_eq!(body["error"], "cannot reject a confirmed transaction");

    let (status, body) = send(&app, Method::GET, "/api/v1/balances/SAVINGS", Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 5000);
    assert_eq!(body["member_id"], member_id.to_string());
}

#[tokio::test]
async fn test_validation_and_scoping_errors() {
    let (app, store) = setup();
    let member_id = Uuid::new_v4();
    store.add_member(member_id).await;
    let member = Caller::member(member_id);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/entries",
        Some(&member),
        Some(json!({"amount": 10, "direction": "DEPOSIT", "ledger_type": "SAVINGS"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "validation_error");

    let other = Uuid::new_v4();
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/v1/entries?member_id={other}"),
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/entries?sort=amount:desc",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "validation_error");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/entries?state=PENDING&limit=5",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([]));
    assert!(body["next_cursor"].is_null());
}

#[tokio::test]
async fn test_generic_entries_limited_to_savings_ledgers() {
    let (app, store) = setup();
    let member_id = Uuid::new_v4();
    store.add_member(member_id).await;
    let member = Caller::member(member_id);

    for (amount, direction, ledger_type) in [
        (75000, "DEPOSIT", "SHARES"),
        (2500, "DEPOSIT", "FINES"),
        (100000, "DEPOSIT", "REGISTRATION_FEE"),
        (100000, "WITHDRAWAL", "REGISTRATION_FEE"),
    ] {
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/entries",
            Some(&member),
            Some(json!({"amount": amount, "direction": direction, "ledger_type": ledger_type})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{direction} {ledger_type}");
        assert_eq!(body["error_code"], "validation_error");
    }

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/entries",
        Some(&member),
        Some(json!({"amount": 5000, "direction": "DEPOSIT", "ledger_type": "SPECIAL_DEPOSIT"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(store.entry_count().await, 1);
}

#[tokio::test]
async fn test_share_purchase_flow() {
    let (app, store) = setup();
    let member_id = Uuid::new_v4();
    store.add_member(member_id).await;
    let member = Caller::member(member_id);
    let admin = Caller::admin();

    let (status, body) = send(&app, Method::GET, "/api/v1/shares/unit-price", Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unit_price"], 50000);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/v1/shares/unit-price",
        Some(&member),
        Some(json!({"unit_price": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/shares/quote?amount=75000",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["units"], "1.5000");
    assert_eq!(body["remainder"], 0);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/shares",
        Some(&member),
        Some(json!({"amount": 75000, "units": "1.5"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["entry"]["description"], "Purchase of 1.5000 shares");
    let status_id = body["status"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/statuses/{status_id}/decision"),
        Some(&admin),
        Some(json!({"confirmed": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/api/v1/shares/total", Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["units"], "1.5000");
    assert_eq!(body["amount"], 75000);

    let (status, _) = send(&app, Method::GET, "/api/v1/shares/total/all", Some(&member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::GET, "/api/v1/shares/total/all", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["units"], "1.5000");
}

#[tokio::test]
async fn test_fine_flow() {
    let (app, store) = setup();
    let member_id = Uuid::new_v4();
    store.add_member(member_id).await;
    let member = Caller::member(member_id);
    let admin = Caller::admin();

    let deadline = Utc::now() + Duration::days(14);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/fines",
        Some(&admin),
        Some(json!({
            "member_id": member_id,
            "amount": 2500,
            "reason": "Late repayment",
            "deadline": deadline,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let fine_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, "/api/v1/fines", Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["paid"], false);

    let payment_uri = format!("/api/v1/fines/{fine_id}/payment");
    let (status, _) = send(
        &app,
        Method::POST,
        &payment_uri,
        Some(&member),
        Some(json!({"amount": 2000})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        &payment_uri,
        Some(&member),
        Some(json!({"amount": 2500})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let status_id = body["status"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/statuses/{status_id}/decision"),
        Some(&admin),
        Some(json!({"confirmed": true, "ledger_type": "FINES"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/fines/{fine_id}"),
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paid"], true);
    assert_eq!(body["payment"]["state"], "CONFIRMED");

    let stranger = Caller::member(Uuid::new_v4());
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/fines/{fine_id}"),
        Some(&stranger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "not_found");
}

#[tokio::test]
async fn test_registration_fee_route() {
    let (app, store) = setup();
    let member_id = Uuid::new_v4();
    store.add_member(member_id).await;
    let member = Caller::member(member_id);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/registration-fee",
        Some(&member),
        Some(json!({"amount": 5000})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/registration-fee",
        Some(&member),
        Some(json!({"amount": 100000})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["entry"]["description"], "Registration fee");
    assert_eq!(body["entry"]["ledger_type"], "REGISTRATION_FEE");
}
