//! HTTP contract of the poll endpoint, driven in-process.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use bus_booking_reconcile::mocks::{
    MockCartResolver, MockCounterStore, MockIdempotencyGuard, MockInvoicingProvider,
    MockIssuanceSystem, MockNotificationDispatch,
};
use bus_booking_reconcile::stores::InMemoryPurchaseLedger;
use bus_booking_reconcile::{BookingFinalizer, InvoiceStatePoller, SideEffectDispatcher};
use bus_booking_web::{AppState, CORRELATION_ID_HEADER, build_router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    invoicing: MockInvoicingProvider,
    carts: MockCartResolver,
    guard: MockIdempotencyGuard,
    issuance: MockIssuanceSystem,
    notifications: MockNotificationDispatch,
    router: Router,
}

fn test_app() -> TestApp {
    let invoicing = MockInvoicingProvider::new();
    let carts = MockCartResolver::new();
    let guard = MockIdempotencyGuard::new();
    let issuance = MockIssuanceSystem::new();
    let notifications = MockNotificationDispatch::new();

    let finalizer = BookingFinalizer::new(
        InvoiceStatePoller::new(Arc::new(invoicing.clone()), Arc::new(carts.clone())),
        Arc::new(guard.clone()),
        Arc::new(issuance.clone()),
        Arc::new(InMemoryPurchaseLedger::new()),
        SideEffectDispatcher::new(
            Arc::new(invoicing.clone()),
            Arc::new(notifications.clone()),
            Arc::new(MockCounterStore::new()),
        ),
    );

    TestApp {
        invoicing,
        carts,
        guard,
        issuance,
        notifications,
        router: build_router(AppState::new(Arc::new(finalizer))),
    }
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().contains_key(CORRELATION_ID_HEADER));

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    };

    (status, body)
}

#[tokio::test]
async fn paid_reference_returns_confirmed_with_purchase() {
    let app = test_app();
    app.invoicing.set_settlement_code("abc123", "paid");
    app.carts.link("abc123", "cart-789");

    let (status, body) = get(&app.router, "/poll/abc123").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["status"], json!("confirmed"));
    assert_eq!(body["purchaseId"], json!(1000));
    assert!(body["purchaseUuid"].as_str().is_some());
    assert!(body.get("message").is_none());
    assert_eq!(app.notifications.success_calls(), 1);

    let (status, body) = get(&app.router, "/poll/abc123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("alreadyProcessed"));
    assert!(body.get("purchaseId").is_none());
    assert_eq!(app.issuance.create_calls(), 1);
}

#[tokio::test]
async fn intermediate_states_are_ok_responses() {
    let app = test_app();

    let (status, body) = get(&app.router, "/poll/abc123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("notFound"));

    app.invoicing.set_settlement_code("abc123", "in_payment");
    let (status, body) = get(&app.router, "/poll/abc123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("paymentProcessing"));

    app.invoicing.set_settlement_code("abc123", "weird_code");
    let (status, body) = get(&app.router, "/poll/abc123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("unknown"));
}

#[tokio::test]
async fn paid_without_cart_link_is_bad_request() {
    let app = test_app();
    app.invoicing.set_settlement_code("abc123", "paid");

    let (status, body) = get(&app.router, "/poll/abc123").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("LINKAGE_MISSING"));
    assert!(
        !app.guard
            .is_marked(&bus_booking_reconcile::PaymentReference::parse("abc123").unwrap())
    );
}

#[tokio::test]
async fn paid_with_unreachable_cart_store_is_internal_error() {
    let app = test_app();
    app.invoicing.set_settlement_code("abc123", "paid");
    app.carts.link("abc123", "cart-789");
    app.carts.set_failing(true);

    let (status, body) = get(&app.router, "/poll/abc123").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], json!("STORE_FAILURE"));
    assert!(
        !app.guard
            .is_marked(&bus_booking_reconcile::PaymentReference::parse("abc123").unwrap())
    );
}

#[tokio::test]
async fn upstream_failure_is_internal_error_without_detail() {
    let app = test_app();
    app.invoicing.set_settlement_code("abc123", "paid");
    app.carts.link("abc123", "cart-789");
    app.issuance.set_complete_failing(true);

    let (status, body) = get(&app.router, "/poll/abc123").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("UPSTREAM_FAILURE"));
    assert!(!body["message"].as_str().unwrap().contains("mock"));
}

#[tokio::test]
async fn malformed_references_are_rejected() {
    let app = test_app();
    let too_long = format!("/poll/{}", "a".repeat(129));

    for uri in ["/poll/", "/poll", "/poll/abc%20123", too_long.as_str()] {
        let (status, body) = get(&app.router, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["code"], json!("INVALID_REFERENCE"), "{uri}");
    }

    assert_eq!(app.invoicing.search_calls(), 0);
}

#[tokio::test]
async fn health_and_optional_endpoints() {
    let app = test_app();

    let (status, body) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));

    let (status, body) = get(&app.router, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ready": true }));

    let (status, body) = get(&app.router, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("NOT_FOUND"));
}
