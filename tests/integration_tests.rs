use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use servicebook::config::AppConfig;
use servicebook::db;
use servicebook::handlers;
use servicebook::models::{DomainEvent, UnconfiguredAvailability};
use servicebook::services::commission::CommissionDefaults;
use servicebook::services::gateway::{
    sign_payload, PaymentGateway, PaymentInit, PaymentSession, PaymentVerification,
};
use servicebook::services::notify::Notifier;
use servicebook::state::AppState;

// ── Mock Collaborators ──

struct MockGateway {
    /// Amount the gateway reports as paid; `None` means the charge failed.
    paid: Option<Decimal>,
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initialize_payment(&self, init: &PaymentInit) -> anyhow::Result<PaymentSession> {
        Ok(PaymentSession {
            reference: init.reference.clone(),
            authorization_url: format!("https://pay.test/{}", init.reference),
        })
    }

    async fn verify_payment(&self, reference: &str) -> anyhow::Result<PaymentVerification> {
        Ok(PaymentVerification {
            reference: reference.to_string(),
            success: self.paid.is_some(),
            amount: self.paid.unwrap_or_default(),
            fees: Some(Decimal::new(675, 2)),
            transaction_id: Some("gw-42".to_string()),
        })
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl RecordingNotifier {
    fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &DomainEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ── Helpers ──

const ADMIN: &str = "test-token";
const SECRET: &str = "sk_test_secret";

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: ADMIN.to_string(),
        gateway_base_url: "http://gateway.invalid".to_string(),
        gateway_secret_key: SECRET.to_string(),
        notify_webhook_url: String::new(),
        slot_minutes: 60,
        commission_due_days: 7,
        overdue_sweep_secs: 3600,
        commission: CommissionDefaults::default(),
        unconfigured_availability: UnconfiguredAvailability::Closed,
    }
}

fn test_app_with(paid: Option<Decimal>) -> (Router, RecordingNotifier) {
    let conn = db::init_db(":memory:").unwrap();
    let notifier = RecordingNotifier::default();
    let state = Arc::new(AppState::new(
        conn,
        test_config(),
        Box::new(MockGateway { paid }),
        Box::new(notifier.clone()),
    ));
    (handlers::router(state), notifier)
}

fn test_app() -> (Router, RecordingNotifier) {
    test_app_with(Some(Decimal::new(45000, 2)))
}

/// A Monday at least a week out, so bookings are never same-day.
fn next_monday() -> NaiveDate {
    let today = Utc::now().date_naive();
    let ahead = 7 - today.weekday().num_days_from_monday() as i64;
    today + Duration::days(ahead + 7)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header("Authorization", format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn dec(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

async fn create_provider(app: &Router, tier: &str) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/admin/providers",
        Some(json!({"name": "Fixit", "email": "team@fixit.test", "tier": tier})),
        Some(ADMIN),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_string()
}

async fn create_booking(app: &Router, provider_id: &str, time: &str, email: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/bookings",
        Some(json!({
            "provider_id": provider_id,
            "date": next_monday().to_string(),
            "time": time,
            "customer_email": email,
            "customer_name": "Dana",
            "service_name": "Deep cleaning",
        })),
        None,
    )
    .await
}

async fn complete(app: &Router, booking_id: &str) {
    for action in ["confirm", "start", "complete"] {
        let (status, _) = send(
            app,
            "POST",
            &format!("/api/bookings/{booking_id}/actions/{action}"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{action} failed");
    }
}

// ── Health & Auth ──

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app();
    let (status, json) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_admin_requires_auth() {
    let (app, _) = test_app();

    let (status, json) = send(&app, "GET", "/api/admin/providers", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["kind"], "unauthorized");

    let (status, _) = send(&app, "GET", "/api/admin/providers", None, Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ── Slots ──

#[tokio::test]
async fn test_slots_and_full_day_block() {
    let (app, _) = test_app();
    let provider = create_provider(&app, "VERIFIED").await;
    let monday = next_monday().to_string();

    let (status, json) = send(
        &app,
        "GET",
        &format!("/api/providers/{provider}/slots?date={monday}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["slots"].as_array().unwrap().len(), 8);
    assert_eq!(json["slots"][0], "09:00");

    for (start, end) in [("09:00", "13:00"), ("12:00", "17:00")] {
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/providers/{provider}/blocked-slots"),
            Some(json!({"date": monday, "start_time": start, "end_time": end})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, json) = send(
        &app,
        "GET",
        &format!("/api/providers/{provider}/bookable?date={monday}"),
        None,
        None,
    )
    .await;
    assert_eq!(json["bookable"], false);

    let (status, json) = create_booking(&app, &provider, "14:00", "a@x.test").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["kind"], "not_bookable");
}

// ── Booking Lifecycle ──

#[tokio::test]
async fn test_double_booking_rejected() {
    let (app, _) = test_app();
    let provider = create_provider(&app, "VERIFIED").await;

    let (status, _) = create_booking(&app, &provider, "10:00", "a@x.test").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = create_booking(&app, &provider, "10:00", "b@x.test").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "slot_conflict");
}

#[tokio::test]
async fn test_past_date_rejected() {
    let (app, _) = test_app();
    let provider = create_provider(&app, "VERIFIED").await;
    let yesterday = Utc::now().date_naive() - Duration::days(1);

    let (status, json) = send(
        &app,
        "POST",
        "/api/bookings",
        Some(json!({
            "provider_id": provider,
            "date": yesterday.to_string(),
            "time": "10:00",
            "customer_email": "a@x.test",
            "customer_name": "A",
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["kind"], "past_date");
}

#[tokio::test]
async fn test_illegal_transition_rejected() {
    let (app, notifier) = test_app();
    let provider = create_provider(&app, "VERIFIED").await;
    let (_, booking) = create_booking(&app, &provider, "10:00", "a@x.test").await;
    let id = booking["id"].as_str().unwrap();

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/actions/complete"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "invalid_transition");

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/actions/explode"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation");

    assert!(notifier.kinds().is_empty());
}

#[tokio::test]
async fn test_reschedule_and_history() {
    let (app, notifier) = test_app();
    let provider = create_provider(&app, "VERIFIED").await;
    let (_, booking) = create_booking(&app, &provider, "10:00", "a@x.test").await;
    let id = booking["id"].as_str().unwrap();
    let monday = next_monday().to_string();

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/reschedule"),
        Some(json!({"date": monday, "time": "10:00"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["time"], "10:00");

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/reschedule"),
        Some(json!({"date": monday, "time": "15:00", "reason": "running late"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["time"], "15:00");

    let (_, history) = send(&app, "GET", &format!("/api/bookings/{id}/history"), None, None).await;
    let actions: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["request", "reschedule", "reschedule"]);
    assert_eq!(notifier.kinds(), vec!["booking_rescheduled", "booking_rescheduled"]);
}

#[tokio::test]
async fn test_customer_delete_only_while_pending() {
    let (app, _) = test_app();
    let provider = create_provider(&app, "VERIFIED").await;
    let (_, booking) = create_booking(&app, &provider, "10:00", "a@x.test").await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/bookings/{id}?email=a@x.test"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = send(&app, "GET", &format!("/api/bookings/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "booking_not_found");
}

// ── Settlement ──

#[tokio::test]
async fn test_cash_settlement_and_collection() {
    let (app, notifier) = test_app();
    let provider = create_provider(&app, "VERIFIED").await;
    let (_, booking) = create_booking(&app, &provider, "10:00", "a@x.test").await;
    let id = booking["id"].as_str().unwrap();

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/invoice"),
        Some(json!({"service_price": "350.00", "payment_method": "CASH"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "booking_not_completed");

    complete(&app, id).await;

    let (status, first) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/invoice"),
        Some(json!({"service_price": "350.00", "payment_method": "CASH"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(dec(&first["invoice"]["platform_commission"]), Decimal::new(6300, 2));
    assert_eq!(dec(&first["invoice"]["provider_payout"]), Decimal::new(35000, 2));
    assert_eq!(dec(&first["invoice"]["commission_owed"]), Decimal::new(6300, 2));
    assert_eq!(first["transaction"]["commission_status"], "PENDING");

    let (status, second) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/invoice"),
        Some(json!({"service_price": "350.00", "payment_method": "CASH"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["invoice"]["id"], first["invoice"]["id"]);

    let (_, outstanding) = send(
        &app,
        "GET",
        &format!("/api/providers/{provider}/commission/outstanding"),
        None,
        None,
    )
    .await;
    assert_eq!(dec(&outstanding["total_owed"]), Decimal::new(6300, 2));
    assert_eq!(outstanding["transaction_count"], 1);

    let tx_id = first["transaction"]["id"].as_str().unwrap();
    let (status, collected) = send(
        &app,
        "POST",
        &format!("/api/admin/transactions/{tx_id}/collect"),
        Some(json!({"collection_method": "bank_transfer"})),
        Some(ADMIN),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(collected["commission_status"], "COLLECTED");

    let (_, outstanding) = send(
        &app,
        "GET",
        &format!("/api/providers/{provider}/commission/outstanding"),
        None,
        None,
    )
    .await;
    assert_eq!(outstanding["transaction_count"], 0);

    let (_, summary) = send(&app, "GET", "/api/admin/commission/summary", None, Some(ADMIN)).await;
    assert_eq!(dec(&summary["commission_collected"]), Decimal::new(6300, 2));

    let kinds = notifier.kinds();
    assert_eq!(
        kinds,
        vec![
            "booking_state_changed",
            "booking_state_changed",
            "booking_state_changed",
            "invoice_generated",
            "commission_collected",
        ]
    );
}

#[tokio::test]
async fn test_electronic_settlement_verifies_payment() {
    let (app, _) = test_app();
    let provider = create_provider(&app, "ENTERPRISE").await;
    let (_, booking) = create_booking(&app, &provider, "11:00", "a@x.test").await;
    let id = booking["id"].as_str().unwrap();
    complete(&app, id).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/invoice"),
        Some(json!({
            "service_price": "450.00",
            "payment_method": "ELECTRONIC",
            "payment_reference": "SB-ref-1",
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(dec(&json["invoice"]["platform_commission"]), Decimal::new(5400, 2));
    assert_eq!(dec(&json["invoice"]["provider_payout"]), Decimal::new(39600, 2));
    assert_eq!(dec(&json["invoice"]["commission_owed"]), Decimal::ZERO);
    assert_eq!(json["transaction"]["commission_status"], "COLLECTED");
    assert_eq!(json["transaction"]["gateway_transaction_id"], "gw-42");

    let (_, booking) = send(&app, "GET", &format!("/api/bookings/{id}"), None, None).await;
    assert_eq!(booking["invoice_generated"], true);
    assert_eq!(booking["payment_method"], "ELECTRONIC");
}

#[tokio::test]
async fn test_unverified_payment_rejected() {
    let (app, _) = test_app_with(None);
    let provider = create_provider(&app, "ENTERPRISE").await;
    let (_, booking) = create_booking(&app, &provider, "11:00", "a@x.test").await;
    let id = booking["id"].as_str().unwrap();
    complete(&app, id).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/invoice"),
        Some(json!({
            "service_price": "450.00",
            "payment_method": "ELECTRONIC",
            "payment_reference": "SB-ref-1",
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json["kind"], "payment_not_verified");

    let (status, _) = send(&app, "GET", &format!("/api/bookings/{id}/invoice"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Commission Configuration ──

#[tokio::test]
async fn test_commission_config_update_and_audit() {
    let (app, _) = test_app();

    let (status, json) = send(
        &app,
        "PUT",
        "/api/admin/commission/config",
        Some(json!({
            "rates": [{"tier": "PREMIUM", "rate": "0.60"}],
            "changed_by": "ops",
            "reason": "typo",
        })),
        Some(ADMIN),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_commission_rate");

    let (status, json) = send(
        &app,
        "PUT",
        "/api/admin/commission/config",
        Some(json!({
            "rates": [{"tier": "PREMIUM", "rate": "0.14"}],
            "changed_by": "ops",
            "reason": "loyalty discount",
        })),
        Some(ADMIN),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["config"]["version"], 2);
    assert_eq!(dec(&json["config"]["rates"]["PREMIUM"]), Decimal::new(14, 2));

    let (_, changes) = send(&app, "GET", "/api/admin/commission/changes", None, Some(ADMIN)).await;
    let changes = changes.as_array().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(dec(&changes[0]["old_rate"]), Decimal::new(15, 2));
    assert_eq!(dec(&changes[0]["new_rate"]), Decimal::new(14, 2));
    assert_eq!(changes[0]["changed_by"], "ops");
}

// ── Gateway Webhook ──

#[tokio::test]
async fn test_payment_webhook_signature() {
    let (app, _) = test_app();
    let payload = json!({"reference": "unknown", "status": "success", "amount": "10.00"}).to_string();

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/payment")
                .header("x-gateway-signature", "bogus")
                .body(Body::from(payload.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let signature = sign_payload(SECRET, payload.as_bytes()).unwrap();
    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/payment")
                .header("x-gateway-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["matched"], false);
}

#[tokio::test]
async fn test_payment_initialize_then_webhook() {
    let (app, _) = test_app();
    let provider = create_provider(&app, "VERIFIED").await;
    let (_, booking) = create_booking(&app, &provider, "12:00", "a@x.test").await;
    let id = booking["id"].as_str().unwrap();

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/payment"),
        Some(json!({"amount": "120.00"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reference = json["reference"].as_str().unwrap().to_string();
    assert!(json["authorization_url"].as_str().unwrap().ends_with(&reference));

    let payload =
        json!({"reference": reference, "status": "success", "amount": "120.00"}).to_string();
    let signature = sign_payload(SECRET, payload.as_bytes()).unwrap();
    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/payment")
                .header("x-gateway-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (_, booking) = send(&app, "GET", &format!("/api/bookings/{id}"), None, None).await;
    assert_eq!(booking["payment_status"], "PAID");
    assert_eq!(booking["payment_reference"], reference.as_str());
}

async fn signed_webhook(app: &Router, payload: Value) -> Value {
    let payload = payload.to_string();
    let signature = sign_payload(SECRET, payload.as_bytes()).unwrap();
    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/payment")
                .header("x-gateway-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn start_payment(app: &Router, booking_id: &str) -> String {
    let (status, json) = send(
        app,
        "POST",
        &format!("/api/bookings/{booking_id}/payment"),
        Some(json!({"amount": "450.00"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["reference"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_failed_payment_blocks_electronic_invoice() {
    let (app, _) = test_app_with(None);
    let provider = create_provider(&app, "ENTERPRISE").await;
    let (_, booking) = create_booking(&app, &provider, "13:00", "a@x.test").await;
    let id = booking["id"].as_str().unwrap();

    let reference = start_payment(&app, id).await;
    signed_webhook(
        &app,
        json!({"reference": reference, "status": "failed", "amount": "450.00"}),
    )
    .await;
    complete(&app, id).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/invoice"),
        Some(json!({"service_price": "450.00", "payment_method": "ELECTRONIC"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json["kind"], "payment_not_verified");
}

#[tokio::test]
async fn test_abandoned_checkout_does_not_touch_cash_settlement() {
    let (app, _) = test_app();
    let provider = create_provider(&app, "VERIFIED").await;
    let (_, booking) = create_booking(&app, &provider, "14:00", "a@x.test").await;
    let id = booking["id"].as_str().unwrap();

    let reference = start_payment(&app, id).await;
    complete(&app, id).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/invoice"),
        Some(json!({"service_price": "350.00", "payment_method": "CASH"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["transaction"]["gateway_reference"], Value::Null);

    let outcome = signed_webhook(
        &app,
        json!({"reference": reference, "status": "failed", "amount": "450.00"}),
    )
    .await;
    assert_eq!(outcome["matched"], true);
    assert_eq!(outcome["applied"], false);

    let (_, booking) = send(&app, "GET", &format!("/api/bookings/{id}"), None, None).await;
    assert_eq!(booking["payment_status"], "PAID");
    let (_, settled) = send(&app, "GET", &format!("/api/bookings/{id}/invoice"), None, None).await;
    assert_eq!(settled["transaction"]["payment_status"], "PAID");
    assert_eq!(settled["transaction"]["commission_status"], "PENDING");
}
