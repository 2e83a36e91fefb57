use actix_web::http::StatusCode;
use astro_payment_engine::db_types::{MaskedCustomer, NewCheckout, NormalizedStatus, PaymentProvider};
use chrono::Utc;
use serde_json::json;

use super::helpers::{
    flow_api,
    new_test_db,
    parse_response,
    post_webhook,
    seed_reading_request,
    tear_down,
    PATH_SECRET,
    STRIPE_SECRET,
};
use crate::signature::test_signing::signed_payload_header;

fn payment_intent_body(event_id: &str, request_id: i64) -> String {
    json!({
        "id": event_id,
        "type": "payment_intent.succeeded",
        "created": Utc::now().timestamp(),
        "data": {"object": {
            "id": "pi_3OaQ1xKz",
            "object": "payment_intent",
            "status": "succeeded",
            "amount": 12990,
            "currency": "brl",
            "receipt_email": "ana.souza@example.com",
            "metadata": {"request_id": request_id.to_string()}
        }}
    })
    .to_string()
}

fn signed(body: &str) -> Vec<(&'static str, String)> {
    vec![("Stripe-Signature", signed_payload_header(STRIPE_SECRET, Utc::now().timestamp(), body.as_bytes()))]
}

#[actix_web::test]
async fn signed_payment_intent_approves_the_request() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let request_id = seed_reading_request(&db).await;
    let body = payment_intent_body("evt_8HqT2wXk", request_id);
    let headers = signed(&body);
    let path = format!("/wh/stripe/{PATH_SECRET}");

    let (status, raw) = post_webhook(&db, &path, &body, &headers).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let res = parse_response(&raw);
    assert!(res.success);
    assert_eq!(res.message, "Event processed.");

    let (status, raw) = post_webhook(&db, &path, &body, &headers).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_response(&raw).message, "Event already recorded.");

    let api = flow_api(&db);
    let event = api.fetch_webhook_event("stripe:evt_8HqT2wXk").await.unwrap().expect("Event should be stored");
    assert_eq!(event.topic.as_deref(), Some("payment_intent.succeeded"));

    let snapshot = api.fetch_reading_request(request_id).await.unwrap().unwrap();
    assert_eq!(snapshot.payment_provider, Some(PaymentProvider::Stripe));
    assert_eq!(snapshot.payment_status, Some(NormalizedStatus::Approved));
    assert_eq!(snapshot.payment_id.as_deref(), Some("pi_3OaQ1xKz"));
    assert_eq!(snapshot.payment_amount.map(|a| a.value()), Some(12990));
    assert_eq!(snapshot.payment_currency.as_deref(), Some("BRL"));
    assert!(snapshot.authorized_at.is_some());
    tear_down(&db).await;
}

#[actix_web::test]
async fn checkout_session_event_resolves_the_request_through_the_stored_checkout() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let request_id = seed_reading_request(&db).await;
    let api = flow_api(&db);
    let customer = MaskedCustomer::from_raw(Some("Ana Souza"), Some("ana.souza@example.com"), None, None, None);
    api.process_new_checkout(NewCheckout {
        checkout_id: "cs_live_b1x".to_string(),
        request_id,
        provider: PaymentProvider::Stripe,
        status: "open".to_string(),
        link: Some("https://checkout.stripe.com/c/pay/cs_live_b1x".to_string()),
        customer: serde_json::to_value(&customer).unwrap(),
        raw: json!({"id": "cs_live_b1x"}),
    })
    .await
    .expect("Could not store the checkout");

    // The session event carries no request reference, only the session id.
    let session = json!({
        "id": "evt_sess_1",
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "data": {"object": {
            "id": "cs_live_b1x",
            "object": "checkout.session",
            "payment_intent": "pi_9XkQ",
            "status": "complete",
            "amount_total": 18990,
            "currency": "brl",
            "customer_details": {"name": "Ana Souza", "email": "ana.souza@example.com"}
        }}
    })
    .to_string();
    let (status, raw) = post_webhook(&db, "/wh/stripe", &session, &signed(&session)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_response(&raw).message, "Event processed.");

    let snapshot = api.fetch_reading_request(request_id).await.unwrap().unwrap();
    assert_eq!(snapshot.payment_id.as_deref(), Some("pi_9XkQ"));
    assert_eq!(snapshot.payment_status, Some(NormalizedStatus::Updated));
    assert_eq!(snapshot.payment_amount.map(|a| a.value()), Some(18990));

    // The follow-up intent event has no reference either; the consolidated payment row still
    // carries the session id, so it lands on the same request.
    let intent = json!({
        "id": "evt_pi_2",
        "type": "payment_intent.succeeded",
        "created": Utc::now().timestamp(),
        "data": {"object": {
            "id": "pi_9XkQ",
            "object": "payment_intent",
            "status": "succeeded",
            "amount": 18990,
            "currency": "brl"
        }}
    })
    .to_string();
    let (status, raw) = post_webhook(&db, "/wh/stripe", &intent, &signed(&intent)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_response(&raw).message, "Event processed.");

    let snapshot = api.fetch_reading_request(request_id).await.unwrap().unwrap();
    assert_eq!(snapshot.payment_status, Some(NormalizedStatus::Approved));
    assert_eq!(snapshot.checkout_id.as_deref(), Some("cs_live_b1x"));
    assert!(snapshot.authorized_at.is_some());
    tear_down(&db).await;
}

#[actix_web::test]
async fn failed_payment_marks_the_request_rejected() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let request_id = seed_reading_request(&db).await;
    let body = json!({
        "id": "evt_fail_1",
        "type": "payment_intent.payment_failed",
        "created": Utc::now().timestamp(),
        "data": {"object": {
            "id": "pi_9Fail",
            "object": "payment_intent",
            "status": "requires_payment_method",
            "metadata": {"request_id": request_id.to_string()}
        }}
    })
    .to_string();

    let (status, raw) = post_webhook(&db, "/wh/stripe", &body, &signed(&body)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_response(&raw).message, "Event processed.");

    let snapshot = flow_api(&db).fetch_reading_request(request_id).await.unwrap().unwrap();
    assert_eq!(snapshot.payment_status, Some(NormalizedStatus::Rejected));
    assert_eq!(snapshot.payment_status_detail.as_deref(), Some("requires_payment_method"));
    tear_down(&db).await;
}

#[actix_web::test]
async fn non_payment_event_is_archived_without_processing() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let body = json!({
        "id": "evt_cust_1",
        "type": "customer.created",
        "created": Utc::now().timestamp(),
        "data": {"object": {"id": "cus_44", "object": "customer"}}
    })
    .to_string();

    let (status, raw) = post_webhook(&db, "/wh/stripe", &body, &signed(&body)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_response(&raw).message, "Event recorded.");

    let api = flow_api(&db);
    assert!(api.fetch_webhook_event("stripe:evt_cust_1").await.unwrap().is_some());
    assert!(api.fetch_payment("cus_44").await.unwrap().is_none());
    tear_down(&db).await;
}

#[actix_web::test]
async fn missing_signature_header_is_flagged_but_processed() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let request_id = seed_reading_request(&db).await;
    let body = payment_intent_body("evt_unsigned_1", request_id);

    let (status, raw) = post_webhook(&db, "/wh/stripe", &body, &[]).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_response(&raw).message, "Event processed.");

    let snapshot = flow_api(&db).fetch_reading_request(request_id).await.unwrap().unwrap();
    assert_eq!(snapshot.payment_status, Some(NormalizedStatus::Approved));
    tear_down(&db).await;
}
