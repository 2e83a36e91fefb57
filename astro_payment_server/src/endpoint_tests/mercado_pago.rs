use actix_web::http::StatusCode;
use astro_payment_engine::{
    db_types::{NormalizedStatus, PaymentProvider},
    helpers::derive_event_uid,
};
use chrono::{Duration, Utc};
use serde_json::json;

use super::helpers::{
    flow_api,
    get_path,
    new_test_db,
    parse_response,
    post_webhook,
    seed_reading_request,
    tear_down,
    MP_SECRET,
    PATH_SECRET,
};
use crate::signature::test_signing::manifest_header;

fn approved_payment_body(request_id: i64) -> String {
    json!({
        "id": 112233,
        "type": "payment",
        "action": "payment.updated",
        "data": {
            "id": "55005500",
            "status": "approved",
            "status_detail": "accredited",
            "external_reference": request_id.to_string(),
            "transaction_amount": 129.9,
            "currency_id": "BRL",
            "date_approved": "2026-08-21T12:00:00.000-03:00",
            "payer": {"first_name": "Ana", "last_name": "Souza", "email": "ana.souza@example.com"}
        }
    })
    .to_string()
}

fn signed_headers(resource_id: &str, correlation_id: &str) -> Vec<(&'static str, String)> {
    let ts = Utc::now().timestamp_millis().to_string();
    vec![
        ("x-signature", manifest_header(MP_SECRET, resource_id, Some(correlation_id), &ts)),
        ("x-request-id", correlation_id.to_string()),
    ]
}

#[actix_web::test]
async fn approved_payment_is_processed_once_and_deduplicated() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let request_id = seed_reading_request(&db).await;
    let body = approved_payment_body(request_id);
    let headers = signed_headers("55005500", "req-0a1b2c");
    let path = format!("/wh/mercadopago/{PATH_SECRET}");

    let (status, raw) = post_webhook(&db, &path, &body, &headers).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let res = parse_response(&raw);
    assert!(res.success);
    assert_eq!(res.message, "Event processed.");

    // Redeliveries are acknowledged without touching the pipeline again.
    for _ in 0..2 {
        let (status, raw) = post_webhook(&db, &path, &body, &headers).await.expect("Request failed");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse_response(&raw).message, "Event already recorded.");
    }

    let api = flow_api(&db);
    let uid = derive_event_uid(PaymentProvider::MercadoPago, Some("112233"), Some("req-0a1b2c"), body.as_bytes());
    let event = api.fetch_webhook_event(&uid).await.unwrap().expect("Event should be stored");
    assert_eq!(event.topic.as_deref(), Some("payment"));
    assert_eq!(event.payment_id.as_deref(), Some("55005500"));

    let expected_reference = request_id.to_string();
    let payment = api.fetch_payment("55005500").await.unwrap().expect("Payment should be stored");
    assert_eq!(payment.normalized_status, NormalizedStatus::Approved);
    assert_eq!(payment.external_reference.as_deref(), Some(expected_reference.as_str()));
    // PII in the payer block is masked before it is stored.
    assert_eq!(payment.customer_email.as_deref(), Some("a***@e***.com"));

    let snapshot = api.fetch_reading_request(request_id).await.unwrap().unwrap();
    assert_eq!(snapshot.payment_status, Some(NormalizedStatus::Approved));
    assert_eq!(snapshot.payment_provider, Some(PaymentProvider::MercadoPago));
    assert_eq!(snapshot.payment_id.as_deref(), Some("55005500"));
    assert_eq!(snapshot.payment_amount.map(|a| a.value()), Some(12990));
    assert!(snapshot.authorized_at.is_some());
    tear_down(&db).await;
}

#[actix_web::test]
async fn tampered_signature_is_flagged_but_still_handled() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let request_id = seed_reading_request(&db).await;
    let body = approved_payment_body(request_id);
    let ts = Utc::now().timestamp_millis().to_string();
    let headers = vec![
        ("x-signature", manifest_header("not-the-configured-secret", "55005500", Some("req-tampered"), &ts)),
        ("x-request-id", "req-tampered".to_string()),
    ];

    let (status, raw) = post_webhook(&db, &format!("/wh/mercadopago/{PATH_SECRET}"), &body, &headers)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_response(&raw).message, "Event processed.");

    // Verification is a verdict, not a gate: the payment still lands in the snapshot.
    let snapshot = flow_api(&db).fetch_reading_request(request_id).await.unwrap().unwrap();
    assert_eq!(snapshot.payment_status, Some(NormalizedStatus::Approved));
    tear_down(&db).await;
}

#[actix_web::test]
async fn wrong_path_secret_is_flagged_but_acknowledged() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let request_id = seed_reading_request(&db).await;
    let body = approved_payment_body(request_id);
    let headers = signed_headers("55005500", "req-wrong-path");

    let (status, raw) = post_webhook(&db, "/wh/mercadopago/letmein", &body, &headers).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_response(&raw).message, "Event processed.");

    let uid = derive_event_uid(PaymentProvider::MercadoPago, Some("112233"), Some("req-wrong-path"), body.as_bytes());
    assert!(flow_api(&db).fetch_webhook_event(&uid).await.unwrap().is_some());
    tear_down(&db).await;
}

#[actix_web::test]
async fn stale_timestamp_is_flagged_but_processed() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let request_id = seed_reading_request(&db).await;
    let body = approved_payment_body(request_id);
    let ts = (Utc::now() - Duration::hours(2)).timestamp_millis().to_string();
    let headers = vec![
        ("x-signature", manifest_header(MP_SECRET, "55005500", Some("req-stale"), &ts)),
        ("x-request-id", "req-stale".to_string()),
    ];

    let (status, raw) = post_webhook(&db, &format!("/wh/mercadopago/{PATH_SECRET}"), &body, &headers)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_response(&raw).message, "Event processed.");

    let snapshot = flow_api(&db).fetch_reading_request(request_id).await.unwrap().unwrap();
    assert_eq!(snapshot.payment_status, Some(NormalizedStatus::Approved));
    tear_down(&db).await;
}

#[actix_web::test]
async fn merchant_order_notification_is_archived_only() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let request_id = seed_reading_request(&db).await;
    let body = json!({
        "resource": "https://api.mercadolibre.com/merchant_orders/61000",
        "topic": "merchant_order"
    })
    .to_string();

    let (status, raw) = post_webhook(&db, "/wh/mercadopago", &body, &[]).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_response(&raw).message, "Event recorded.");

    let api = flow_api(&db);
    let uid = derive_event_uid(PaymentProvider::MercadoPago, None, None, body.as_bytes());
    let event = api.fetch_webhook_event(&uid).await.unwrap().expect("Event should be archived");
    assert_eq!(event.topic.as_deref(), Some("merchant_order"));
    // A non-payment topic never reaches the payment store.
    let snapshot = api.fetch_reading_request(request_id).await.unwrap().unwrap();
    assert!(snapshot.payment_status.is_none());
    tear_down(&db).await;
}

#[actix_web::test]
async fn old_style_query_notification_is_processed() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;

    let (status, raw) =
        post_webhook(&db, "/wh/mercadopago?topic=payment&id=987000", "{}", &[]).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_response(&raw).message, "Event processed.");

    // No request to match, so the payment sits in the store for reconciliation.
    let payment = flow_api(&db).fetch_payment("987000").await.unwrap().expect("Payment should be stored");
    assert_eq!(payment.normalized_status, NormalizedStatus::Updated);
    assert!(payment.external_reference.is_none());
    tear_down(&db).await;
}

#[actix_web::test]
async fn unparseable_body_is_still_archived() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let body = "definitely not json {{{";

    let (status, raw) = post_webhook(&db, "/wh/mercadopago", body, &[]).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_response(&raw).message, "Event recorded.");

    let uid = derive_event_uid(PaymentProvider::MercadoPago, None, None, body.as_bytes());
    let event = flow_api(&db).fetch_webhook_event(&uid).await.unwrap().expect("Event should be archived");
    assert!(event.body.contains("definitely not json"));
    tear_down(&db).await;
}

#[actix_web::test]
async fn webhook_probes_acknowledge() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let stripe_path = format!("/wh/stripe/{PATH_SECRET}");
    let paths = ["/wh/mercadopago", "/wh/mercadopago/any-path-secret", "/wh/stripe", stripe_path.as_str()];
    for path in paths {
        let (status, raw) = get_path(&db, path).await.expect("Request failed");
        assert_eq!(status, StatusCode::OK, "probe on {path}");
        let res = parse_response(&raw);
        assert!(res.success);
        assert_eq!(res.message, "OK");
    }
    tear_down(&db).await;
}
