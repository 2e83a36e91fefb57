use actix_web::http::StatusCode;
use serde_json::json;

use super::helpers::{flow_api, get_path, new_test_db, post_json, seed_reading_request, tear_down};
use crate::data_objects::RequestCreatedResponse;

fn birth_chart_request() -> String {
    json!({
        "product_type": "birth_chart",
        "customer_name": "Ana Souza",
        "customer_email": "ana.souza@example.com",
        "birth_date": "1992-04-07",
        "birth_time": "14:25",
        "birth_place": "São Paulo, Brazil",
        "latitude": -23.5505,
        "longitude": -46.6333,
        "utc_offset_hours": -3.0
    })
    .to_string()
}

#[actix_web::test]
async fn health_check_works() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let (status, body) = get_path(&db, "/health").await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
    tear_down(&db).await;
}

#[actix_web::test]
async fn new_reading_request_returns_the_stored_id() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;

    let (status, raw) = post_json(&db, "/api/requests", &birth_chart_request()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let res: RequestCreatedResponse = serde_json::from_str(&raw).expect("Response should carry the new id");
    assert_eq!(res.id, 1);

    let stored = flow_api(&db).fetch_reading_request(res.id).await.unwrap().expect("Request should be stored");
    assert_eq!(stored.customer_email, "ana.souza@example.com");
    assert_eq!(stored.birth_place, "São Paulo, Brazil");
    // The payment snapshot starts empty; only webhooks fill it in.
    assert!(stored.payment_status.is_none());
    assert!(stored.checkout_id.is_none());

    // Partner fields are optional in the payload but preserved when present.
    let relationship = json!({
        "product_type": "relationship_reading",
        "customer_name": "Ana Souza",
        "customer_email": "ana.souza@example.com",
        "birth_date": "1992-04-07",
        "birth_time": "14:25",
        "birth_place": "São Paulo, Brazil",
        "latitude": -23.5505,
        "longitude": -46.6333,
        "utc_offset_hours": -3.0,
        "partner_name": "Bruno Lima",
        "partner_birth_date": "1990-11-23",
        "partner_birth_time": "03:10",
        "partner_birth_place": "Rio de Janeiro, Brazil",
        "partner_latitude": -22.9068,
        "partner_longitude": -43.1729
    })
    .to_string();
    let (status, raw) = post_json(&db, "/api/requests", &relationship).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let res: RequestCreatedResponse = serde_json::from_str(&raw).unwrap();
    assert_eq!(res.id, 2);
    let stored = flow_api(&db).fetch_reading_request(res.id).await.unwrap().unwrap();
    assert_eq!(stored.partner_name.as_deref(), Some("Bruno Lima"));
    tear_down(&db).await;
}

#[actix_web::test]
async fn incomplete_request_body_is_rejected() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let body = json!({
        "product_type": "birth_chart",
        "customer_name": "Ana Souza"
    })
    .to_string();

    let err = post_json(&db, "/api/requests", &body).await.expect_err("Request should have failed");
    assert!(err.contains("customer_email"), "Unexpected error: {err}");
    assert!(flow_api(&db).fetch_reading_request(1).await.unwrap().is_none());
    tear_down(&db).await;
}

#[actix_web::test]
async fn checkout_for_an_unknown_request_is_refused() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let err = post_json(&db, "/api/requests/999/checkout", "").await.expect_err("Request should have failed");
    assert_eq!(err, "The data was not found. Reading request 999 does not exist");
    tear_down(&db).await;
}

#[actix_web::test]
async fn checkout_surfaces_provider_failures() {
    let _ = env_logger::try_init().ok();
    let db = new_test_db().await;
    let request_id = seed_reading_request(&db).await;

    let err = post_json(&db, &format!("/api/requests/{request_id}/checkout"), "")
        .await
        .expect_err("Request should have failed");
    assert!(err.starts_with("Could not create the checkout."), "Unexpected error: {err}");

    // Nothing was stored against the request.
    let stored = flow_api(&db).fetch_reading_request(request_id).await.unwrap().unwrap();
    assert!(stored.checkout_id.is_none());
    assert!(stored.payment_link.is_none());
    tear_down(&db).await;
}
