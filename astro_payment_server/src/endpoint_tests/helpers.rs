use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use astro_payment_engine::{
    db_types::{NewReadingRequest, ProductType},
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path},
    PaymentFlowApi,
    PaymentPipelineDatabase,
    SqliteDatabase,
};
use apg_common::Secret;
use chrono::Duration;
use log::*;
use mercadopago_tools::{MercadoPagoApi, MercadoPagoConfig};
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    config::{CheckoutConfig, PricingConfig, ServerOptions, WebhookConfig},
    data_objects::JsonResponse,
    routes::{create_checkout, health, new_reading_request},
    signature::{ManifestVerifier, SignedPayloadVerifier},
    webhook_routes::{
        mercado_pago_webhook,
        mercado_pago_webhook_with_secret,
        stripe_webhook,
        stripe_webhook_with_secret,
        webhook_probe,
    },
};

// Test-only webhook secrets. DO NOT re-use these values anywhere.
pub const MP_SECRET: &str = "83b1c0a9d3784c6f8e3a51f204c8b7aa";
pub const STRIPE_SECRET: &str = "whsec_0f6e2d9b41c34bb7a2f7c55d8e91a6d0";
pub const PATH_SECRET: &str = "wh-path-7f3d2";

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to test database")
}

pub async fn tear_down(db: &SqliteDatabase) {
    db.pool().close().await;
    if let Err(e) = Sqlite::drop_database(db.url()).await {
        error!("Failed to drop test database: {e}");
    }
}

/// A flow api over the test database with no event subscribers, for seeding and assertions.
pub fn flow_api(db: &SqliteDatabase) -> PaymentFlowApi<SqliteDatabase> {
    PaymentFlowApi::new(db.clone(), EventProducers::default())
}

pub fn reading_request_fixture() -> NewReadingRequest {
    NewReadingRequest {
        product_type: ProductType::BirthChart,
        customer_name: "Ana Souza".to_string(),
        customer_email: "ana.souza@example.com".to_string(),
        birth_date: "1992-04-07".to_string(),
        birth_time: "14:25".to_string(),
        birth_place: "São Paulo, Brazil".to_string(),
        latitude: -23.5505,
        longitude: -46.6333,
        utc_offset_hours: -3.0,
        partner_name: None,
        partner_birth_date: None,
        partner_birth_time: None,
        partner_birth_place: None,
        partner_latitude: None,
        partner_longitude: None,
    }
}

pub async fn seed_reading_request(db: &SqliteDatabase) -> i64 {
    flow_api(db).insert_reading_request(reading_request_fixture()).await.expect("Could not store the fixture request").id
}

pub fn parse_response(body: &str) -> JsonResponse {
    serde_json::from_str(body).expect("Response body should be a JsonResponse")
}

pub async fn get_path(db: &SqliteDatabase, path: &str) -> Result<(StatusCode, String), String> {
    call(db, TestRequest::get().uri(path)).await
}

pub async fn post_json(db: &SqliteDatabase, path: &str, body: &str) -> Result<(StatusCode, String), String> {
    let req = TestRequest::post()
        .uri(path)
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    call(db, req).await
}

pub async fn post_webhook(
    db: &SqliteDatabase,
    path: &str,
    body: &str,
    headers: &[(&str, String)],
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::post().uri(path).set_payload(body.to_string());
    for (name, value) in headers {
        req = req.insert_header((*name, value.as_str()));
    }
    call(db, req).await
}

fn mp_webhook_config() -> WebhookConfig {
    WebhookConfig {
        secret: Some(Secret::new(MP_SECRET.to_string())),
        path_secret: Some(Secret::new(PATH_SECRET.to_string())),
        tolerance: Duration::seconds(900),
    }
}

fn stripe_webhook_config() -> WebhookConfig {
    WebhookConfig {
        secret: Some(Secret::new(STRIPE_SECRET.to_string())),
        path_secret: Some(Secret::new(PATH_SECRET.to_string())),
        tolerance: Duration::seconds(900),
    }
}

/// Builds the production route table around the test database and fires one request at it.
///
/// The Mercado Pago client points at a closed local port, so any test that reaches the provider
/// API exercises the failure path instead of the network. A handler error comes back as
/// `Err(message)`, exactly as the client would see it in the response body.
async fn call(db: &SqliteDatabase, req: TestRequest) -> Result<(StatusCode, String), String> {
    let api = PaymentFlowApi::new(db.clone(), EventProducers::default());
    let mp_config = MercadoPagoConfig::default().with_base_url("http://127.0.0.1:19");
    let mp_api = MercadoPagoApi::new(mp_config).expect("Mercado Pago client should build");
    let checkout_config = CheckoutConfig {
        pricing: PricingConfig::default(),
        notification_url: Some("https://apg.test/wh/mercadopago".to_string()),
    };
    let app = App::new()
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(mp_api))
        .app_data(web::Data::new(ServerOptions { mp_cross_check: false }))
        .app_data(web::Data::new(checkout_config))
        .app_data(web::Data::new(ManifestVerifier::new(&mp_webhook_config())))
        .app_data(web::Data::new(SignedPayloadVerifier::new(&stripe_webhook_config())))
        .service(health)
        .service(
            web::scope("/wh")
                .route("/mercadopago", web::post().to(mercado_pago_webhook::<SqliteDatabase>))
                .route("/mercadopago", web::get().to(webhook_probe))
                .route("/mercadopago/{path_secret}", web::post().to(mercado_pago_webhook_with_secret::<SqliteDatabase>))
                .route("/mercadopago/{path_secret}", web::get().to(webhook_probe))
                .route("/stripe", web::post().to(stripe_webhook::<SqliteDatabase>))
                .route("/stripe", web::get().to(webhook_probe))
                .route("/stripe/{path_secret}", web::post().to(stripe_webhook_with_secret::<SqliteDatabase>))
                .route("/stripe/{path_secret}", web::get().to(webhook_probe)),
        )
        .service(
            web::scope("/api")
                .route("/requests", web::post().to(new_reading_request::<SqliteDatabase>))
                .route("/requests/{id}/checkout", web::post().to(create_checkout::<SqliteDatabase>)),
        );
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    if status.is_success() {
        Ok((status, body))
    } else {
        // Error responses from `ServerError` carry `{"error": message}`; extractor failures are
        // plain text. Either way the message is what the client reads out of the body.
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
            .unwrap_or(body);
        Err(message)
    }
}
