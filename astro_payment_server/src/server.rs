use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use astro_payment_engine::{events::EventProducers, PaymentFlowApi, SqliteDatabase};
use astrocalc_tools::AutomationApi;
use log::*;
use mercadopago_tools::MercadoPagoApi;

use crate::{
    config::{CheckoutConfig, ServerConfig, ServerOptions},
    errors::ServerError,
    jobs::{create_product_event_handlers, retry::RetryPolicy},
    routes::{create_checkout, health, new_reading_request},
    scheduler::start_trigger_scheduler,
    signature::{ManifestVerifier, SignedPayloadVerifier},
    webhook_routes::{
        mercado_pago_webhook,
        mercado_pago_webhook_with_secret,
        stripe_webhook,
        stripe_webhook_with_secret,
        webhook_probe,
    },
};

/// Brings the whole pipeline up: database and migrations, event handlers, the trigger scheduler,
/// and finally the HTTP server. Returns when the server shuts down.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations()
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not run database migrations. {e}")))?;
    info!("🚀️ Database is ready at {}", config.database_url);
    let handlers = create_product_event_handlers(db.clone(), &config)?;
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let automation = AutomationApi::new(config.automation.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not create the automation client. {e}")))?;
    let policy = RetryPolicy::new(config.jobs.max_http_attempts);
    let _scheduler = start_trigger_scheduler(db.clone(), automation, policy, config.scheduler);
    let srv = create_server_instance(config, db, producers)?;
    Ok(srv.await?)
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let mp_api = MercadoPagoApi::new(config.mp_api.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not create the Mercado Pago client. {e}")))?;
    // The verifiers own the replay and audit caches, so they are created once and shared across
    // workers rather than rebuilt in the app factory.
    let mp_verifier = web::Data::new(ManifestVerifier::new(&config.mercado_pago));
    let stripe_verifier = web::Data::new(SignedPayloadVerifier::new(&config.stripe));
    let options = ServerOptions::from_config(&config);
    let checkout_config = CheckoutConfig::from_config(&config);
    let srv = HttpServer::new(move || {
        let flow_api = PaymentFlowApi::new(db.clone(), producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("apg::access_log"))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(mp_api.clone()))
            .app_data(web::Data::new(options))
            .app_data(web::Data::new(checkout_config.clone()))
            .app_data(mp_verifier.clone())
            .app_data(stripe_verifier.clone())
            .service(health)
            .service(
                web::scope("/wh")
                    .route("/mercadopago", web::post().to(mercado_pago_webhook::<SqliteDatabase>))
                    .route("/mercadopago", web::get().to(webhook_probe))
                    .route(
                        "/mercadopago/{path_secret}",
                        web::post().to(mercado_pago_webhook_with_secret::<SqliteDatabase>),
                    )
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
            )
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
