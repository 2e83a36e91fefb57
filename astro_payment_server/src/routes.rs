//! Request handler definitions for the internal API.
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go into
//! a separate module. Keep this module neat and tidy 🙏
//!
//! Webhook handlers live in [`crate::webhook_routes`]; they follow different rules (always
//! acknowledge with a 200) and should not be mixed in with these.
use actix_web::{get, web, HttpResponse, Responder};
use apg_common::mask_email;
use astro_payment_engine::{
    db_types::{MaskedCustomer, NewCheckout, NewReadingRequest, PaymentProvider, ProductType},
    traits::PaymentPipelineDatabase,
    PaymentFlowApi,
};
use log::*;
use mercadopago_tools::{MercadoPagoApi, NewCheckoutPreference, PreferenceItem, PreferencePayer};
use serde_json::json;

use crate::{
    config::CheckoutConfig,
    data_objects::{CheckoutCreatedResponse, RequestCreatedResponse},
    errors::ServerError,
};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Requests  ----------------------------------------------------

/// Route handler for the reading-request intake endpoint.
///
/// Stores the request with an empty payment snapshot and returns its id. The id is what ties the
/// whole pipeline together: it becomes the checkout's `external_reference`, which is how provider
/// webhooks find their way back to the request.
pub async fn new_reading_request<B: PaymentPipelineDatabase>(
    api: web::Data<PaymentFlowApi<B>>,
    body: web::Json<NewReadingRequest>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST new {} request for {}", request.product_type, mask_email(&request.customer_email));
    let record = api.insert_reading_request(request).await?;
    info!("💻️ Reading request #{} ({}) stored", record.id, record.product_type);
    Ok(HttpResponse::Ok().json(RequestCreatedResponse { id: record.id }))
}

//----------------------------------------------   Checkout  ----------------------------------------------------

/// Route handler for creating a Mercado Pago checkout for a stored reading request.
///
/// Creates a checkout preference with the configured price for the request's product, records the
/// checkout against the request, and returns the payment link. The stored checkout row also seeds
/// the request snapshot's `checkout_id`, so webhooks that arrive without an `external_reference`
/// can still be matched.
pub async fn create_checkout<B: PaymentPipelineDatabase>(
    path: web::Path<i64>,
    api: web::Data<PaymentFlowApi<B>>,
    mp: web::Data<MercadoPagoApi>,
    settings: web::Data<CheckoutConfig>,
) -> Result<HttpResponse, ServerError> {
    let request_id = path.into_inner();
    let request = api
        .fetch_reading_request(request_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Reading request {request_id} does not exist")))?;
    debug!("🛒️ Creating a checkout for reading request #{request_id} ({})", request.product_type);
    let preference = NewCheckoutPreference {
        items: vec![PreferenceItem {
            title: product_title(request.product_type).to_string(),
            quantity: 1,
            unit_price: settings.pricing.price_for(request.product_type),
            currency_id: settings.pricing.currency.clone(),
        }],
        payer: PreferencePayer { name: request.customer_name.clone(), email: request.customer_email.clone() },
        external_reference: request_id.to_string(),
        notification_url: settings.notification_url.clone(),
        metadata: json!({ "request_id": request_id, "product_type": request.product_type }),
    };
    let created = mp.create_checkout(&preference).await.map_err(|e| {
        warn!("🛒️ Mercado Pago rejected the checkout preference for request #{request_id}. {e}");
        ServerError::from(e)
    })?;
    let customer = MaskedCustomer::from_raw(
        Some(request.customer_name.as_str()),
        Some(request.customer_email.as_str()),
        None,
        None,
        None,
    );
    let checkout = NewCheckout {
        checkout_id: created.id.clone(),
        request_id,
        provider: PaymentProvider::MercadoPago,
        status: "created".to_string(),
        link: Some(created.init_point.clone()),
        customer: serde_json::to_value(&customer).unwrap_or_default(),
        raw: serde_json::to_value(&created).unwrap_or_default(),
    };
    let record = api.process_new_checkout(checkout).await?;
    info!("🛒️ Checkout {} created for reading request #{request_id}", record.checkout_id);
    let response = CheckoutCreatedResponse { checkout_id: record.checkout_id, link: record.link };
    Ok(HttpResponse::Ok().json(response))
}

fn product_title(product_type: ProductType) -> &'static str {
    match product_type {
        ProductType::BirthChart => "Birth chart reading",
        ProductType::RelationshipReading => "Relationship reading",
    }
}
