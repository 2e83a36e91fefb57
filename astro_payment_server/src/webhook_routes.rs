//! Webhook handler definitions for the payment providers.
//!
//! These handlers follow a different contract from the rest of the server. Providers treat any
//! non-2xx response as a failed delivery and retry aggressively, so every request is acknowledged
//! with a 200 and a small `{"success", "message"}` body, whatever happened inside. Signature
//! verification is a verdict, not a gate: a flagged delivery is recorded and processed all the
//! same, with the problem left in the audit log. The one thing that stops processing is the
//! event-uid dedupe in the engine, because a redelivered notification has by definition already
//! been handled.
use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use astro_payment_engine::{
    db_types::{NewWebhookEvent, PaymentProvider, PaymentUpdate},
    helpers::{derive_event_uid, sanitize_header_map, sanitize_json, sanitize_query_pairs},
    traits::PaymentPipelineDatabase,
    PaymentFlowApi,
};
use chrono::Utc;
use log::*;
use mercadopago_tools::MercadoPagoApi;
use serde_json::Value;

use crate::{
    config::ServerOptions,
    data_objects::JsonResponse,
    integrations::{
        mercado_pago::{payment_update_from_payment, payment_update_from_webhook, MercadoPagoEnvelope},
        stripe::{payment_update_from_event, StripeEnvelope},
    },
    signature::{ManifestVerifier, SignedPayloadVerifier},
};

//----------------------------------------------   Mercado Pago  ----------------------------------------------------

pub async fn mercado_pago_webhook<B: PaymentPipelineDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    query: web::Query<HashMap<String, String>>,
    api: web::Data<PaymentFlowApi<B>>,
    verifier: web::Data<ManifestVerifier>,
    mp: web::Data<MercadoPagoApi>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    let query = query.into_inner();
    handle_mercado_pago(&req, &body, &query, None, api.get_ref(), verifier.get_ref(), mp.get_ref(), *options.get_ref())
        .await
}

pub async fn mercado_pago_webhook_with_secret<B: PaymentPipelineDatabase>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    query: web::Query<HashMap<String, String>>,
    api: web::Data<PaymentFlowApi<B>>,
    verifier: web::Data<ManifestVerifier>,
    mp: web::Data<MercadoPagoApi>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    let supplied = path.into_inner();
    let query = query.into_inner();
    handle_mercado_pago(
        &req,
        &body,
        &query,
        Some(supplied.as_str()),
        api.get_ref(),
        verifier.get_ref(),
        mp.get_ref(),
        *options.get_ref(),
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn handle_mercado_pago<B: PaymentPipelineDatabase>(
    req: &HttpRequest,
    body: &[u8],
    query: &HashMap<String, String>,
    supplied_path_secret: Option<&str>,
    api: &PaymentFlowApi<B>,
    verifier: &ManifestVerifier,
    mp: &MercadoPagoApi,
    options: ServerOptions,
) -> HttpResponse {
    trace!("📨️ Received Mercado Pago webhook request: {}", req.uri());
    let parsed = parse_body(body);
    let signature = header_value(req, "x-signature");
    let correlation_id = header_value(req, "x-request-id");
    let verdict =
        verifier.verify(parsed.as_ref(), signature.as_deref(), correlation_id.as_deref(), supplied_path_secret);
    let envelope = MercadoPagoEnvelope::from_notification(parsed.as_ref(), query);
    let event_uid = derive_event_uid(
        PaymentProvider::MercadoPago,
        envelope.envelope_id.as_deref(),
        correlation_id.as_deref(),
        body,
    );
    debug!(
        "📨️ Mercado Pago delivery {event_uid} (topic: {}): {verdict}",
        envelope.topic.as_deref().unwrap_or("<none>")
    );
    let mut event = new_event(req, PaymentProvider::MercadoPago, event_uid.clone(), query, parsed.as_ref(), body);
    event.topic = envelope.topic.clone();
    event.action = envelope.action.clone();
    if envelope.is_payment() {
        event.payment_id = envelope.resource_id.clone();
    }
    let outcome = match api.ingest_notification(event).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("📨️ Could not record Mercado Pago event {event_uid}. {e}");
            return HttpResponse::Ok().json(JsonResponse::failure("Could not record the event."));
        },
    };
    if outcome.is_duplicate() {
        return HttpResponse::Ok().json(JsonResponse::success("Event already recorded."));
    }
    if !envelope.is_payment() {
        debug!("📨️ Mercado Pago event {event_uid} carries no payment state. Recorded and acknowledged.");
        return HttpResponse::Ok().json(JsonResponse::success("Event recorded."));
    }
    let result = match mercado_pago_update(&envelope, parsed.as_ref(), mp, options).await {
        Some(update) => apply_update(api, update, &event_uid).await,
        None => {
            debug!("📨️ Mercado Pago event {event_uid} has no usable payment payload. Recorded and acknowledged.");
            JsonResponse::success("Event recorded.")
        },
    };
    HttpResponse::Ok().json(result)
}

/// The payment view to merge for a Mercado Pago notification. When cross-checking is enabled the
/// authoritative record is fetched from the provider API; webhook-asserted state is the fallback,
/// so a provider outage degrades the data source instead of dropping the delivery.
async fn mercado_pago_update(
    envelope: &MercadoPagoEnvelope,
    body: Option<&Value>,
    mp: &MercadoPagoApi,
    options: ServerOptions,
) -> Option<PaymentUpdate> {
    let resource_id = envelope.resource_id.as_deref()?;
    if options.mp_cross_check {
        match resource_id.parse::<u64>() {
            Ok(id) => match mp.fetch_payment(id).await {
                Ok(payment) => {
                    debug!("📨️ Payment {id} cross-checked against the Mercado Pago API.");
                    return Some(payment_update_from_payment(&payment));
                },
                Err(e) => {
                    warn!(
                        "📨️ Could not cross-check payment {id} against the Mercado Pago API. Falling back to the \
                         webhook payload. {e}"
                    );
                },
            },
            Err(_) => debug!("📨️ Resource id '{resource_id}' is not numeric. Cross-check skipped."),
        }
    }
    payment_update_from_webhook(envelope, body)
}

//----------------------------------------------   Stripe  ----------------------------------------------------

pub async fn stripe_webhook<B: PaymentPipelineDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    query: web::Query<HashMap<String, String>>,
    api: web::Data<PaymentFlowApi<B>>,
    verifier: web::Data<SignedPayloadVerifier>,
) -> HttpResponse {
    let query = query.into_inner();
    handle_stripe(&req, &body, &query, None, api.get_ref(), verifier.get_ref()).await
}

pub async fn stripe_webhook_with_secret<B: PaymentPipelineDatabase>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    query: web::Query<HashMap<String, String>>,
    api: web::Data<PaymentFlowApi<B>>,
    verifier: web::Data<SignedPayloadVerifier>,
) -> HttpResponse {
    let supplied = path.into_inner();
    let query = query.into_inner();
    handle_stripe(&req, &body, &query, Some(supplied.as_str()), api.get_ref(), verifier.get_ref()).await
}

async fn handle_stripe<B: PaymentPipelineDatabase>(
    req: &HttpRequest,
    body: &[u8],
    query: &HashMap<String, String>,
    supplied_path_secret: Option<&str>,
    api: &PaymentFlowApi<B>,
    verifier: &SignedPayloadVerifier,
) -> HttpResponse {
    trace!("📨️ Received Stripe webhook request: {}", req.uri());
    let parsed = parse_body(body);
    let signature = header_value(req, "Stripe-Signature");
    let verdict = verifier.verify(body, signature.as_deref(), supplied_path_secret);
    let envelope = StripeEnvelope::from_event(parsed.as_ref());
    let event_uid = derive_event_uid(PaymentProvider::Stripe, envelope.envelope_id.as_deref(), None, body);
    debug!(
        "📨️ Stripe delivery {event_uid} (type: {}): {verdict}",
        envelope.event_type.as_deref().unwrap_or("<none>")
    );
    let mut event = new_event(req, PaymentProvider::Stripe, event_uid.clone(), query, parsed.as_ref(), body);
    event.topic = envelope.event_type.clone();
    event.checkout_id = envelope.checkout_id.clone();
    if envelope.is_payment() {
        event.payment_id = envelope.payment_id.clone();
    }
    let outcome = match api.ingest_notification(event).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("📨️ Could not record Stripe event {event_uid}. {e}");
            return HttpResponse::Ok().json(JsonResponse::failure("Could not record the event."));
        },
    };
    if outcome.is_duplicate() {
        return HttpResponse::Ok().json(JsonResponse::success("Event already recorded."));
    }
    if !envelope.is_payment() {
        debug!("📨️ Stripe event {event_uid} carries no payment state. Recorded and acknowledged.");
        return HttpResponse::Ok().json(JsonResponse::success("Event recorded."));
    }
    let result = match payment_update_from_event(&envelope, parsed.as_ref()) {
        Some(update) => apply_update(api, update, &event_uid).await,
        None => {
            debug!("📨️ Stripe event {event_uid} has no usable payment payload. Recorded and acknowledged.");
            JsonResponse::success("Event recorded.")
        },
    };
    HttpResponse::Ok().json(result)
}

//----------------------------------------------   Probes  ----------------------------------------------------

/// Trivial acknowledgement for provider liveness checks, served on GET for every webhook path.
pub async fn webhook_probe() -> HttpResponse {
    trace!("📨️ Webhook probe acknowledged");
    HttpResponse::Ok().json(JsonResponse::success("OK"))
}

//----------------------------------------------   Shared plumbing  ----------------------------------------------------

fn parse_body(body: &[u8]) -> Option<Value> {
    serde_json::from_slice(body).ok()
}

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers().get(name).and_then(|v| v.to_str().ok()).map(String::from)
}

/// The stored form of a delivery. Headers, query and body all pass through the sanitizer; a body
/// that is not JSON at all is kept verbatim as a string so nothing is lost for forensics.
fn new_event(
    req: &HttpRequest,
    provider: PaymentProvider,
    event_uid: String,
    query: &HashMap<String, String>,
    parsed: Option<&Value>,
    raw: &[u8],
) -> NewWebhookEvent {
    let mut event = NewWebhookEvent::new(event_uid, provider);
    event.headers = sanitize_header_map(req.headers().iter().filter_map(|(n, v)| v.to_str().ok().map(|s| (n.as_str(), s))));
    event.query = sanitize_query_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    event.body = match parsed {
        Some(v) => sanitize_json(v),
        None => Value::String(String::from_utf8_lossy(raw).into_owned()),
    };
    event.received_at = Utc::now();
    event
}

async fn apply_update<B: PaymentPipelineDatabase>(
    api: &PaymentFlowApi<B>,
    update: PaymentUpdate,
    event_uid: &str,
) -> JsonResponse {
    let payment_id = update.payment_id.clone();
    match api.apply_payment_update(update).await {
        Ok(Some(change)) if change.is_transition() => {
            info!(
                "📨️ Payment {payment_id} moved request #{} from {} to {}.",
                change.request_id,
                change.old_status.map(|s| s.to_string()).unwrap_or_else(|| "<none>".to_string()),
                change.new_status
            );
            JsonResponse::success("Event processed.")
        },
        Ok(Some(change)) => {
            debug!("📨️ Payment {payment_id} refreshed request #{} without a status change.", change.request_id);
            JsonResponse::success("Event processed.")
        },
        Ok(None) => {
            debug!("📨️ Payment {payment_id} is not linked to a request yet. Stored for reconciliation.");
            JsonResponse::success("Event processed.")
        },
        Err(e) => {
            warn!("📨️ Could not merge payment {payment_id} from event {event_uid}. {e}");
            JsonResponse::failure("Could not process the payment update.")
        },
    }
}
