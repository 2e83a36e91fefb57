//! Stripe event handling: envelope extraction and conversion of event payloads into the
//! pipeline's payment updates.

use apg_common::MoneyMinor;
use astro_payment_engine::{
    db_types::{MaskedCustomer, PaymentProvider, PaymentUpdate},
    helpers::sanitize_json,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::signature::json_id_string;

/// The routing fields of a Stripe event body.
#[derive(Debug, Clone, Default)]
pub struct StripeEnvelope {
    /// The event id (`evt_...`), stable across redeliveries.
    pub envelope_id: Option<String>,
    /// The event type, e.g. `payment_intent.succeeded`.
    pub event_type: Option<String>,
    /// The payment object the update applies to.
    pub payment_id: Option<String>,
    /// The checkout session id, when the event wraps a checkout session.
    pub checkout_id: Option<String>,
}

impl StripeEnvelope {
    pub fn from_event(body: Option<&Value>) -> Self {
        let body = match body {
            Some(b) => b,
            None => return Self::default(),
        };
        let envelope_id = body.get("id").and_then(json_id_string);
        let event_type = body.get("type").and_then(|v| v.as_str().map(String::from));
        let object = body.pointer("/data/object");
        let object_id = object.and_then(|o| o.get("id")).and_then(json_id_string);
        let is_checkout = object.and_then(|o| o.get("object")).and_then(|v| v.as_str()) == Some("checkout.session");
        // A checkout session is keyed by its payment intent so session and intent events merge
        // into one payment record; the session id rides along for the fallback lookup.
        let (payment_id, checkout_id) = if is_checkout {
            let payment_intent = object.and_then(|o| o.get("payment_intent")).and_then(json_id_string);
            (payment_intent.or_else(|| object_id.clone()), object_id)
        } else {
            (object_id, None)
        };
        Self { envelope_id, event_type, payment_id, checkout_id }
    }

    /// Only payment-bearing events are merged into the payment store; the rest are archived in
    /// the event log and otherwise ignored.
    pub fn is_payment(&self) -> bool {
        match self.event_type.as_deref() {
            Some(t) => {
                t.starts_with("payment_intent.") || t.starts_with("charge.") || t.starts_with("checkout.session.")
            },
            None => false,
        }
    }
}

/// Builds a payment update from a Stripe event. The event type's lifecycle verb wins over the
/// object's status field: a refunded charge still reports `status: "succeeded"` on the object.
pub fn payment_update_from_event(envelope: &StripeEnvelope, body: Option<&Value>) -> Option<PaymentUpdate> {
    let payment_id = envelope.payment_id.clone()?;
    let object = body.and_then(|b| b.pointer("/data/object"));
    let object_status = object.and_then(|o| o.get("status")).and_then(|v| v.as_str());
    let status =
        verb_status(envelope.event_type.as_deref()).or_else(|| object_status.map(String::from)).unwrap_or_else(|| "updated".to_string());
    let mut update = PaymentUpdate::new(payment_id, PaymentProvider::Stripe, status.clone());
    update.checkout_id = envelope.checkout_id.clone();
    update.status_detail = object_status.filter(|s| *s != status.as_str()).map(String::from);
    update.external_reference = object
        .and_then(|o| o.pointer("/metadata/request_id"))
        .and_then(json_id_string)
        .or_else(|| object.and_then(|o| o.get("client_reference_id")).and_then(json_id_string));
    update.customer = customer_from_object(object);
    // Stripe amounts are already in minor units.
    update.amount =
        object.and_then(|o| o.get("amount").or_else(|| o.get("amount_total"))).and_then(Value::as_i64).map(MoneyMinor::from);
    update.currency = object.and_then(|o| o.get("currency")).and_then(|v| v.as_str()).map(|s| s.to_uppercase());
    update.provider_created_at =
        body.and_then(|b| b.get("created")).and_then(Value::as_i64).and_then(|s| Utc.timestamp_opt(s, 0).single());
    if update.status == "succeeded" {
        update.authorized_at = update.provider_created_at;
    }
    update.raw = object.map(sanitize_json).unwrap_or(Value::Null);
    Some(update)
}

/// Lifecycle verbs trusted from the event type. Everything else defers to the object status.
fn verb_status(event_type: Option<&str>) -> Option<String> {
    let t = event_type?;
    if t.starts_with("charge.dispute") {
        return Some("disputed".to_string());
    }
    match t.rsplit('.').next() {
        Some(verb @ ("succeeded" | "payment_failed" | "canceled" | "refunded" | "expired")) => Some(verb.to_string()),
        _ => None,
    }
}

fn customer_from_object(object: Option<&Value>) -> MaskedCustomer {
    let object = match object {
        Some(o) => o,
        None => return MaskedCustomer::default(),
    };
    let details = object.get("billing_details").or_else(|| object.get("customer_details"));
    let name = details.and_then(|d| d.get("name")).and_then(|v| v.as_str());
    let email = details
        .and_then(|d| d.get("email"))
        .and_then(|v| v.as_str())
        .or_else(|| object.get("receipt_email").and_then(|v| v.as_str()));
    let phone = details.and_then(|d| d.get("phone")).and_then(|v| v.as_str());
    MaskedCustomer::from_raw(name, email, None, phone, None)
}
