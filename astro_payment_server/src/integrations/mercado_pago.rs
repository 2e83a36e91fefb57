//! Mercado Pago notification handling: envelope extraction, webhook-asserted payment updates,
//! and conversion of the authoritative fetch-by-id response.

use std::collections::HashMap;

use apg_common::MoneyMinor;
use astro_payment_engine::{
    db_types::{MaskedCustomer, PaymentProvider, PaymentUpdate},
    helpers::sanitize_json,
};
use chrono::{DateTime, Utc};
use mercadopago_tools::MercadoPagoPayment;
use serde_json::Value;

use crate::signature::{extract_resource_id, json_id_string};

/// The routing fields of a Mercado Pago notification. New-style webhooks carry everything in the
/// body; old-style IPN notifications put `topic` and the resource id in the query string only.
#[derive(Debug, Clone, Default)]
pub struct MercadoPagoEnvelope {
    /// The provider's notification id. Distinct from the payment id, and stable across
    /// redeliveries of the same notification.
    pub envelope_id: Option<String>,
    pub topic: Option<String>,
    pub action: Option<String>,
    /// The id of the resource the notification refers to; the payment id for payment topics.
    pub resource_id: Option<String>,
}

impl MercadoPagoEnvelope {
    pub fn from_notification(body: Option<&Value>, query: &HashMap<String, String>) -> Self {
        let envelope_id = body.and_then(|b| b.get("id")).and_then(json_id_string);
        let topic = body
            .and_then(|b| b.get("type").or_else(|| b.get("topic")))
            .and_then(|v| v.as_str().map(String::from))
            .or_else(|| query.get("type").or_else(|| query.get("topic")).cloned())
            .filter(|s| !s.is_empty());
        let action = body.and_then(|b| b.get("action")).and_then(|v| v.as_str().map(String::from));
        let resource_id = body
            .and_then(extract_resource_id)
            .or_else(|| query.get("data.id").cloned().filter(|s| !s.is_empty()))
            .or_else(|| query.get("id").cloned().filter(|s| !s.is_empty()));
        Self { envelope_id, topic, action, resource_id }
    }

    pub fn is_payment(&self) -> bool {
        self.topic.as_deref() == Some("payment")
    }
}

/// Builds a payment update from webhook-asserted state. This is the fallback path, used when no
/// access token is configured for the authoritative cross-check: the notification body is all we
/// have, and anything it omits stays unknown.
pub fn payment_update_from_webhook(envelope: &MercadoPagoEnvelope, body: Option<&Value>) -> Option<PaymentUpdate> {
    let payment_id = envelope.resource_id.clone()?;
    let data = body.and_then(|b| b.get("data"));
    let status = field(data, body, "status").and_then(|v| v.as_str()).unwrap_or("updated").to_string();
    let mut update = PaymentUpdate::new(payment_id, PaymentProvider::MercadoPago, status);
    update.status_detail = field(data, body, "status_detail").and_then(|v| v.as_str().map(String::from));
    update.external_reference = field(data, body, "external_reference").and_then(json_id_string);
    update.customer = customer_from_payer(field(data, body, "payer"));
    update.amount =
        field(data, body, "transaction_amount").and_then(Value::as_f64).and_then(|v| MoneyMinor::try_from_major_f64(v).ok());
    update.currency = field(data, body, "currency_id").and_then(|v| v.as_str().map(String::from));
    update.provider_created_at = field(data, body, "date_created").and_then(parse_rfc3339);
    update.authorized_at = field(data, body, "date_approved").and_then(parse_rfc3339);
    update.raw = body.map(sanitize_json).unwrap_or(Value::Null);
    Some(update)
}

/// Converts the authoritative fetch-by-id response into a payment update. Preferred over the
/// webhook body whenever an access token is configured, since notification bodies for payment
/// topics carry little more than the id.
pub fn payment_update_from_payment(payment: &MercadoPagoPayment) -> PaymentUpdate {
    let mut update = PaymentUpdate::new(payment.id.to_string(), PaymentProvider::MercadoPago, payment.status.clone());
    update.status_detail = payment.status_detail.clone();
    update.external_reference = payment.external_reference.clone();
    let (name, email, tax_id, phone) = match &payment.payer {
        Some(p) => (
            p.full_name(),
            p.email.clone(),
            p.identification.as_ref().and_then(|i| i.number.clone()),
            p.phone.as_ref().and_then(|ph| ph.formatted()),
        ),
        None => (None, None, None, None),
    };
    update.customer =
        MaskedCustomer::from_raw(name.as_deref(), email.as_deref(), tax_id.as_deref(), phone.as_deref(), None);
    update.amount = payment.transaction_amount.and_then(|v| MoneyMinor::try_from_major_f64(v).ok());
    update.currency = payment.currency_id.clone();
    update.provider_created_at = payment.date_created;
    update.authorized_at = payment.date_approved;
    update.raw = serde_json::to_value(payment).map(|v| sanitize_json(&v)).unwrap_or(Value::Null);
    update
}

/// Payment notifications scatter fields between `data` and the body root depending on the
/// notification style; `data` wins when both carry the key.
fn field<'a>(data: Option<&'a Value>, body: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    data.and_then(|d| d.get(key)).or_else(|| body.and_then(|b| b.get(key)))
}

fn customer_from_payer(payer: Option<&Value>) -> MaskedCustomer {
    let payer = match payer {
        Some(p) => p,
        None => return MaskedCustomer::default(),
    };
    let first = payer.get("first_name").and_then(|v| v.as_str());
    let last = payer.get("last_name").and_then(|v| v.as_str());
    let name = match (first, last) {
        (Some(f), Some(l)) => Some(format!("{f} {l}")),
        (Some(f), None) => Some(f.to_string()),
        (None, Some(l)) => Some(l.to_string()),
        (None, None) => None,
    };
    let email = payer.get("email").and_then(|v| v.as_str());
    let tax_id = payer.pointer("/identification/number").and_then(|v| v.as_str());
    let phone = payer.pointer("/phone/number").and_then(|v| v.as_str());
    MaskedCustomer::from_raw(name.as_deref(), email, tax_id, phone, None)
}

fn parse_rfc3339(v: &Value) -> Option<DateTime<Utc>> {
    v.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()).map(|dt| dt.with_timezone(&Utc))
}
