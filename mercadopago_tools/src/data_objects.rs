use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The subset of a Mercado Pago payment object the gateway cares about. Everything else rides
/// along in handlers via the raw JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MercadoPagoPayment {
    pub id: u64,
    pub status: String,
    #[serde(default)]
    pub status_detail: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub transaction_amount: Option<f64>,
    #[serde(default)]
    pub currency_id: Option<String>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_approved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payer: Option<Payer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Payer {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub identification: Option<PayerIdentification>,
    #[serde(default)]
    pub phone: Option<PayerPhone>,
}

impl Payer {
    /// First and last name joined, or `None` when the provider sent neither.
    pub fn full_name(&self) -> Option<String> {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(f), Some(l)) => Some(format!("{f} {l}")),
            (Some(f), None) => Some(f.to_string()),
            (None, Some(l)) => Some(l.to_string()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayerIdentification {
    #[serde(rename = "type", default)]
    pub id_type: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayerPhone {
    #[serde(default)]
    pub area_code: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
}

impl PayerPhone {
    pub fn formatted(&self) -> Option<String> {
        match (self.area_code.as_deref(), self.number.as_deref()) {
            (Some(area), Some(num)) => Some(format!("{area} {num}")),
            (None, Some(num)) => Some(num.to_string()),
            _ => None,
        }
    }
}

/// Request body for creating a checkout preference.
#[derive(Debug, Clone, Serialize)]
pub struct NewCheckoutPreference {
    pub items: Vec<PreferenceItem>,
    pub payer: PreferencePayer,
    pub external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceItem {
    pub title: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub currency_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferencePayer {
    pub name: String,
    pub email: String,
}

/// A created checkout preference, as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutPreference {
    pub id: String,
    /// The hosted checkout URL customers are sent to.
    pub init_point: String,
    #[serde(default)]
    pub sandbox_init_point: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
}
