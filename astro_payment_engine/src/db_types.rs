use std::{fmt::Display, str::FromStr};

use apg_common::{mask_digits, mask_email, mask_name, MoneyMinor};
use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConversionError(pub String);

//--------------------------------------   PaymentProvider   ---------------------------------------------------------
/// The payment providers the gateway accepts webhooks from. The provider tag is part of every
/// stored event uid and payment row, so renaming a variant is a schema migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    MercadoPago,
    Stripe,
}

impl PaymentProvider {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::MercadoPago => "mercadopago",
            Self::Stripe => "stripe",
        }
    }
}

impl Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl FromStr for PaymentProvider {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mercadopago" => Ok(Self::MercadoPago),
            "stripe" => Ok(Self::Stripe),
            s => Err(ConversionError(format!("Unknown payment provider: {s}"))),
        }
    }
}

//--------------------------------------   NormalizedStatus   --------------------------------------------------------
/// The provider-agnostic payment lifecycle status. Every provider vocabulary collapses onto this
/// enum; [`NormalizedStatus::Updated`] is the fallback for statuses the mapping tables do not
/// recognise, so an unknown provider status degrades into bookkeeping noise instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NormalizedStatus {
    /// Payment confirmed; fulfilment may proceed.
    Approved,
    /// Payment initiated but not yet confirmed.
    Pending,
    /// The provider declined the payment.
    Rejected,
    /// The payment was cancelled before completion.
    Canceled,
    /// A previously approved payment was returned to the customer.
    Refunded,
    /// The customer disputed the payment with their issuer.
    ChargedBack,
    /// The payment attempt lapsed without completing.
    Expired,
    /// Catch-all for informational updates and unknown provider statuses.
    Updated,
}

impl NormalizedStatus {
    /// True for statuses where the customer may still complete the payment.
    pub fn is_pending_like(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl Display for NormalizedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Approved => "APPROVED",
            Self::Pending => "PENDING",
            Self::Rejected => "REJECTED",
            Self::Canceled => "CANCELED",
            Self::Refunded => "REFUNDED",
            Self::ChargedBack => "CHARGED_BACK",
            Self::Expired => "EXPIRED",
            Self::Updated => "UPDATED",
        };
        f.write_str(s)
    }
}

impl FromStr for NormalizedStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(Self::Approved),
            "PENDING" => Ok(Self::Pending),
            "REJECTED" => Ok(Self::Rejected),
            "CANCELED" => Ok(Self::Canceled),
            "REFUNDED" => Ok(Self::Refunded),
            "CHARGED_BACK" => Ok(Self::ChargedBack),
            "EXPIRED" => Ok(Self::Expired),
            "UPDATED" => Ok(Self::Updated),
            s => Err(ConversionError(format!("Invalid normalized status: {s}"))),
        }
    }
}

impl From<String> for NormalizedStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid normalized status: {value}. But this conversion cannot fail. Defaulting to Updated");
            NormalizedStatus::Updated
        })
    }
}

//--------------------------------------     ProductType      --------------------------------------------------------
/// The readings customers can purchase. Each product has its own fulfilment workflow wired onto
/// the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    BirthChart,
    RelationshipReading,
}

impl Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BirthChart => "BIRTH_CHART",
            Self::RelationshipReading => "RELATIONSHIP_READING",
        };
        f.write_str(s)
    }
}

impl FromStr for ProductType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BIRTH_CHART" => Ok(Self::BirthChart),
            "RELATIONSHIP_READING" => Ok(Self::RelationshipReading),
            s => Err(ConversionError(format!("Unknown product type: {s}"))),
        }
    }
}

//--------------------------------------      JobStatus       --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

//--------------------------------------    TriggerStatus     --------------------------------------------------------
/// The normalized-status condition a product job fires on. `Pending10m` is the delayed reminder
/// trigger rather than an immediate status reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TriggerStatus {
    #[sqlx(rename = "APPROVED")]
    #[serde(rename = "APPROVED")]
    Approved,
    #[sqlx(rename = "PENDING_10M")]
    #[serde(rename = "PENDING_10M")]
    Pending10m,
}

impl Display for TriggerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Approved => "APPROVED",
            Self::Pending10m => "PENDING_10M",
        };
        f.write_str(s)
    }
}

impl FromStr for TriggerStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(Self::Approved),
            "PENDING_10M" => Ok(Self::Pending10m),
            s => Err(ConversionError(format!("Unknown trigger status: {s}"))),
        }
    }
}

//--------------------------------------     TriggerKind      --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TriggerKind {
    #[sqlx(rename = "PENDING_REMINDER")]
    #[serde(rename = "PENDING_REMINDER")]
    PendingReminder,
}

impl Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingReminder => f.write_str("PENDING_REMINDER"),
        }
    }
}

impl FromStr for TriggerKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_REMINDER" => Ok(Self::PendingReminder),
            s => Err(ConversionError(format!("Unknown trigger kind: {s}"))),
        }
    }
}

//--------------------------------------     TriggerState     --------------------------------------------------------
/// Scheduled trigger lifecycle. Transitions are monotonic: pending rows move to fired or canceled
/// exactly once and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TriggerState {
    Pending,
    Fired,
    Canceled,
}

impl Display for TriggerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Fired => "fired",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

//--------------------------------------    MaskedCustomer    --------------------------------------------------------
/// The customer fields we keep on a payment record. Always constructed through
/// [`MaskedCustomer::from_raw`] so raw PII never reaches a column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedCustomer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl MaskedCustomer {
    pub fn from_raw(
        name: Option<&str>,
        email: Option<&str>,
        tax_id: Option<&str>,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> Self {
        Self {
            name: name.map(mask_name),
            email: email.map(mask_email),
            tax_id: tax_id.map(mask_digits),
            phone: phone.map(mask_digits),
            address: address.map(mask_digits),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() &&
            self.email.is_none() &&
            self.tax_id.is_none() &&
            self.phone.is_none() &&
            self.address.is_none()
    }
}

//--------------------------------------    WebhookEvent      --------------------------------------------------------
/// A notification exactly as it arrived, post-sanitisation. Append-only; rows are never updated.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookEvent {
    pub id: i64,
    pub event_uid: String,
    pub provider: PaymentProvider,
    pub topic: Option<String>,
    pub action: Option<String>,
    pub payment_id: Option<String>,
    pub checkout_id: Option<String>,
    /// Sanitised request headers, as a JSON object string.
    pub headers: String,
    /// Sanitised query parameters, as a JSON object string.
    pub query: String,
    /// Sanitised body, as a JSON string.
    pub body: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub event_uid: String,
    pub provider: PaymentProvider,
    pub topic: Option<String>,
    pub action: Option<String>,
    pub payment_id: Option<String>,
    pub checkout_id: Option<String>,
    pub headers: Value,
    pub query: Value,
    pub body: Value,
    pub received_at: DateTime<Utc>,
}

impl NewWebhookEvent {
    pub fn new(event_uid: String, provider: PaymentProvider) -> Self {
        Self {
            event_uid,
            provider,
            topic: None,
            action: None,
            payment_id: None,
            checkout_id: None,
            headers: Value::Null,
            query: Value::Null,
            body: Value::Null,
            received_at: Utc::now(),
        }
    }
}

//--------------------------------------    PaymentRecord     --------------------------------------------------------
/// The consolidated latest-known state of one provider-side payment. One row per provider payment
/// id; concurrent upserts merge per column.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRecord {
    pub id: i64,
    pub payment_id: String,
    pub provider: PaymentProvider,
    pub checkout_id: Option<String>,
    /// The status string in the provider's own vocabulary.
    pub status: String,
    pub status_detail: Option<String>,
    pub normalized_status: NormalizedStatus,
    /// The business request id, as reported by the provider's external-reference field.
    pub external_reference: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_tax_id: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub amount: Option<MoneyMinor>,
    pub currency: Option<String>,
    pub provider_created_at: Option<DateTime<Utc>>,
    pub authorized_at: Option<DateTime<Utc>>,
    /// Sanitised provider payment object, as a JSON string.
    pub raw: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One provider-asserted view of a payment, already sanitised and masked, ready to merge into the
/// payment store.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub payment_id: String,
    pub provider: PaymentProvider,
    pub checkout_id: Option<String>,
    pub status: String,
    pub status_detail: Option<String>,
    pub external_reference: Option<String>,
    pub customer: MaskedCustomer,
    pub amount: Option<MoneyMinor>,
    pub currency: Option<String>,
    pub provider_created_at: Option<DateTime<Utc>>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub raw: Value,
}

impl PaymentUpdate {
    pub fn new<S1: Into<String>, S2: Into<String>>(payment_id: S1, provider: PaymentProvider, status: S2) -> Self {
        Self {
            payment_id: payment_id.into(),
            provider,
            checkout_id: None,
            status: status.into(),
            status_detail: None,
            external_reference: None,
            customer: MaskedCustomer::default(),
            amount: None,
            currency: None,
            provider_created_at: None,
            authorized_at: None,
            raw: Value::Null,
        }
    }
}

//--------------------------------------   CheckoutRecord     --------------------------------------------------------
/// One checkout attempt created against a provider. Links provider-side checkout ids back to the
/// reading request for webhooks that omit the external reference.
#[derive(Debug, Clone, FromRow)]
pub struct CheckoutRecord {
    pub id: i64,
    pub checkout_id: String,
    pub request_id: i64,
    pub provider: PaymentProvider,
    pub status: String,
    pub link: Option<String>,
    /// Sanitised customer subset, as a JSON string.
    pub customer: String,
    /// Sanitised provider checkout object, as a JSON string.
    pub raw: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCheckout {
    pub checkout_id: String,
    pub request_id: i64,
    pub provider: PaymentProvider,
    pub status: String,
    pub link: Option<String>,
    pub customer: Value,
    pub raw: Value,
}

//--------------------------------------   ReadingRequest     --------------------------------------------------------
/// A customer's order for a reading, including the embedded payment snapshot. The snapshot columns
/// (`payment_*`, `checkout_id`, `authorized_at`) are written only by the snapshot orchestrator.
#[derive(Debug, Clone, FromRow)]
pub struct ReadingRequest {
    pub id: i64,
    pub product_type: ProductType,
    pub customer_name: String,
    pub customer_email: String,
    pub birth_date: String,
    pub birth_time: String,
    pub birth_place: String,
    pub latitude: f64,
    pub longitude: f64,
    pub utc_offset_hours: f64,
    pub partner_name: Option<String>,
    pub partner_birth_date: Option<String>,
    pub partner_birth_time: Option<String>,
    pub partner_birth_place: Option<String>,
    pub partner_latitude: Option<f64>,
    pub partner_longitude: Option<f64>,
    pub payment_provider: Option<PaymentProvider>,
    pub payment_status: Option<NormalizedStatus>,
    pub payment_status_detail: Option<String>,
    pub payment_amount: Option<MoneyMinor>,
    pub payment_currency: Option<String>,
    pub checkout_id: Option<String>,
    pub payment_id: Option<String>,
    pub payment_link: Option<String>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub payment_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReadingRequest {
    pub product_type: ProductType,
    pub customer_name: String,
    pub customer_email: String,
    pub birth_date: String,
    pub birth_time: String,
    pub birth_place: String,
    pub latitude: f64,
    pub longitude: f64,
    pub utc_offset_hours: f64,
    #[serde(default)]
    pub partner_name: Option<String>,
    #[serde(default)]
    pub partner_birth_date: Option<String>,
    #[serde(default)]
    pub partner_birth_time: Option<String>,
    #[serde(default)]
    pub partner_birth_place: Option<String>,
    #[serde(default)]
    pub partner_latitude: Option<f64>,
    #[serde(default)]
    pub partner_longitude: Option<f64>,
}

//--------------------------------------   SnapshotChange     --------------------------------------------------------
/// The result of one snapshot write: which request changed and how its normalized status moved.
/// `old_status == new_status` means the write refreshed bookkeeping without a transition.
#[derive(Debug, Clone)]
pub struct SnapshotChange {
    pub request_id: i64,
    pub product_type: ProductType,
    pub provider: PaymentProvider,
    pub old_status: Option<NormalizedStatus>,
    pub new_status: NormalizedStatus,
    pub status_detail: Option<String>,
    pub amount: Option<MoneyMinor>,
    pub currency: Option<String>,
    pub checkout_id: Option<String>,
    pub payment_id: String,
    pub authorized_at: Option<DateTime<Utc>>,
}

impl SnapshotChange {
    pub fn is_transition(&self) -> bool {
        self.old_status != Some(self.new_status)
    }
}

//--------------------------------------     ProductJob       --------------------------------------------------------
/// One attempt at a product workflow. The partial unique index on SUCCEEDED rows is the durable
/// idempotency gate for the `(request_id, product_type, trigger_status)` triple.
#[derive(Debug, Clone, FromRow)]
pub struct ProductJob {
    pub id: i64,
    pub request_id: i64,
    pub product_type: ProductType,
    pub trigger_status: TriggerStatus,
    pub status: JobStatus,
    pub attempt: i64,
    pub enrichment_http_status: Option<i64>,
    pub enrichment_attempts: Option<i64>,
    pub enrichment_ms: Option<i64>,
    pub delivery_http_status: Option<i64>,
    pub delivery_attempts: Option<i64>,
    pub delivery_ms: Option<i64>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Call statistics recorded against a terminal job row.
#[derive(Debug, Clone, Default)]
pub struct JobMetrics {
    pub enrichment_http_status: Option<i64>,
    pub enrichment_attempts: Option<i64>,
    pub enrichment_ms: Option<i64>,
    pub delivery_http_status: Option<i64>,
    pub delivery_attempts: Option<i64>,
    pub delivery_ms: Option<i64>,
}

//--------------------------------------  ScheduledTrigger    --------------------------------------------------------
/// A delayed follow-up. `product_type` and `kind` are kept as raw text so that rows written by a
/// newer deployment can be cancelled defensively instead of failing to decode.
#[derive(Debug, Clone, FromRow)]
pub struct ScheduledTrigger {
    pub id: i64,
    pub request_id: i64,
    pub product_type: String,
    pub kind: String,
    pub due_at: DateTime<Utc>,
    pub state: TriggerState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTrigger {
    pub request_id: i64,
    pub product_type: ProductType,
    pub kind: TriggerKind,
    pub due_at: DateTime<Utc>,
}
