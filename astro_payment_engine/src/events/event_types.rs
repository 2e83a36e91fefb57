use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{
    MaskedCustomer,
    NormalizedStatus,
    PaymentProvider,
    ProductType,
    SnapshotChange,
};
use apg_common::MoneyMinor;

/// Announcement that a reading request's normalized payment status changed. Published by the
/// payment flow exactly once per transition, after the snapshot write committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatusChangedEvent {
    pub request_id: i64,
    pub product_type: ProductType,
    pub provider: PaymentProvider,
    pub status: NormalizedStatus,
    pub status_detail: Option<String>,
    pub amount: Option<MoneyMinor>,
    pub currency: Option<String>,
    pub checkout_id: Option<String>,
    pub payment_id: String,
    pub authorized_at: Option<DateTime<Utc>>,
}

impl From<SnapshotChange> for PaymentStatusChangedEvent {
    fn from(change: SnapshotChange) -> Self {
        Self {
            request_id: change.request_id,
            product_type: change.product_type,
            provider: change.provider,
            status: change.new_status,
            status_detail: change.status_detail,
            amount: change.amount,
            currency: change.currency,
            checkout_id: change.checkout_id,
            payment_id: change.payment_id,
            authorized_at: change.authorized_at,
        }
    }
}

/// Announcement that a checkout was created for a request. Informational; fulfilment never hangs
/// off this event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutCreatedEvent {
    pub request_id: i64,
    pub product_type: ProductType,
    pub provider: PaymentProvider,
    pub checkout_id: String,
    pub link: Option<String>,
    pub customer: MaskedCustomer,
}
