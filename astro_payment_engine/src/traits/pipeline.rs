use thiserror::Error;

use crate::db_types::{
    CheckoutRecord,
    NewCheckout,
    NewReadingRequest,
    NewWebhookEvent,
    NormalizedStatus,
    PaymentRecord,
    PaymentUpdate,
    ReadingRequest,
    SnapshotChange,
    WebhookEvent,
};

/// The append-only notification log.
///
/// Every inbound webhook is recorded here before anything else happens to it. The store dedupes on
/// `event_uid`; a redelivered notification is a no-op and existing rows are never updated.
#[allow(async_fn_in_trait)]
pub trait EventManagement {
    /// Records a webhook event, insert-or-ignore on `event_uid`.
    ///
    /// Returns the newly inserted row, or `None` if an event with the same uid was already stored.
    async fn record_webhook_event(&self, event: NewWebhookEvent) -> Result<Option<WebhookEvent>, PaymentPipelineError>;

    /// Fetches a stored event by its uid.
    async fn fetch_webhook_event(&self, event_uid: &str) -> Result<Option<WebhookEvent>, PaymentPipelineError>;

    /// All stored events that referenced the given provider payment id, oldest first.
    async fn fetch_events_for_payment(&self, payment_id: &str) -> Result<Vec<WebhookEvent>, PaymentPipelineError>;
}

/// The consolidated per-payment view and the checkout records that link payments to requests.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    /// Merges one provider-asserted payment view into the store.
    ///
    /// Single upsert keyed on `payment_id`. On conflict, every column keeps its old value when the
    /// new one is null, except `status`, `status_detail`, `normalized_status` and `raw`, which
    /// always take the new value. Arrival order between two updates is therefore safe: neither
    /// can erase the other's data, and status always reflects the latest write.
    async fn upsert_payment(
        &self,
        update: &PaymentUpdate,
        normalized_status: NormalizedStatus,
    ) -> Result<PaymentRecord, PaymentPipelineError>;

    async fn fetch_payment(&self, payment_id: &str) -> Result<Option<PaymentRecord>, PaymentPipelineError>;

    /// Stores a checkout created against a provider, insert-or-update on `checkout_id`.
    async fn upsert_checkout(&self, checkout: NewCheckout) -> Result<CheckoutRecord, PaymentPipelineError>;

    async fn fetch_checkout(&self, checkout_id: &str) -> Result<Option<CheckoutRecord>, PaymentPipelineError>;

    /// Refreshes the provider-reported status on a stored checkout. Missing rows are a no-op.
    async fn update_checkout_status(&self, checkout_id: &str, status: &str) -> Result<bool, PaymentPipelineError>;
}

/// Reading requests and their embedded payment snapshot.
///
/// The snapshot columns have exactly one writer: [`RequestManagement::update_snapshot_from_payment`]
/// (plus the checkout seeding at creation time). Product workflows read the snapshot; they never
/// write it.
#[allow(async_fn_in_trait)]
pub trait RequestManagement {
    /// Stores a new reading request with an all-null payment snapshot. Returns the stored row.
    async fn insert_reading_request(&self, request: NewReadingRequest) -> Result<ReadingRequest, PaymentPipelineError>;

    async fn fetch_reading_request(&self, request_id: i64) -> Result<Option<ReadingRequest>, PaymentPipelineError>;

    /// Writes the full payment snapshot for the request this payment belongs to.
    ///
    /// The request is resolved from the payment's `external_reference` when it parses as an
    /// internal id, and otherwise through the checkout record for the payment's `checkout_id`.
    /// Runs in one transaction and reports the previous and new normalized status so the caller
    /// can decide whether a transition happened. Returns `None` when the payment cannot be matched
    /// to any request; the payment row itself stays stored for later reconciliation.
    async fn update_snapshot_from_payment(
        &self,
        payment: &PaymentRecord,
    ) -> Result<Option<SnapshotChange>, PaymentPipelineError>;

    /// Seeds the snapshot's checkout fields (`checkout_id`, `payment_link`, `payment_provider`)
    /// when a checkout is created for the request.
    async fn attach_checkout_to_request(&self, checkout: &CheckoutRecord) -> Result<(), PaymentPipelineError>;
}

/// The full contract a storage backend must meet to drive the webhook flow.
#[allow(async_fn_in_trait)]
pub trait PaymentPipelineDatabase: Clone + EventManagement + PaymentManagement + RequestManagement {
    /// The URL of the database
    fn url(&self) -> &str;
}

#[derive(Debug, Error)]
pub enum PaymentPipelineError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested reading request (id {0}) does not exist")]
    RequestNotFound(i64),
    #[error("The payment {0} does not exist")]
    PaymentNotFound(String),
    #[error("The checkout {0} does not exist")]
    CheckoutNotFound(String),
}

impl From<sqlx::Error> for PaymentPipelineError {
    fn from(e: sqlx::Error) -> Self {
        PaymentPipelineError::DatabaseError(e.to_string())
    }
}
