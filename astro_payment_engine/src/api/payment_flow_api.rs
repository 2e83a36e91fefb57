use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{
        CheckoutRecord,
        MaskedCustomer,
        NewCheckout,
        NewReadingRequest,
        NewWebhookEvent,
        PaymentRecord,
        PaymentUpdate,
        ReadingRequest,
        SnapshotChange,
        WebhookEvent,
    },
    events::{CheckoutCreatedEvent, EventProducers, PaymentStatusChangedEvent},
    normalize::normalize_status,
    traits::{PaymentPipelineDatabase, PaymentPipelineError},
};

/// The outcome of recording an inbound webhook notification.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// First delivery. The stored row is returned and processing should continue.
    Recorded(WebhookEvent),
    /// The event uid was seen before. The notification must be acknowledged and dropped.
    Duplicate,
}

impl IngestOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestOutcome::Duplicate)
    }
}

/// `PaymentFlowApi` is the primary API for handling payment webhook flows: recording the raw
/// notification, merging provider assertions into the payment store, updating the reading request
/// snapshot, and announcing status transitions on the event bus.
pub struct PaymentFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> PaymentFlowApi<B>
where B: PaymentPipelineDatabase
{
    /// Records an inbound notification in the event store.
    ///
    /// Dedupe happens here and only here: a redelivered event uid returns
    /// [`IngestOutcome::Duplicate`] and the caller must go no further with the notification.
    pub async fn ingest_notification(&self, event: NewWebhookEvent) -> Result<IngestOutcome, PaymentPipelineError> {
        let uid = event.event_uid.clone();
        match self.db.record_webhook_event(event).await? {
            Some(row) => {
                trace!("🔄️📨️ Webhook event {uid} recorded");
                Ok(IngestOutcome::Recorded(row))
            },
            None => {
                debug!("🔄️📨️ Webhook event {uid} is a redelivery. Skipping processing.");
                Ok(IngestOutcome::Duplicate)
            },
        }
    }

    /// Merges one provider-asserted payment view into the store and propagates it to the owning
    /// reading request's snapshot.
    ///
    /// The provider status is normalized here, so callers hand over the raw vocabulary. If the
    /// snapshot write moves the normalized status to a new value, a
    /// [`PaymentStatusChangedEvent`] is published; a write that merely refreshes bookkeeping
    /// stays silent. Returns the snapshot change, or `None` when the payment could not be matched
    /// to any request.
    pub async fn apply_payment_update(
        &self,
        update: PaymentUpdate,
    ) -> Result<Option<SnapshotChange>, PaymentPipelineError> {
        let normalized = normalize_status(update.provider, &update.status);
        let payment = self.db.upsert_payment(&update, normalized).await?;
        let change = self.db.update_snapshot_from_payment(&payment).await?;
        match &change {
            Some(change) if change.is_transition() => {
                debug!(
                    "🔄️💳️ Payment {} moved request #{} from {:?} to {}",
                    payment.payment_id, change.request_id, change.old_status, change.new_status
                );
                self.call_status_changed_hook(change.clone()).await;
            },
            Some(change) => {
                trace!(
                    "🔄️💳️ Payment {} refreshed request #{} without a status transition ({})",
                    payment.payment_id,
                    change.request_id,
                    change.new_status
                );
            },
            None => {
                info!(
                    "🔄️💳️ Payment {} is not linked to any reading request yet. The record is stored and will be \
                     reconciled when a reference arrives.",
                    payment.payment_id
                );
            },
        }
        Ok(change)
    }

    /// Stores a checkout created against a provider and seeds the owning request's snapshot with
    /// the checkout id and payment link.
    pub async fn process_new_checkout(&self, checkout: NewCheckout) -> Result<CheckoutRecord, PaymentPipelineError> {
        let record = self.db.upsert_checkout(checkout).await?;
        self.db.attach_checkout_to_request(&record).await?;
        let request = self
            .db
            .fetch_reading_request(record.request_id)
            .await?
            .ok_or(PaymentPipelineError::RequestNotFound(record.request_id))?;
        debug!("🔄️🛒️ Checkout {} created for reading request #{}", record.checkout_id, record.request_id);
        let event = CheckoutCreatedEvent {
            request_id: record.request_id,
            product_type: request.product_type,
            provider: record.provider,
            checkout_id: record.checkout_id.clone(),
            link: record.link.clone(),
            customer: MaskedCustomer::from_raw(
                Some(request.customer_name.as_str()),
                Some(request.customer_email.as_str()),
                None,
                None,
                None,
            ),
        };
        self.call_checkout_created_hook(event).await;
        Ok(record)
    }

    pub async fn insert_reading_request(&self, request: NewReadingRequest) -> Result<ReadingRequest, PaymentPipelineError> {
        let record = self.db.insert_reading_request(request).await?;
        debug!("🔄️🔭️ Reading request #{} ({}) accepted", record.id, record.product_type);
        Ok(record)
    }

    pub async fn fetch_reading_request(&self, request_id: i64) -> Result<Option<ReadingRequest>, PaymentPipelineError> {
        self.db.fetch_reading_request(request_id).await
    }

    pub async fn fetch_payment(&self, payment_id: &str) -> Result<Option<PaymentRecord>, PaymentPipelineError> {
        self.db.fetch_payment(payment_id).await
    }

    pub async fn fetch_webhook_event(&self, event_uid: &str) -> Result<Option<WebhookEvent>, PaymentPipelineError> {
        self.db.fetch_webhook_event(event_uid).await
    }

    async fn call_status_changed_hook(&self, change: SnapshotChange) {
        for emitter in &self.producers.status_changed_producer {
            debug!("🔄️💳️ Notifying status changed hook subscribers");
            let event = PaymentStatusChangedEvent::from(change.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_checkout_created_hook(&self, event: CheckoutCreatedEvent) {
        for emitter in &self.producers.checkout_created_producer {
            debug!("🔄️🛒️ Notifying checkout created hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }
}
