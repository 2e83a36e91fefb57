//! The SQLite backend. [`SqliteDatabase`] implements every storage trait in [`crate::traits`]
//! by delegating to the free query functions in [`super::db`], adding connection/transaction
//! handling and storage-level logging on top.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{checkouts, db_url, new_pool, product_jobs, provider_payments, requests, schedules, webhook_events};
use crate::{
    db_types::{
        CheckoutRecord,
        JobMetrics,
        NewCheckout,
        NewReadingRequest,
        NewTrigger,
        NewWebhookEvent,
        NormalizedStatus,
        PaymentRecord,
        PaymentUpdate,
        ProductJob,
        ProductType,
        ReadingRequest,
        ScheduledTrigger,
        SnapshotChange,
        TriggerStatus,
        WebhookEvent,
    },
    traits::{
        EventManagement,
        JobApiError,
        JobGate,
        JobManagement,
        PaymentManagement,
        PaymentPipelineDatabase,
        PaymentPipelineError,
        RequestManagement,
        ScheduleApiError,
        ScheduleManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase").field("url", &self.url).finish_non_exhaustive()
    }
}

impl PaymentPipelineDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl EventManagement for SqliteDatabase {
    async fn record_webhook_event(&self, event: NewWebhookEvent) -> Result<Option<WebhookEvent>, PaymentPipelineError> {
        let uid = event.event_uid.clone();
        let mut conn = self.pool.acquire().await?;
        let inserted = webhook_events::idempotent_insert(event, &mut conn).await?;
        match &inserted {
            Some(row) => debug!("🗃️ Webhook event {uid} stored with id {}", row.id),
            None => debug!("🗃️ Webhook event {uid} was already stored. Ignoring the redelivery."),
        }
        Ok(inserted)
    }

    async fn fetch_webhook_event(&self, event_uid: &str) -> Result<Option<WebhookEvent>, PaymentPipelineError> {
        let mut conn = self.pool.acquire().await?;
        webhook_events::fetch_event(event_uid, &mut conn).await
    }

    async fn fetch_events_for_payment(&self, payment_id: &str) -> Result<Vec<WebhookEvent>, PaymentPipelineError> {
        let mut conn = self.pool.acquire().await?;
        webhook_events::fetch_events_for_payment(payment_id, &mut conn).await
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn upsert_payment(
        &self,
        update: &PaymentUpdate,
        normalized_status: NormalizedStatus,
    ) -> Result<PaymentRecord, PaymentPipelineError> {
        let mut tx = self.pool.begin().await?;
        let payment = provider_payments::upsert_payment(update, normalized_status, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Payment {} ({}) merged. Status is now {} / {normalized_status}",
            payment.payment_id, payment.provider, payment.status
        );
        Ok(payment)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<Option<PaymentRecord>, PaymentPipelineError> {
        let mut conn = self.pool.acquire().await?;
        provider_payments::fetch_payment(payment_id, &mut conn).await
    }

    async fn upsert_checkout(&self, checkout: NewCheckout) -> Result<CheckoutRecord, PaymentPipelineError> {
        let mut tx = self.pool.begin().await?;
        let record = checkouts::upsert_checkout(checkout, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Checkout {} stored for reading request {}", record.checkout_id, record.request_id);
        Ok(record)
    }

    async fn fetch_checkout(&self, checkout_id: &str) -> Result<Option<CheckoutRecord>, PaymentPipelineError> {
        let mut conn = self.pool.acquire().await?;
        checkouts::fetch_checkout(checkout_id, &mut conn).await
    }

    async fn update_checkout_status(&self, checkout_id: &str, status: &str) -> Result<bool, PaymentPipelineError> {
        let mut conn = self.pool.acquire().await?;
        let updated = checkouts::update_checkout_status(checkout_id, status, &mut conn).await?;
        if updated {
            debug!("🗃️ Checkout {checkout_id} status set to {status}");
        }
        Ok(updated)
    }
}

impl RequestManagement for SqliteDatabase {
    async fn insert_reading_request(&self, request: NewReadingRequest) -> Result<ReadingRequest, PaymentPipelineError> {
        let mut tx = self.pool.begin().await?;
        let record = requests::insert_request(request, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Reading request #{} ({}) has been saved in the DB", record.id, record.product_type);
        Ok(record)
    }

    async fn fetch_reading_request(&self, request_id: i64) -> Result<Option<ReadingRequest>, PaymentPipelineError> {
        let mut conn = self.pool.acquire().await?;
        requests::fetch_request(request_id, &mut conn).await
    }

    /// Resolves the owning request and rewrites its payment snapshot in a single atomic
    /// transaction, so the old-status read and the snapshot write cannot interleave with a
    /// concurrent update for the same request.
    async fn update_snapshot_from_payment(
        &self,
        payment: &PaymentRecord,
    ) -> Result<Option<SnapshotChange>, PaymentPipelineError> {
        let mut tx = self.pool.begin().await?;
        let change = requests::update_snapshot_from_payment(payment, &mut tx).await?;
        tx.commit().await?;
        if let Some(change) = &change {
            debug!(
                "🗃️ Snapshot for reading request #{} updated: {:?} -> {}",
                change.request_id, change.old_status, change.new_status
            );
        }
        Ok(change)
    }

    async fn attach_checkout_to_request(&self, checkout: &CheckoutRecord) -> Result<(), PaymentPipelineError> {
        let mut tx = self.pool.begin().await?;
        requests::attach_checkout_to_request(checkout, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Checkout {} attached to reading request #{}", checkout.checkout_id, checkout.request_id);
        Ok(())
    }
}

impl JobManagement for SqliteDatabase {
    async fn begin_product_job(
        &self,
        request_id: i64,
        product_type: ProductType,
        trigger_status: TriggerStatus,
    ) -> Result<JobGate, JobApiError> {
        let mut tx = self.pool.begin().await?;
        let gate = product_jobs::begin_job(request_id, product_type, trigger_status, &mut tx).await?;
        tx.commit().await?;
        match &gate {
            JobGate::AlreadySucceeded(job) => {
                debug!(
                    "🗃️ Job for request #{request_id} {product_type}/{trigger_status} already succeeded (id {}). \
                     Nothing to do.",
                    job.id
                );
            },
            JobGate::Started(job) => {
                debug!(
                    "🗃️ Job {} started for request #{request_id} {product_type}/{trigger_status}, attempt {}",
                    job.id, job.attempt
                );
            },
        }
        Ok(gate)
    }

    async fn complete_product_job(&self, job_id: i64, metrics: JobMetrics) -> Result<ProductJob, JobApiError> {
        let mut tx = self.pool.begin().await?;
        let job = product_jobs::complete_job(job_id, metrics, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Job {job_id} marked SUCCEEDED");
        Ok(job)
    }

    async fn fail_product_job(&self, job_id: i64, error: &str, metrics: JobMetrics) -> Result<ProductJob, JobApiError> {
        let mut tx = self.pool.begin().await?;
        let job = product_jobs::fail_job(job_id, error, metrics, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Job {job_id} marked FAILED: {error}");
        Ok(job)
    }

    async fn fetch_jobs_for_request(&self, request_id: i64) -> Result<Vec<ProductJob>, JobApiError> {
        let mut conn = self.pool.acquire().await?;
        product_jobs::fetch_jobs_for_request(request_id, &mut conn).await
    }
}

impl ScheduleManagement for SqliteDatabase {
    async fn schedule_trigger(&self, trigger: NewTrigger) -> Result<Option<ScheduledTrigger>, ScheduleApiError> {
        let request_id = trigger.request_id;
        let kind = trigger.kind;
        let mut conn = self.pool.acquire().await?;
        let inserted = schedules::idempotent_insert(trigger, &mut conn).await?;
        match &inserted {
            Some(row) => debug!("🗃️ Trigger {kind} scheduled for request #{request_id}, due {}", row.due_at),
            None => debug!("🗃️ Trigger {kind} for request #{request_id} already exists. Not re-scheduling."),
        }
        Ok(inserted)
    }

    async fn claim_due_triggers(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ScheduledTrigger>, ScheduleApiError> {
        let mut conn = self.pool.acquire().await?;
        schedules::fetch_due_triggers(now, limit, &mut conn).await
    }

    async fn mark_trigger_fired(&self, trigger_id: i64) -> Result<bool, ScheduleApiError> {
        let mut conn = self.pool.acquire().await?;
        let updated = schedules::mark_fired(trigger_id, &mut conn).await?;
        debug!("🗃️ Trigger {trigger_id} fired: {updated}");
        Ok(updated)
    }

    async fn cancel_trigger(&self, trigger_id: i64) -> Result<bool, ScheduleApiError> {
        let mut conn = self.pool.acquire().await?;
        let updated = schedules::mark_canceled(trigger_id, &mut conn).await?;
        debug!("🗃️ Trigger {trigger_id} canceled: {updated}");
        Ok(updated)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, connecting to the database at the URL given in the
    /// `APG_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Applies any embedded migrations that have not yet run against this database. The server
    /// calls this before accepting traffic; the uniqueness constraints the pipeline relies on are
    /// created here.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await.map_err(|e| sqlx::Error::Migrate(Box::new(e)))
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
