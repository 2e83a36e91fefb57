//! The pending-payment reminder. Fired by the trigger scheduler when a checkout has sat in
//! PENDING for the configured grace period, it posts a small nudge payload to the automation
//! webhook under the same idempotency gate, retry policy and metrics bookkeeping as fulfillment.
use astro_payment_engine::{
    db_types::{JobMetrics, ProductJob, ProductType, TriggerStatus},
    traits::{JobApiError, JobManagement, RequestManagement},
    ProductJobApi,
};
use astrocalc_tools::{AutomationApi, ReminderPayload};
use log::*;

use crate::jobs::retry::{call_with_retry, RetryPolicy};

/// Runs the reminder unit for a request. The gate is keyed on the PENDING_10M trigger, so a
/// request nudged once is never nudged again, however many times its trigger is replayed.
pub async fn run_reminder_job<B>(
    db: &B,
    automation: &AutomationApi,
    policy: RetryPolicy,
    request_id: i64,
    product_type: ProductType,
) -> Result<ProductJob, JobApiError>
where
    B: JobManagement + RequestManagement + Clone,
{
    let jobs = ProductJobApi::new(db.clone());
    let gate = jobs.start(request_id, product_type, TriggerStatus::Pending10m).await?;
    if gate.already_done() {
        debug!("⚙️ Request {request_id} was already reminded by job {}. Nothing to do.", gate.job().id);
        return Ok(gate.job().clone());
    }
    let job_id = gate.job().id;
    info!("⚙️ Starting reminder job {job_id} for request {request_id} (attempt {})", gate.job().attempt);
    let mut metrics = JobMetrics::default();

    let request = match db.fetch_reading_request(request_id).await {
        Ok(Some(r)) => r,
        Ok(None) => {
            warn!("⚙️ Reminder job {job_id} aborted. Reading request {request_id} does not exist.");
            return jobs.fail(job_id, &format!("Reading request {request_id} does not exist"), metrics).await;
        },
        Err(e) => {
            warn!("⚙️ Reminder job {job_id} aborted. Could not load reading request {request_id}. {e}");
            return jobs.fail(job_id, &format!("Could not load reading request {request_id}: {e}"), metrics).await;
        },
    };

    if !automation.is_configured() {
        warn!("⚙️ Reminder job {job_id} cannot run. The automation webhook URL is not configured.");
        let reason = "Automation webhook is not configured. Set APG_AUTOMATION_WEBHOOK_URL to enable reminders.";
        return jobs.fail(job_id, reason, metrics).await;
    }

    let payload = ReminderPayload::new(
        request.id,
        request.product_type.to_string(),
        request.customer_name.clone(),
        request.customer_email.clone(),
        request.payment_link.clone(),
    );
    let outcome = call_with_retry(policy, || automation.remind(&payload)).await;
    metrics.delivery_attempts = Some(i64::from(outcome.attempts));
    metrics.delivery_ms = Some(outcome.elapsed_ms);
    match outcome.result {
        Ok(status) => {
            metrics.delivery_http_status = Some(i64::from(status));
            info!("⚙️ Reminder job {job_id} for request {request_id} delivered. Automation replied {status}.");
            jobs.complete(job_id, metrics).await
        },
        Err(e) => {
            metrics.delivery_http_status = e.status().map(i64::from);
            warn!("⚙️ Reminder job {job_id} failed during delivery after {} attempts. {e}", outcome.attempts);
            jobs.fail(job_id, &format!("Reminder delivery failed: {e}"), metrics).await
        },
    }
}
