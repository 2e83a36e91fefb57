//! Wires the product workflows to the payment event bus.
use astro_payment_engine::{
    db_types::{NewTrigger, NormalizedStatus, TriggerKind, TriggerStatus},
    events::{CheckoutCreatedEvent, EventHandlers, EventHooks, PaymentStatusChangedEvent},
    ScheduleApi,
    SqliteDatabase,
};
use astrocalc_tools::{AstroCalcApi, AutomationApi};
use chrono::Utc;
use futures::future::BoxFuture;
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    jobs::{fulfillment::run_fulfillment_job, retry::RetryPolicy},
};

pub const PRODUCT_EVENT_BUFFER_SIZE: usize = 25;

/// Assigns the product workflow handlers to the payment event bus.
///
/// Only two events carry product behaviour:
///
/// 1. PaymentStatusChangedEvent - A move to APPROVED starts the fulfillment job for the request,
///    and a move to PENDING schedules the payment-reminder trigger. Every other status only
///    updates the stored snapshot and has no workflow attached.
/// 2. CheckoutCreatedEvent - Informational. The checkout is already persisted and attached to its
///    request by the engine, so the handler just leaves an audit line in the log.
pub fn create_product_event_handlers(db: SqliteDatabase, config: &ServerConfig) -> Result<EventHandlers, ServerError> {
    let mut hooks = EventHooks::default();
    let charts = AstroCalcApi::new(config.astrocalc.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not create the AstroCalc client. {e}")))?;
    let automation = AutomationApi::new(config.automation.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not create the automation client. {e}")))?;
    let policy = RetryPolicy::new(config.jobs.max_http_attempts);
    let pending_reminder = config.jobs.pending_reminder;
    // --- On PaymentStatusChanged Handler ---
    hooks.on_status_changed(move |ev| {
        let PaymentStatusChangedEvent { request_id, product_type, status, payment_id, .. } = ev;
        match status {
            NormalizedStatus::Approved => {
                let db = db.clone();
                let charts = charts.clone();
                let automation = automation.clone();
                debug!("⚙️ Payment {payment_id} for request {request_id} is approved. Kicking off fulfillment.");
                Box::pin(async move {
                    let run = run_fulfillment_job(
                        &db,
                        &charts,
                        &automation,
                        policy,
                        request_id,
                        product_type,
                        TriggerStatus::Approved,
                    )
                    .await;
                    match run {
                        Ok(job) => {
                            info!("⚙️ Fulfillment job {} for request {request_id} finished as {}.", job.id, job.status)
                        },
                        Err(e) => error!("⚙️ Could not record a fulfillment job for request {request_id}. {e}"),
                    }
                })
            },
            NormalizedStatus::Pending => {
                let schedules = ScheduleApi::new(db.clone());
                let due_at = Utc::now() + pending_reminder;
                Box::pin(async move {
                    let trigger =
                        NewTrigger { request_id, product_type, kind: TriggerKind::PendingReminder, due_at };
                    match schedules.schedule(trigger).await {
                        Ok(Some(t)) => info!(
                            "🕰️ Payment for request {request_id} is pending. Reminder trigger {} is due at {}.",
                            t.id, t.due_at
                        ),
                        Ok(None) => {
                            debug!("🕰️ Request {request_id} already has a reminder trigger. Not scheduling another.")
                        },
                        Err(e) => error!("🕰️ Could not schedule a reminder trigger for request {request_id}. {e}"),
                    }
                })
            },
            other => {
                debug!("📨️ Payment {payment_id} for request {request_id} moved to {other}. No workflow runs for it.");
                no_op()
            },
        }
    });
    // --- On CheckoutCreated Handler ---
    hooks.on_checkout_created(|ev| {
        let CheckoutCreatedEvent { request_id, provider, checkout_id, link, .. } = ev;
        info!(
            "🛒️ Checkout {checkout_id} created on {provider} for request {request_id}. Payment link: {}",
            link.as_deref().unwrap_or("<none>")
        );
        no_op()
    });
    let handlers = EventHandlers::new(PRODUCT_EVENT_BUFFER_SIZE, hooks);
    Ok(handlers)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
