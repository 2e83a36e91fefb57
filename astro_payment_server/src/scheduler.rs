//! The delayed-trigger scheduler: one background loop that polls the trigger table and runs the
//! work that was deferred at event time. Claiming does not lock rows, so a row that cannot be
//! resolved this cycle is simply claimed again on the next one; the job gate and the
//! `state = 'pending'` transition guards keep double processing harmless.
use astro_payment_engine::{
    db_types::{ProductType, ScheduledTrigger, TriggerKind},
    traits::RequestManagement,
    ScheduleApi,
    SqliteDatabase,
};
use astrocalc_tools::AutomationApi;
use chrono::Utc;
use log::*;
use rand::{thread_rng, Rng};
use tokio::task::JoinHandle;

use crate::{
    config::SchedulerConfig,
    jobs::{retry::RetryPolicy, run_reminder_job},
};

/// Starts the trigger scheduler. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_trigger_scheduler(
    db: SqliteDatabase,
    automation: AutomationApi,
    policy: RetryPolicy,
    config: SchedulerConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let schedules = ScheduleApi::new(db.clone());
        info!(
            "🕰️ Trigger scheduler started. Polling every {}s, claiming up to {} due triggers per cycle.",
            config.poll_interval.num_seconds(),
            config.claim_limit
        );
        loop {
            tokio::time::sleep(jittered(config.poll_interval)).await;
            let due = match schedules.claim_due(Utc::now(), config.claim_limit).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!("🕰️ Could not claim due triggers. {e}");
                    continue;
                },
            };
            if due.is_empty() {
                trace!("🕰️ No triggers are due.");
                continue;
            }
            info!("🕰️ {} trigger(s) are due.", due.len());
            for trigger in due {
                process_trigger(&db, &schedules, &automation, policy, trigger).await;
            }
        }
    })
}

/// The poll interval with ±10% random jitter, so several deployments never thunder in unison.
fn jittered(interval: chrono::Duration) -> std::time::Duration {
    let base = interval.num_milliseconds().max(1) as f64;
    let factor = thread_rng().gen_range(0.9..=1.1);
    std::time::Duration::from_millis((base * factor) as u64)
}

/// Resolves one claimed trigger. Rows this deployment cannot understand or that are no longer
/// applicable are canceled rather than left to clog every future cycle; only infrastructure
/// errors leave a row pending for a retry.
async fn process_trigger(
    db: &SqliteDatabase,
    schedules: &ScheduleApi<SqliteDatabase>,
    automation: &AutomationApi,
    policy: RetryPolicy,
    trigger: ScheduledTrigger,
) {
    let trigger_id = trigger.id;
    let request_id = trigger.request_id;
    let Ok(product_type) = trigger.product_type.parse::<ProductType>() else {
        let reason = format!("Its product type '{}' is not recognized by this deployment.", trigger.product_type);
        return cancel_trigger(schedules, trigger_id, &reason).await;
    };
    let Ok(kind) = trigger.kind.parse::<TriggerKind>() else {
        let reason = format!("Its kind '{}' is not recognized by this deployment.", trigger.kind);
        return cancel_trigger(schedules, trigger_id, &reason).await;
    };
    if !automation.is_configured() {
        return cancel_trigger(schedules, trigger_id, "The automation webhook URL is not configured.").await;
    }
    let snapshot = match db.fetch_reading_request(request_id).await {
        Ok(s) => s,
        Err(e) => {
            error!("🕰️ Could not load request {request_id} for trigger {trigger_id}. It stays pending. {e}");
            return;
        },
    };
    let Some(request) = snapshot else {
        return cancel_trigger(schedules, trigger_id, &format!("Reading request {request_id} does not exist.")).await;
    };
    if !request.payment_status.map(|s| s.is_pending_like()).unwrap_or(false) {
        let status = request.payment_status.map(|s| s.to_string()).unwrap_or_else(|| "<none>".to_string());
        let reason = format!("The payment snapshot for request {request_id} is {status}, not pending.");
        return cancel_trigger(schedules, trigger_id, &reason).await;
    }
    match kind {
        TriggerKind::PendingReminder => match run_reminder_job(db, automation, policy, request_id, product_type).await {
            Ok(job) => {
                debug!("🕰️ Reminder job {} for request {request_id} finished as {}.", job.id, job.status);
                match schedules.fire(trigger_id).await {
                    Ok(true) => info!("🕰️ Trigger {trigger_id} fired."),
                    Ok(false) => debug!("🕰️ Trigger {trigger_id} was already resolved elsewhere."),
                    Err(e) => error!("🕰️ Could not mark trigger {trigger_id} fired. {e}"),
                }
            },
            Err(e) => {
                error!("🕰️ Reminder job for request {request_id} could not be recorded. Trigger {trigger_id} stays pending. {e}")
            },
        },
    }
}

async fn cancel_trigger(schedules: &ScheduleApi<SqliteDatabase>, trigger_id: i64, reason: &str) {
    warn!("🕰️ Canceling trigger {trigger_id}. {reason}");
    match schedules.cancel(trigger_id).await {
        Ok(true) => {},
        Ok(false) => debug!("🕰️ Trigger {trigger_id} was already resolved elsewhere."),
        Err(e) => error!("🕰️ Could not cancel trigger {trigger_id}. {e}"),
    }
}
