use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{NewTrigger, ScheduledTrigger};

/// Delayed trigger storage. States only ever move pending→fired or pending→canceled.
#[allow(async_fn_in_trait)]
pub trait ScheduleManagement {
    /// Schedules a trigger, insert-or-ignore on `(request_id, product_type, kind)`.
    /// Returns `None` when a trigger for the triple already exists, whatever its state.
    async fn schedule_trigger(&self, trigger: NewTrigger) -> Result<Option<ScheduledTrigger>, ScheduleApiError>;

    /// Up to `limit` pending rows whose `due_at` has passed, oldest due first.
    async fn claim_due_triggers(&self, now: DateTime<Utc>, limit: i64)
        -> Result<Vec<ScheduledTrigger>, ScheduleApiError>;

    /// pending → fired. Returns false if the row was not pending (already terminal).
    async fn mark_trigger_fired(&self, trigger_id: i64) -> Result<bool, ScheduleApiError>;

    /// pending → canceled. Returns false if the row was not pending (already terminal).
    async fn cancel_trigger(&self, trigger_id: i64) -> Result<bool, ScheduleApiError>;
}

#[derive(Debug, Error)]
pub enum ScheduleApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The scheduled trigger (id {0}) does not exist")]
    TriggerNotFound(i64),
}

impl From<sqlx::Error> for ScheduleApiError {
    fn from(e: sqlx::Error) -> Self {
        ScheduleApiError::DatabaseError(e.to_string())
    }
}
