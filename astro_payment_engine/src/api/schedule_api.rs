use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{NewTrigger, ScheduledTrigger},
    traits::{ScheduleApiError, ScheduleManagement},
};

/// The `ScheduleApi` manages delayed triggers for the scheduler loop.
pub struct ScheduleApi<B> {
    db: B,
}

impl<B: Debug> Debug for ScheduleApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScheduleApi ({:?})", self.db)
    }
}

impl<B> ScheduleApi<B>
where B: ScheduleManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Schedules a delayed trigger. Re-scheduling the same `(request, product, kind)` triple is a
    /// no-op and returns `None`, so callers can fire-and-forget from event handlers.
    pub async fn schedule(&self, trigger: NewTrigger) -> Result<Option<ScheduledTrigger>, ScheduleApiError> {
        self.db.schedule_trigger(trigger).await
    }

    /// Claims up to `limit` due pending triggers for processing. Claiming does not change state;
    /// every claimed row must subsequently be resolved with [`Self::fire`] or [`Self::cancel`].
    pub async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledTrigger>, ScheduleApiError> {
        let due = self.db.claim_due_triggers(now, limit).await?;
        if !due.is_empty() {
            debug!("🕰️ Claimed {} due trigger(s)", due.len());
        }
        Ok(due)
    }

    pub async fn fire(&self, trigger_id: i64) -> Result<bool, ScheduleApiError> {
        self.db.mark_trigger_fired(trigger_id).await
    }

    pub async fn cancel(&self, trigger_id: i64) -> Result<bool, ScheduleApiError> {
        self.db.cancel_trigger(trigger_id).await
    }
}
