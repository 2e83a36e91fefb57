use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewTrigger, ScheduledTrigger},
    traits::ScheduleApiError,
};

/// Inserts the trigger if no row exists for the `(request_id, product_type, kind)` triple.
/// Returns `None` when one does, whatever state it is in. A canceled or fired trigger is never
/// resurrected by a re-schedule.
pub async fn idempotent_insert(
    trigger: NewTrigger,
    conn: &mut SqliteConnection,
) -> Result<Option<ScheduledTrigger>, ScheduleApiError> {
    let inserted: Option<ScheduledTrigger> = sqlx::query_as(
        r#"
            INSERT INTO scheduled_triggers (request_id, product_type, kind, due_at, state)
            VALUES ($1, $2, $3, $4, 'pending')
            ON CONFLICT (request_id, product_type, kind) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(trigger.request_id)
    .bind(trigger.product_type.to_string())
    .bind(trigger.kind.to_string())
    .bind(trigger.due_at)
    .fetch_optional(conn)
    .await?;
    Ok(inserted)
}

/// Pending rows whose due time has passed, oldest due first, capped at `limit`.
pub async fn fetch_due_triggers(
    now: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ScheduledTrigger>, ScheduleApiError> {
    let triggers = sqlx::query_as(
        r#"SELECT * FROM scheduled_triggers WHERE state = 'pending' AND due_at <= $1 ORDER BY due_at, id LIMIT $2"#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(triggers)
}

/// pending → fired. The state guard makes the transition race-safe: returns false when another
/// writer got there first or the row was never pending.
pub async fn mark_fired(trigger_id: i64, conn: &mut SqliteConnection) -> Result<bool, ScheduleApiError> {
    let result =
        sqlx::query("UPDATE scheduled_triggers SET state = 'fired', updated_at = $1 WHERE id = $2 AND state = 'pending'")
            .bind(Utc::now())
            .bind(trigger_id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// pending → canceled, with the same guard as [`mark_fired`].
pub async fn mark_canceled(trigger_id: i64, conn: &mut SqliteConnection) -> Result<bool, ScheduleApiError> {
    let result = sqlx::query(
        "UPDATE scheduled_triggers SET state = 'canceled', updated_at = $1 WHERE id = $2 AND state = 'pending'",
    )
    .bind(Utc::now())
    .bind(trigger_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
