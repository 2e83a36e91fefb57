use sqlx::SqliteConnection;

use crate::{
    db_types::{NewWebhookEvent, WebhookEvent},
    traits::PaymentPipelineError,
};

/// Inserts the event if its uid has never been seen, returning the stored row. Returns `None` when
/// a row with the same `event_uid` already exists; the incoming copy is dropped and the original
/// row is left untouched.
pub async fn idempotent_insert(
    event: NewWebhookEvent,
    conn: &mut SqliteConnection,
) -> Result<Option<WebhookEvent>, PaymentPipelineError> {
    // `fetch_all` (not `fetch_optional`): the future must not resolve until the statement has run
    // to completion and the implicit transaction is committed. `fetch_optional` resolves on the
    // first RETURNING row, before the commit, so the row may not yet be visible to reads on other
    // pool connections.
    let inserted: Option<WebhookEvent> = sqlx::query_as(
        r#"
            INSERT INTO webhook_events
            (event_uid, provider, topic, action, payment_id, checkout_id, headers, query, body, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (event_uid) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(event.event_uid)
    .bind(event.provider)
    .bind(event.topic)
    .bind(event.action)
    .bind(event.payment_id)
    .bind(event.checkout_id)
    .bind(event.headers.to_string())
    .bind(event.query.to_string())
    .bind(event.body.to_string())
    .bind(event.received_at)
    .fetch_all(conn)
    .await?
    .pop();
    Ok(inserted)
}

pub async fn fetch_event(
    event_uid: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WebhookEvent>, PaymentPipelineError> {
    let event = sqlx::query_as(r#"SELECT * FROM webhook_events WHERE event_uid = ?"#)
        .bind(event_uid)
        .fetch_optional(conn)
        .await?;
    Ok(event)
}

pub async fn fetch_events_for_payment(
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<WebhookEvent>, PaymentPipelineError> {
    let events = sqlx::query_as(r#"SELECT * FROM webhook_events WHERE payment_id = ? ORDER BY received_at, id"#)
        .bind(payment_id)
        .fetch_all(conn)
        .await?;
    Ok(events)
}
