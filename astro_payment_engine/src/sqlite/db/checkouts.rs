use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{CheckoutRecord, NewCheckout},
    traits::PaymentPipelineError,
};

pub async fn upsert_checkout(
    checkout: NewCheckout,
    conn: &mut SqliteConnection,
) -> Result<CheckoutRecord, PaymentPipelineError> {
    let record: CheckoutRecord = sqlx::query_as(
        r#"
            INSERT INTO checkouts (checkout_id, request_id, provider, status, link, customer, raw, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (checkout_id) DO UPDATE SET
                status = excluded.status,
                link = COALESCE(excluded.link, link),
                customer = excluded.customer,
                raw = excluded.raw,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(checkout.checkout_id)
    .bind(checkout.request_id)
    .bind(checkout.provider)
    .bind(checkout.status)
    .bind(checkout.link)
    .bind(checkout.customer.to_string())
    .bind(checkout.raw.to_string())
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(record)
}

pub async fn fetch_checkout(
    checkout_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<CheckoutRecord>, PaymentPipelineError> {
    let record = sqlx::query_as(r#"SELECT * FROM checkouts WHERE checkout_id = ?"#)
        .bind(checkout_id)
        .fetch_optional(conn)
        .await?;
    Ok(record)
}

/// Returns true if a row was updated.
pub async fn update_checkout_status(
    checkout_id: &str,
    status: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentPipelineError> {
    let result = sqlx::query("UPDATE checkouts SET status = $1, updated_at = $2 WHERE checkout_id = $3")
        .bind(status)
        .bind(Utc::now())
        .bind(checkout_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
