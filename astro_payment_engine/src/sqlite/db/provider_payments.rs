use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NormalizedStatus, PaymentRecord, PaymentUpdate},
    traits::PaymentPipelineError,
};

/// Merges one provider assertion into the consolidated payment row.
///
/// A single upsert statement keyed on `payment_id`. On conflict, every column takes the incoming
/// value only when it is non-null, so an out-of-order "created" notification cannot erase customer
/// data a later "approved" notification already stored. The exceptions are `status`,
/// `status_detail`, `normalized_status` and `raw`, which always take the incoming value, and
/// `updated_at`, which always refreshes.
pub async fn upsert_payment(
    update: &PaymentUpdate,
    normalized: NormalizedStatus,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, PaymentPipelineError> {
    let payment: PaymentRecord = sqlx::query_as(
        r#"
            INSERT INTO provider_payments
            (payment_id, provider, checkout_id, status, status_detail, normalized_status, external_reference,
             customer_name, customer_email, customer_tax_id, customer_phone, customer_address,
             amount, currency, provider_created_at, authorized_at, raw, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (payment_id) DO UPDATE SET
                checkout_id = COALESCE(excluded.checkout_id, checkout_id),
                status = excluded.status,
                status_detail = excluded.status_detail,
                normalized_status = excluded.normalized_status,
                external_reference = COALESCE(excluded.external_reference, external_reference),
                customer_name = COALESCE(excluded.customer_name, customer_name),
                customer_email = COALESCE(excluded.customer_email, customer_email),
                customer_tax_id = COALESCE(excluded.customer_tax_id, customer_tax_id),
                customer_phone = COALESCE(excluded.customer_phone, customer_phone),
                customer_address = COALESCE(excluded.customer_address, customer_address),
                amount = COALESCE(excluded.amount, amount),
                currency = COALESCE(excluded.currency, currency),
                provider_created_at = COALESCE(excluded.provider_created_at, provider_created_at),
                authorized_at = COALESCE(excluded.authorized_at, authorized_at),
                raw = excluded.raw,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(&update.payment_id)
    .bind(update.provider)
    .bind(&update.checkout_id)
    .bind(&update.status)
    .bind(&update.status_detail)
    .bind(normalized)
    .bind(&update.external_reference)
    .bind(&update.customer.name)
    .bind(&update.customer.email)
    .bind(&update.customer.tax_id)
    .bind(&update.customer.phone)
    .bind(&update.customer.address)
    .bind(update.amount)
    .bind(&update.currency)
    .bind(update.provider_created_at)
    .bind(update.authorized_at)
    .bind(update.raw.to_string())
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_payment(
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, PaymentPipelineError> {
    let payment = sqlx::query_as(r#"SELECT * FROM provider_payments WHERE payment_id = ?"#)
        .bind(payment_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}
