use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{CheckoutRecord, NewReadingRequest, PaymentRecord, ReadingRequest, SnapshotChange},
    traits::PaymentPipelineError,
};

pub async fn insert_request(
    request: NewReadingRequest,
    conn: &mut SqliteConnection,
) -> Result<ReadingRequest, PaymentPipelineError> {
    let record: ReadingRequest = sqlx::query_as(
        r#"
            INSERT INTO reading_requests
            (product_type, customer_name, customer_email, birth_date, birth_time, birth_place,
             latitude, longitude, utc_offset_hours,
             partner_name, partner_birth_date, partner_birth_time, partner_birth_place,
             partner_latitude, partner_longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *;
        "#,
    )
    .bind(request.product_type)
    .bind(request.customer_name)
    .bind(request.customer_email)
    .bind(request.birth_date)
    .bind(request.birth_time)
    .bind(request.birth_place)
    .bind(request.latitude)
    .bind(request.longitude)
    .bind(request.utc_offset_hours)
    .bind(request.partner_name)
    .bind(request.partner_birth_date)
    .bind(request.partner_birth_time)
    .bind(request.partner_birth_place)
    .bind(request.partner_latitude)
    .bind(request.partner_longitude)
    .fetch_one(conn)
    .await?;
    Ok(record)
}

pub async fn fetch_request(
    request_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ReadingRequest>, PaymentPipelineError> {
    let record = sqlx::query_as(r#"SELECT * FROM reading_requests WHERE id = ?"#)
        .bind(request_id)
        .fetch_optional(conn)
        .await?;
    Ok(record)
}

/// Resolves the business request a payment belongs to. The numeric external reference is
/// authoritative; a checkout-id lookup is the fallback for notifications that omit it.
async fn resolve_request_id(
    payment: &PaymentRecord,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, PaymentPipelineError> {
    if let Some(id) = payment.external_reference.as_deref().and_then(|s| s.trim().parse::<i64>().ok()) {
        return Ok(Some(id));
    }
    let Some(checkout_id) = payment.checkout_id.as_deref() else {
        return Ok(None);
    };
    let request_id: Option<(i64,)> = sqlx::query_as("SELECT request_id FROM checkouts WHERE checkout_id = ?")
        .bind(checkout_id)
        .fetch_optional(conn)
        .await?;
    Ok(request_id.map(|(id,)| id))
}

/// Writes the payment snapshot onto the owning reading request. The snapshot always reflects the
/// consolidated payment row, so status moves with every call while amount, currency, checkout id
/// and authorisation time never regress to null. Returns `None` when no request could be resolved
/// (an orphan payment) or the resolved id does not exist.
pub async fn update_snapshot_from_payment(
    payment: &PaymentRecord,
    conn: &mut SqliteConnection,
) -> Result<Option<SnapshotChange>, PaymentPipelineError> {
    let Some(request_id) = resolve_request_id(payment, conn).await? else {
        debug!("🗃️ Payment {} has no resolvable reading request. Snapshot not written.", payment.payment_id);
        return Ok(None);
    };
    let Some(request) = fetch_request(request_id, conn).await? else {
        debug!("🗃️ Payment {} references reading request {request_id}, which does not exist.", payment.payment_id);
        return Ok(None);
    };
    let old_status = request.payment_status;
    let updated: ReadingRequest = sqlx::query_as(
        r#"
            UPDATE reading_requests SET
                payment_provider = $1,
                payment_status = $2,
                payment_status_detail = $3,
                payment_amount = COALESCE($4, payment_amount),
                payment_currency = COALESCE($5, payment_currency),
                checkout_id = COALESCE($6, checkout_id),
                payment_id = $7,
                authorized_at = COALESCE($8, authorized_at),
                payment_updated_at = $9
            WHERE id = $10
            RETURNING *;
        "#,
    )
    .bind(payment.provider)
    .bind(payment.normalized_status)
    .bind(&payment.status_detail)
    .bind(payment.amount)
    .bind(&payment.currency)
    .bind(&payment.checkout_id)
    .bind(&payment.payment_id)
    .bind(payment.authorized_at)
    .bind(Utc::now())
    .bind(request_id)
    .fetch_one(conn)
    .await?;
    Ok(Some(SnapshotChange {
        request_id,
        product_type: updated.product_type,
        provider: payment.provider,
        old_status,
        new_status: payment.normalized_status,
        status_detail: payment.status_detail.clone(),
        amount: updated.payment_amount,
        currency: updated.payment_currency,
        checkout_id: updated.checkout_id,
        payment_id: payment.payment_id.clone(),
        authorized_at: updated.authorized_at,
    }))
}

/// Records a freshly created checkout on its reading request so later webhooks can be resolved
/// even when the provider drops the external reference.
pub async fn attach_checkout_to_request(
    checkout: &CheckoutRecord,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentPipelineError> {
    let result = sqlx::query(
        r#"
            UPDATE reading_requests SET
                payment_provider = $1,
                checkout_id = $2,
                payment_link = COALESCE($3, payment_link)
            WHERE id = $4
        "#,
    )
    .bind(checkout.provider)
    .bind(&checkout.checkout_id)
    .bind(&checkout.link)
    .bind(checkout.request_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(PaymentPipelineError::RequestNotFound(checkout.request_id));
    }
    Ok(())
}
