use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{JobMetrics, ProductJob, ProductType, TriggerStatus},
    traits::{JobApiError, JobGate},
};

/// Consults the idempotency gate for the `(request_id, product_type, trigger_status)` triple.
///
/// If a SUCCEEDED row exists the gate is closed and that row is returned. Otherwise a fresh
/// RUNNING row is inserted with `attempt = max(previous attempts) + 1`. Callers run this inside a
/// transaction so the gate check and the insert are atomic.
pub async fn begin_job(
    request_id: i64,
    product_type: ProductType,
    trigger_status: TriggerStatus,
    conn: &mut SqliteConnection,
) -> Result<JobGate, JobApiError> {
    let done: Option<ProductJob> = sqlx::query_as(
        "SELECT * FROM product_jobs WHERE request_id = $1 AND product_type = $2 AND trigger_status = $3 AND status = \
         'SUCCEEDED'",
    )
    .bind(request_id)
    .bind(product_type)
    .bind(trigger_status)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(job) = done {
        return Ok(JobGate::AlreadySucceeded(job));
    }
    let job: ProductJob = sqlx::query_as(
        r#"
            INSERT INTO product_jobs (request_id, product_type, trigger_status, status, attempt, started_at)
            VALUES ($1, $2, $3, 'RUNNING',
                COALESCE((SELECT MAX(attempt) FROM product_jobs
                          WHERE request_id = $1 AND product_type = $2 AND trigger_status = $3), 0) + 1,
                $4)
            RETURNING *;
        "#,
    )
    .bind(request_id)
    .bind(product_type)
    .bind(trigger_status)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(JobGate::Started(job))
}

/// RUNNING → SUCCEEDED. A concurrent attempt that already claimed success trips the partial
/// unique index and surfaces as [`JobApiError::JobAlreadySucceeded`].
pub async fn complete_job(
    job_id: i64,
    metrics: JobMetrics,
    conn: &mut SqliteConnection,
) -> Result<ProductJob, JobApiError> {
    let job: Option<ProductJob> = sqlx::query_as(
        r#"
            UPDATE product_jobs SET
                status = 'SUCCEEDED',
                enrichment_http_status = $1,
                enrichment_attempts = $2,
                enrichment_ms = $3,
                delivery_http_status = $4,
                delivery_attempts = $5,
                delivery_ms = $6,
                finished_at = $7
            WHERE id = $8 AND status = 'RUNNING'
            RETURNING *;
        "#,
    )
    .bind(metrics.enrichment_http_status)
    .bind(metrics.enrichment_attempts)
    .bind(metrics.enrichment_ms)
    .bind(metrics.delivery_http_status)
    .bind(metrics.delivery_attempts)
    .bind(metrics.delivery_ms)
    .bind(Utc::now())
    .bind(job_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => JobApiError::JobAlreadySucceeded(job_id),
        e => JobApiError::from(e),
    })?;
    match job {
        Some(job) => Ok(job),
        None => Err(not_running_error(job_id, conn).await),
    }
}

/// RUNNING → FAILED, recording the error and whatever metrics the attempt gathered.
pub async fn fail_job(
    job_id: i64,
    error: &str,
    metrics: JobMetrics,
    conn: &mut SqliteConnection,
) -> Result<ProductJob, JobApiError> {
    let job: Option<ProductJob> = sqlx::query_as(
        r#"
            UPDATE product_jobs SET
                status = 'FAILED',
                error_message = $1,
                enrichment_http_status = $2,
                enrichment_attempts = $3,
                enrichment_ms = $4,
                delivery_http_status = $5,
                delivery_attempts = $6,
                delivery_ms = $7,
                finished_at = $8
            WHERE id = $9 AND status = 'RUNNING'
            RETURNING *;
        "#,
    )
    .bind(error)
    .bind(metrics.enrichment_http_status)
    .bind(metrics.enrichment_attempts)
    .bind(metrics.enrichment_ms)
    .bind(metrics.delivery_http_status)
    .bind(metrics.delivery_attempts)
    .bind(metrics.delivery_ms)
    .bind(Utc::now())
    .bind(job_id)
    .fetch_optional(&mut *conn)
    .await?;
    match job {
        Some(job) => Ok(job),
        None => Err(not_running_error(job_id, conn).await),
    }
}

pub async fn fetch_jobs_for_request(request_id: i64, conn: &mut SqliteConnection) -> Result<Vec<ProductJob>, JobApiError> {
    let jobs = sqlx::query_as(r#"SELECT * FROM product_jobs WHERE request_id = ? ORDER BY started_at DESC, id DESC"#)
        .bind(request_id)
        .fetch_all(conn)
        .await?;
    Ok(jobs)
}

async fn not_running_error(job_id: i64, conn: &mut SqliteConnection) -> JobApiError {
    let exists: Result<Option<(i64,)>, _> =
        sqlx::query_as("SELECT id FROM product_jobs WHERE id = ?").bind(job_id).fetch_optional(conn).await;
    match exists {
        Ok(Some(_)) => JobApiError::JobNotRunning(job_id),
        Ok(None) => JobApiError::JobNotFound(job_id),
        Err(e) => JobApiError::from(e),
    }
}
