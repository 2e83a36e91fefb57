use thiserror::Error;

use crate::{
    db_types::{JobMetrics, ProductJob, ProductType, TriggerStatus},
    traits::JobGate,
};

/// Product job bookkeeping.
///
/// A job row exists per attempt; the partial unique index on SUCCEEDED rows guarantees at most one
/// successful run per `(request_id, product_type, trigger_status)` triple, which is the durable
/// idempotency token the whole pipeline leans on.
#[allow(async_fn_in_trait)]
pub trait JobManagement {
    /// Consults the idempotency gate and, if it is open, inserts a RUNNING row with
    /// `attempt = max(previous attempts) + 1`, all in one transaction.
    async fn begin_product_job(
        &self,
        request_id: i64,
        product_type: ProductType,
        trigger_status: TriggerStatus,
    ) -> Result<JobGate, JobApiError>;

    /// Marks a RUNNING job SUCCEEDED and records its call metrics.
    async fn complete_product_job(&self, job_id: i64, metrics: JobMetrics) -> Result<ProductJob, JobApiError>;

    /// Marks a RUNNING job FAILED with a (truncated) error message and whatever metrics were
    /// gathered before the failure.
    async fn fail_product_job(
        &self,
        job_id: i64,
        error: &str,
        metrics: JobMetrics,
    ) -> Result<ProductJob, JobApiError>;

    /// Every job row for the request, newest first.
    async fn fetch_jobs_for_request(&self, request_id: i64) -> Result<Vec<ProductJob>, JobApiError>;
}

#[derive(Debug, Error)]
pub enum JobApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The job (id {0}) does not exist")]
    JobNotFound(i64),
    #[error("The job (id {0}) is not running, so it cannot be completed or failed")]
    JobNotRunning(i64),
    #[error("A concurrent attempt already succeeded for the same triple as job {0}")]
    JobAlreadySucceeded(i64),
}

impl From<sqlx::Error> for JobApiError {
    fn from(e: sqlx::Error) -> Self {
        JobApiError::DatabaseError(e.to_string())
    }
}
