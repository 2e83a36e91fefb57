use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{JobMetrics, ProductJob, ProductType, TriggerStatus},
    traits::{JobApiError, JobGate, JobManagement},
};

/// Error messages stored on FAILED rows are capped so a runaway response body cannot bloat the
/// job table.
pub const MAX_STORED_ERROR_LEN: usize = 500;

/// The `ProductJobApi` wraps the product job state machine: gate, start, and terminal updates.
pub struct ProductJobApi<B> {
    db: B,
}

impl<B: Debug> Debug for ProductJobApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProductJobApi ({:?})", self.db)
    }
}

impl<B> ProductJobApi<B>
where B: JobManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Asks the idempotency gate for permission to run. When the gate is open, a RUNNING attempt
    /// row is created and returned; when a SUCCEEDED row already exists for the triple, the
    /// caller receives it and must not do any work.
    pub async fn start(
        &self,
        request_id: i64,
        product_type: ProductType,
        trigger_status: TriggerStatus,
    ) -> Result<JobGate, JobApiError> {
        self.db.begin_product_job(request_id, product_type, trigger_status).await
    }

    pub async fn complete(&self, job_id: i64, metrics: JobMetrics) -> Result<ProductJob, JobApiError> {
        self.db.complete_product_job(job_id, metrics).await
    }

    /// Marks the job FAILED. The error message is truncated to [`MAX_STORED_ERROR_LEN`] before
    /// storage.
    pub async fn fail(&self, job_id: i64, error: &str, metrics: JobMetrics) -> Result<ProductJob, JobApiError> {
        let stored = truncate_error(error);
        if stored.len() < error.len() {
            trace!("Error message for job {job_id} truncated from {} to {} bytes", error.len(), stored.len());
        }
        self.db.fail_product_job(job_id, stored, metrics).await
    }

    pub async fn jobs_for_request(&self, request_id: i64) -> Result<Vec<ProductJob>, JobApiError> {
        self.db.fetch_jobs_for_request(request_id).await
    }
}

fn truncate_error(error: &str) -> &str {
    if error.len() <= MAX_STORED_ERROR_LEN {
        return error;
    }
    let mut end = MAX_STORED_ERROR_LEN;
    while !error.is_char_boundary(end) {
        end -= 1;
    }
    &error[..end]
}
