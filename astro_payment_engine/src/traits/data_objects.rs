use crate::db_types::ProductJob;

/// Outcome of asking the job store for permission to run a product job.
///
/// A `SUCCEEDED` row for the same `(request_id, product_type, trigger_status)`
/// triple is a permanent gate. Everything else starts a fresh attempt.
#[derive(Debug, Clone)]
pub enum JobGate {
    /// The job already ran to completion. The winning row is returned so callers
    /// can log or inspect it. No new work may be started.
    AlreadySucceeded(ProductJob),
    /// A new `RUNNING` attempt row has been created and the caller owns it.
    Started(ProductJob),
}

impl JobGate {
    pub fn job(&self) -> &ProductJob {
        match self {
            JobGate::AlreadySucceeded(job) => job,
            JobGate::Started(job) => job,
        }
    }

    pub fn already_done(&self) -> bool {
        matches!(self, JobGate::AlreadySucceeded(_))
    }
}
