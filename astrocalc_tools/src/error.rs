use thiserror::Error;

#[derive(Debug, Error)]
pub enum AstroCalcApiError {
    #[error("The HTTP client could not be built. {0}")]
    Initialization(String),
    #[error("The call did not complete within the deadline")]
    Timeout,
    #[error("The remote call did not complete. {0}")]
    RestResponseError(String),
    #[error("The response could not be parsed. {0}")]
    JsonError(String),
    #[error("The call was rejected with status {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("No destination is configured for this call")]
    NotConfigured,
}

impl AstroCalcApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            AstroCalcApiError::QueryError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transient failures are worth retrying; everything else fails the job immediately.
    /// The transient set is fixed: timeouts plus 429, 502, 503 and 504.
    pub fn is_transient(&self) -> bool {
        match self {
            AstroCalcApiError::Timeout => true,
            AstroCalcApiError::QueryError { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}
