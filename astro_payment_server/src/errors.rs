//! Everything that can go wrong at the HTTP layer, and how it maps onto status codes.
//!
//! Engine and integration errors are converted here rather than at the call sites, so route
//! handlers can lean on `?` throughout.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use astro_payment_engine::{JobApiError, PaymentPipelineError, ScheduleApiError};
use mercadopago_tools::MercadoPagoApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Could not create the checkout. {0}")]
    CheckoutError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("The server could not start. {0}")]
    InitializeError(String),
    #[error("The server configuration is invalid. {0}")]
    ConfigurationError(String),
    #[error("A backend operation failed. {0}")]
    BackendError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::CheckoutError(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": self.to_string() }))
    }
}

impl From<PaymentPipelineError> for ServerError {
    fn from(e: PaymentPipelineError) -> Self {
        match e {
            PaymentPipelineError::RequestNotFound(_)
            | PaymentPipelineError::PaymentNotFound(_)
            | PaymentPipelineError::CheckoutNotFound(_) => Self::NoRecordFound(e.to_string()),
            PaymentPipelineError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}

impl From<JobApiError> for ServerError {
    fn from(e: JobApiError) -> Self {
        match e {
            JobApiError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            other => Self::BackendError(other.to_string()),
        }
    }
}

impl From<ScheduleApiError> for ServerError {
    fn from(e: ScheduleApiError) -> Self {
        match e {
            ScheduleApiError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            other => Self::BackendError(other.to_string()),
        }
    }
}

impl From<MercadoPagoApiError> for ServerError {
    fn from(e: MercadoPagoApiError) -> Self {
        Self::CheckoutError(e.to_string())
    }
}
