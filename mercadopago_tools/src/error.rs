use thiserror::Error;

#[derive(Debug, Error)]
pub enum MercadoPagoApiError {
    #[error("The Mercado Pago client could not be built. {0}")]
    Initialization(String),
    #[error("The call to Mercado Pago did not complete. {0}")]
    RestResponseError(String),
    #[error("Mercado Pago sent a response that could not be parsed. {0}")]
    JsonError(String),
    #[error("Mercado Pago rejected the call with status {status}. {message}")]
    QueryError { status: u16, message: String },
}
