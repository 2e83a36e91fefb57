//! Request and response bodies for the HTTP surface. Everything here is serde-shaped; the
//! database row types live in the engine.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The uniform body for webhook acknowledgements and simple API replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success(message: impl Display) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure(message: impl Display) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Response body for `POST /api/requests`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCreatedResponse {
    pub id: i64,
}

/// Response body for `POST /api/requests/{id}/checkout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutCreatedResponse {
    pub checkout_id: String,
    pub link: Option<String>,
}
