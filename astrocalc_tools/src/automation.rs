use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::{astrocalc::ChartResult, config::AutomationConfig, AstroCalcApiError};

/// Pushes finished readings and reminders to the automation webhook that handles customer
/// communication. The destination is optional; calls fail with
/// [`AstroCalcApiError::NotConfigured`] when no URL is set so callers can cancel instead of fire.
#[derive(Clone)]
pub struct AutomationApi {
    config: AutomationConfig,
    client: Arc<Client>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryPayload {
    pub kind: String,
    pub request_id: i64,
    pub product_type: String,
    pub customer_name: String,
    pub customer_email: String,
    pub chart: ChartResult,
    /// Payment bookkeeping for the automation side: amount, currency, provider, payment id.
    pub meta: Value,
}

impl DeliveryPayload {
    pub fn new(request_id: i64, product_type: String, name: String, email: String, chart: ChartResult) -> Self {
        Self {
            kind: "reading.deliver".to_string(),
            request_id,
            product_type,
            customer_name: name,
            customer_email: email,
            chart,
            meta: Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReminderPayload {
    pub kind: String,
    pub request_id: i64,
    pub product_type: String,
    pub customer_name: String,
    pub customer_email: String,
    /// The checkout link the customer abandoned, when one is known.
    pub payment_link: Option<String>,
}

impl ReminderPayload {
    pub fn new(
        request_id: i64,
        product_type: String,
        name: String,
        email: String,
        payment_link: Option<String>,
    ) -> Self {
        Self {
            kind: "payment.pending_reminder".to_string(),
            request_id,
            product_type,
            customer_name: name,
            customer_email: email,
            payment_link,
        }
    }
}

impl AutomationApi {
    pub fn new(config: AutomationConfig) -> Result<Self, AstroCalcApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AstroCalcApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub async fn deliver(&self, payload: &DeliveryPayload) -> Result<u16, AstroCalcApiError> {
        debug!("Delivering reading for request #{}", payload.request_id);
        self.post(payload).await
    }

    pub async fn remind(&self, payload: &ReminderPayload) -> Result<u16, AstroCalcApiError> {
        debug!("Sending pending-payment reminder for request #{}", payload.request_id);
        self.post(payload).await
    }

    /// Returns the destination's HTTP status on success.
    async fn post<B: Serialize>(&self, body: &B) -> Result<u16, AstroCalcApiError> {
        let Some(url) = self.config.url.as_deref() else {
            return Err(AstroCalcApiError::NotConfigured);
        };
        let mut req = self.client.post(url).json(body);
        if let Some(token) = &self.config.token {
            req = req.header("X-Automation-Token", token.reveal().as_str());
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                AstroCalcApiError::Timeout
            } else {
                AstroCalcApiError::RestResponseError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("Automation call successful. {}", response.status());
            Ok(response.status().as_u16())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| AstroCalcApiError::RestResponseError(e.to_string()))?;
            Err(AstroCalcApiError::QueryError { status, message })
        }
    }
}
