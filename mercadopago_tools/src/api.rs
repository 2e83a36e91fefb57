//! Thin REST client for the two Mercado Pago endpoints the gateway needs: creating a hosted
//! checkout preference and fetching the authoritative payment object.

use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::MercadoPagoConfig,
    data_objects::{CheckoutPreference, MercadoPagoPayment, NewCheckoutPreference},
    MercadoPagoApiError,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct MercadoPagoApi {
    config: MercadoPagoConfig,
    client: Arc<Client>,
}

impl MercadoPagoApi {
    pub fn new(config: MercadoPagoConfig) -> Result<Self, MercadoPagoApiError> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.access_token.reveal()))
            .map_err(|e| MercadoPagoApiError::Initialization(e.to_string()))?;
        bearer.set_sensitive(true);
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MercadoPagoApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    /// Creates a hosted checkout preference and returns the id and payment link.
    pub async fn create_checkout(
        &self,
        preference: &NewCheckoutPreference,
    ) -> Result<CheckoutPreference, MercadoPagoApiError> {
        debug!("Creating checkout preference for reference {}", preference.external_reference);
        let created: CheckoutPreference = self.send(Method::POST, "/checkout/preferences", Some(preference)).await?;
        info!("Created checkout preference {}", created.id);
        Ok(created)
    }

    /// Fetches the authoritative payment object for a payment id. This is the cross-check used
    /// when a webhook merely announces that a payment changed.
    pub async fn fetch_payment(&self, payment_id: u64) -> Result<MercadoPagoPayment, MercadoPagoApiError> {
        debug!("Fetching payment {payment_id}");
        self.send::<MercadoPagoPayment, ()>(Method::GET, &format!("/v1/payments/{payment_id}"), None).await
    }

    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, MercadoPagoApiError> {
        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));
        trace!("{method} {url}");
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| MercadoPagoApiError::RestResponseError(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MercadoPagoApiError::QueryError { status: status.as_u16(), message });
        }
        trace!("Mercado Pago answered {status}");
        response.json::<T>().await.map_err(|e| MercadoPagoApiError::JsonError(e.to_string()))
    }
}
