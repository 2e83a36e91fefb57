use apg_common::Secret;
use log::*;

pub const DEFAULT_MP_BASE_URL: &str = "https://api.mercadopago.com";

#[derive(Debug, Clone, Default)]
pub struct MercadoPagoConfig {
    /// Base URL for the Mercado Pago REST API. Overridable so tests can point the client at a
    /// local fixture server.
    pub base_url: String,
    pub access_token: Secret<String>,
}

impl MercadoPagoConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("APG_MP_BASE_URL").unwrap_or_else(|_| DEFAULT_MP_BASE_URL.to_string());
        let access_token = Secret::new(std::env::var("APG_MP_ACCESS_TOKEN").unwrap_or_else(|_| {
            warn!("APG_MP_ACCESS_TOKEN not set, using (probably useless) default");
            "TEST-00000000000000".to_string()
        }));
        Self { base_url, access_token }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}
