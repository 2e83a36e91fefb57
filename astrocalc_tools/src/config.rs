use apg_common::Secret;
use log::*;

pub const DEFAULT_ASTROCALC_URL: &str = "https://api.astrocalc.example.com";
/// Outbound calls are bounded; hitting this deadline is a transient failure, not a hang.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, Default)]
pub struct AstroCalcConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    pub timeout_seconds: u64,
}

impl AstroCalcConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("APG_ASTROCALC_URL").unwrap_or_else(|_| {
            warn!("APG_ASTROCALC_URL not set, using (probably useless) default");
            DEFAULT_ASTROCALC_URL.to_string()
        });
        let api_key = Secret::new(std::env::var("APG_ASTROCALC_API_KEY").unwrap_or_else(|_| {
            warn!("APG_ASTROCALC_API_KEY not set, using (probably useless) default");
            "astro_00000000".to_string()
        }));
        Self { base_url, api_key, timeout_seconds: DEFAULT_TIMEOUT_SECONDS }
    }
}

/// Destination for outbound delivery and reminder webhooks. `url` being `None` means no
/// destination is configured; callers must treat that as "do not fire".
#[derive(Debug, Clone, Default)]
pub struct AutomationConfig {
    pub url: Option<String>,
    pub token: Option<Secret<String>>,
    pub timeout_seconds: u64,
}

impl AutomationConfig {
    pub fn new_from_env_or_default() -> Self {
        let url = std::env::var("APG_AUTOMATION_WEBHOOK_URL").ok();
        if url.is_none() {
            warn!("APG_AUTOMATION_WEBHOOK_URL not set. Deliveries and reminders will not be sent anywhere.");
        }
        let token = std::env::var("APG_AUTOMATION_TOKEN").ok().map(Secret::new);
        Self { url, token, timeout_seconds: DEFAULT_TIMEOUT_SECONDS }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}
