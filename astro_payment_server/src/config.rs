use std::env;

use apg_common::{Secret, DEFAULT_CURRENCY_CODE};
use astro_payment_engine::db_types::ProductType;
use astrocalc_tools::{AstroCalcConfig, AutomationConfig};
use chrono::Duration;
use log::*;
use mercadopago_tools::MercadoPagoConfig;

const DEFAULT_APG_HOST: &str = "127.0.0.1";
const DEFAULT_APG_PORT: u16 = 8380;
const DEFAULT_WEBHOOK_TOLERANCE: Duration = Duration::seconds(900);
const DEFAULT_JOB_MAX_HTTP_ATTEMPTS: u32 = 4;
const DEFAULT_PENDING_REMINDER: Duration = Duration::minutes(10);
const DEFAULT_SCHEDULER_POLL_INTERVAL: Duration = Duration::seconds(60);
const DEFAULT_SCHEDULER_CLAIM_LIMIT: i64 = 20;
const DEFAULT_BIRTH_CHART_PRICE: f64 = 129.90;
const DEFAULT_RELATIONSHIP_READING_PRICE: f64 = 189.90;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Signature-verification settings for the Mercado Pago webhook endpoints.
    pub mercado_pago: WebhookConfig,
    /// Signature-verification settings for the Stripe webhook endpoints.
    pub stripe: WebhookConfig,
    /// Mercado Pago REST configuration, used for checkout preferences and payment cross-checks.
    pub mp_api: MercadoPagoConfig,
    /// When true, webhook-asserted payment state is replaced with the authoritative fetch-by-id
    /// response before the upsert. Requires an access token to be configured.
    pub mp_cross_check: bool,
    /// The notification URL handed to Mercado Pago when creating checkout preferences.
    pub mp_notification_url: Option<String>,
    pub astrocalc: AstroCalcConfig,
    pub automation: AutomationConfig,
    pub pricing: PricingConfig,
    pub jobs: JobConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_APG_HOST.to_string(),
            port: DEFAULT_APG_PORT,
            database_url: String::default(),
            mercado_pago: WebhookConfig::default(),
            stripe: WebhookConfig::default(),
            mp_api: MercadoPagoConfig::default(),
            mp_cross_check: false,
            mp_notification_url: None,
            astrocalc: AstroCalcConfig::default(),
            automation: AutomationConfig::default(),
            pricing: PricingConfig::default(),
            jobs: JobConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("APG_HOST").ok().unwrap_or_else(|| DEFAULT_APG_HOST.into());
        let port = env::var("APG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for APG_PORT. {e} Using the default, {DEFAULT_APG_PORT}, instead."
                    );
                    DEFAULT_APG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_APG_PORT);
        let database_url = env::var("APG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ APG_DATABASE_URL is not set. Please set it to the URL for the payment gateway database.");
            String::default()
        });
        let tolerance = configure_tolerance();
        let mercado_pago = WebhookConfig::from_env_or_defaults("APG_MP_WEBHOOK_SECRET", "APG_MP_PATH_SECRET", tolerance);
        let stripe =
            WebhookConfig::from_env_or_defaults("APG_STRIPE_WEBHOOK_SECRET", "APG_STRIPE_PATH_SECRET", tolerance);
        let mp_api = MercadoPagoConfig::new_from_env_or_default();
        let mp_cross_check = env::var("APG_MP_ACCESS_TOKEN").map(|s| !s.is_empty()).unwrap_or(false);
        if !mp_cross_check {
            info!(
                "🪛️ APG_MP_ACCESS_TOKEN is not set. Webhook payloads will be trusted as-is, without cross-checking \
                 against the Mercado Pago API."
            );
        }
        let mp_notification_url = env::var("APG_MP_NOTIFICATION_URL").ok().filter(|s| !s.is_empty());
        if mp_notification_url.is_none() {
            info!("🪛️ APG_MP_NOTIFICATION_URL is not set. Checkout preferences will not carry a notification URL.");
        }
        let astrocalc = AstroCalcConfig::new_from_env_or_default();
        let automation = AutomationConfig::new_from_env_or_default();
        let pricing = PricingConfig::from_env_or_defaults();
        let jobs = JobConfig::from_env_or_defaults();
        let scheduler = SchedulerConfig::from_env_or_defaults();
        Self {
            host,
            port,
            database_url,
            mercado_pago,
            stripe,
            mp_api,
            mp_cross_check,
            mp_notification_url,
            astrocalc,
            automation,
            pricing,
            jobs,
            scheduler,
        }
    }
}

//-----------------------------------------------  WebhookConfig  ------------------------------------------------------

/// Per-provider settings for the signature verifier. A missing secret does not disable the
/// endpoint; it makes every signature check fail soft and show up in the audit log.
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    /// Shared HMAC secret for the provider's signature header.
    pub secret: Option<Secret<String>>,
    /// Optional extra path segment on the webhook URL, compared in constant time.
    pub path_secret: Option<Secret<String>>,
    /// Freshness window for signed timestamps. The boundary value itself is fresh.
    pub tolerance: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { secret: None, path_secret: None, tolerance: DEFAULT_WEBHOOK_TOLERANCE }
    }
}

impl WebhookConfig {
    pub fn from_env_or_defaults(secret_var: &str, path_secret_var: &str, tolerance: Duration) -> Self {
        let secret = env::var(secret_var).ok().filter(|s| !s.is_empty()).map(Secret::new);
        if secret.is_none() {
            warn!(
                "🪛️ {secret_var} is not set. Signatures on this webhook cannot be verified and every delivery will \
                 be flagged in the audit log."
            );
        }
        let path_secret = env::var(path_secret_var).ok().filter(|s| !s.is_empty()).map(Secret::new);
        Self { secret, path_secret, tolerance }
    }
}

fn configure_tolerance() -> Duration {
    env::var("APG_WEBHOOK_TOLERANCE_SECONDS")
        .map_err(|_| {
            info!(
                "🪛️ APG_WEBHOOK_TOLERANCE_SECONDS is not set. Using the default value of {}s.",
                DEFAULT_WEBHOOK_TOLERANCE.num_seconds()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::seconds)
                .map_err(|e| warn!("🪛️ Invalid configuration value for APG_WEBHOOK_TOLERANCE_SECONDS. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_WEBHOOK_TOLERANCE)
}

//-----------------------------------------------  PricingConfig  ------------------------------------------------------

/// Unit prices used when creating checkout preferences, in major currency units.
#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub birth_chart: f64,
    pub relationship_reading: f64,
    pub currency: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            birth_chart: DEFAULT_BIRTH_CHART_PRICE,
            relationship_reading: DEFAULT_RELATIONSHIP_READING_PRICE,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
        }
    }
}

impl PricingConfig {
    pub fn from_env_or_defaults() -> Self {
        let birth_chart = parse_price("APG_PRICE_BIRTH_CHART", DEFAULT_BIRTH_CHART_PRICE);
        let relationship_reading = parse_price("APG_PRICE_RELATIONSHIP_READING", DEFAULT_RELATIONSHIP_READING_PRICE);
        let currency = env::var("APG_CURRENCY").ok().unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string());
        Self { birth_chart, relationship_reading, currency }
    }

    pub fn price_for(&self, product_type: ProductType) -> f64 {
        match product_type {
            ProductType::BirthChart => self.birth_chart,
            ProductType::RelationshipReading => self.relationship_reading,
        }
    }
}

fn parse_price(var: &str, default: f64) -> f64 {
    env::var(var)
        .map(|s| {
            s.parse::<f64>().unwrap_or_else(|e| {
                error!("🪛️ {s} is not a valid price for {var}. {e} Using the default, {default}, instead.");
                default
            })
        })
        .ok()
        .unwrap_or(default)
}

//-------------------------------------------------  JobConfig  --------------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub struct JobConfig {
    /// Attempt budget for each outbound HTTP call made by a product job.
    pub max_http_attempts: u32,
    /// How long after a payment goes pending before the reminder trigger comes due.
    pub pending_reminder: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self { max_http_attempts: DEFAULT_JOB_MAX_HTTP_ATTEMPTS, pending_reminder: DEFAULT_PENDING_REMINDER }
    }
}

impl JobConfig {
    pub fn from_env_or_defaults() -> Self {
        let max_http_attempts = env::var("APG_JOB_MAX_HTTP_ATTEMPTS")
            .map(|s| {
                s.parse::<u32>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid attempt count for APG_JOB_MAX_HTTP_ATTEMPTS. {e} Using the default, \
                         {DEFAULT_JOB_MAX_HTTP_ATTEMPTS}, instead."
                    );
                    DEFAULT_JOB_MAX_HTTP_ATTEMPTS
                })
            })
            .ok()
            .unwrap_or(DEFAULT_JOB_MAX_HTTP_ATTEMPTS);
        let pending_reminder = env::var("APG_PENDING_REMINDER_MINUTES")
            .map_err(|_| {
                info!(
                    "🪛️ APG_PENDING_REMINDER_MINUTES is not set. Using the default value of {} min.",
                    DEFAULT_PENDING_REMINDER.num_minutes()
                )
            })
            .and_then(|s| {
                s.parse::<i64>()
                    .map(Duration::minutes)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for APG_PENDING_REMINDER_MINUTES. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_PENDING_REMINDER);
        Self { max_http_attempts, pending_reminder }
    }
}

//----------------------------------------------  SchedulerConfig  -----------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// Nominal pause between sweeps. Each cycle applies ±10% jitter so that multiple instances
    /// drift apart instead of thundering together.
    pub poll_interval: Duration,
    /// Maximum number of due triggers claimed per sweep.
    pub claim_limit: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { poll_interval: DEFAULT_SCHEDULER_POLL_INTERVAL, claim_limit: DEFAULT_SCHEDULER_CLAIM_LIMIT }
    }
}

impl SchedulerConfig {
    pub fn from_env_or_defaults() -> Self {
        let poll_interval = env::var("APG_SCHEDULER_POLL_SECONDS")
            .map_err(|_| {
                info!(
                    "🪛️ APG_SCHEDULER_POLL_SECONDS is not set. Using the default value of {}s.",
                    DEFAULT_SCHEDULER_POLL_INTERVAL.num_seconds()
                )
            })
            .and_then(|s| {
                s.parse::<i64>()
                    .map(Duration::seconds)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for APG_SCHEDULER_POLL_SECONDS. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_SCHEDULER_POLL_INTERVAL);
        let claim_limit = env::var("APG_SCHEDULER_CLAIM_LIMIT")
            .map(|s| {
                s.parse::<i64>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid batch size for APG_SCHEDULER_CLAIM_LIMIT. {e} Using the default, \
                         {DEFAULT_SCHEDULER_CLAIM_LIMIT}, instead."
                    );
                    DEFAULT_SCHEDULER_CLAIM_LIMIT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SCHEDULER_CLAIM_LIMIT);
        Self { poll_interval, claim_limit }
    }
}

//-----------------------------------------------  CheckoutConfig  -----------------------------------------------------

/// Everything the checkout route needs beyond the Mercado Pago client itself. Registered as shared
/// application data so the handler does not carry the full server configuration around.
#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    pub pricing: PricingConfig,
    /// Attached to every checkout preference so that notifications come back to this deployment.
    pub notification_url: Option<String>,
}

impl CheckoutConfig {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { pricing: config.pricing.clone(), notification_url: config.mp_notification_url.clone() }
    }
}

//-----------------------------------------------  ServerOptions  ------------------------------------------------------

/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub mp_cross_check: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { mp_cross_check: config.mp_cross_check }
    }
}
