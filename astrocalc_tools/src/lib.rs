mod astrocalc;
mod automation;
mod config;
mod error;

pub use astrocalc::{AstroCalcApi, ChartResult, ChartSubject};
pub use automation::{AutomationApi, DeliveryPayload, ReminderPayload};
pub use config::{AstroCalcConfig, AutomationConfig};
pub use error::{is_transient_status, AstroCalcApiError};
