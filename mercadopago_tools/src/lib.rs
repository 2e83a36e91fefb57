mod api;
mod config;
mod error;

mod data_objects;

pub use api::MercadoPagoApi;
pub use config::MercadoPagoConfig;
pub use data_objects::{
    CheckoutPreference,
    MercadoPagoPayment,
    NewCheckoutPreference,
    Payer,
    PayerIdentification,
    PayerPhone,
    PreferenceItem,
    PreferencePayer,
};
pub use error::MercadoPagoApiError;
