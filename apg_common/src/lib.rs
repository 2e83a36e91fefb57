mod mask;
mod money;
mod secret;

pub use mask::{mask_digits, mask_email, mask_name};
pub use money::{MoneyMinor, MoneyMinorConversionError};
pub use secret::Secret;

pub const DEFAULT_CURRENCY_CODE: &str = "BRL";
