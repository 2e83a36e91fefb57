use std::{fmt::Display, iter::Sum, ops::Add};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

//--------------------------------------     MoneyMinor       --------------------------------------------------------
/// A monetary amount in minor units (centavos, cents). Payment providers report amounts as decimal
/// floats in major units; those are converted once at the boundary and integers are used everywhere else.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct MoneyMinor(i64);

impl Add for MoneyMinor {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for MoneyMinor {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in minor currency units: {0}")]
pub struct MoneyMinorConversionError(String);

impl From<i64> for MoneyMinor {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for MoneyMinor {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for MoneyMinor {}

impl Display for MoneyMinor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl MoneyMinor {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    /// Converts a provider-reported decimal amount in major units into minor units.
    /// Rejects non-finite values and values outside the representable range rather than guessing.
    pub fn try_from_major_f64(major: f64) -> Result<Self, MoneyMinorConversionError> {
        if !major.is_finite() {
            return Err(MoneyMinorConversionError(format!("{major} is not a finite amount")));
        }
        let minor = (major * 100.0).round();
        if minor.abs() > i64::MAX as f64 {
            return Err(MoneyMinorConversionError(format!("{major} is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(minor as i64))
    }

    /// The amount in major units as a decimal string, as provider APIs expect it.
    pub fn to_major_string(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn major_float_conversion() {
        assert_eq!(MoneyMinor::try_from_major_f64(45.9).unwrap(), MoneyMinor::from(4590));
        assert_eq!(MoneyMinor::try_from_major_f64(0.0).unwrap(), MoneyMinor::from(0));
        assert_eq!(MoneyMinor::try_from_major_f64(129.99).unwrap(), MoneyMinor::from(12999));
        assert!(MoneyMinor::try_from_major_f64(f64::NAN).is_err());
        assert!(MoneyMinor::try_from_major_f64(f64::INFINITY).is_err());
        assert!(MoneyMinor::try_from_major_f64(1e17).is_err());
    }

    #[test]
    fn display_is_major_units() {
        assert_eq!(MoneyMinor::from(4590).to_string(), "45.90");
        assert_eq!(MoneyMinor::from(5).to_string(), "0.05");
        assert_eq!(MoneyMinor::from(-12999).to_string(), "-129.99");
    }
}
