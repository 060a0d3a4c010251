//! Module prices.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Non-negative, finite price of one module query.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Price(f64);

impl Price {
    /// A free module.
    pub const FREE: Self = Self(0.0);

    /// Wrap a price.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is negative, NaN or infinite.
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::InvalidPrice(format!("{value} is not a finite amount")));
        }
        if value < 0.0 {
            return Err(Error::InvalidPrice(format!("{value} is negative")));
        }
        // Normalizes -0.0.
        Ok(Self(value.abs()))
    }

    /// Parse a decimal string such as `"10.00"`.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not a non-negative decimal amount.
    pub fn parse(s: &str) -> Result<Self> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidPrice(format!("{s:?} is not a decimal amount")))?;
        Self::new(value)
    }

    /// The amount.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Returns true for a zero price.
    #[must_use]
    pub fn is_free(self) -> bool {
        self.0 <= 0.0
    }
}

impl FromStr for Price {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
