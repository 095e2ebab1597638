//! Asset - Type-safe asset symbols and fixed-point precision
//!
//! The ledger stores balances as integers scaled by `10^precision`.
//! `AssetInfo` is the single place where real values cross into that
//! integer representation.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest precision an asset may declare
pub const MAX_PRECISION: u8 = 12;

/// Errors that can occur when parsing symbols or scaling amounts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("Empty asset symbol")]
    EmptySymbol,

    #[error("Asset symbol too long (max 16 chars): {0}")]
    TooLong(String),

    #[error("Invalid asset symbol format: {0}")]
    InvalidFormat(String),

    #[error("Invalid precision {precision} for {symbol} (max {max})", max = MAX_PRECISION)]
    InvalidPrecision { symbol: String, precision: u8 },

    #[error("Amount {value} of {symbol} does not fit the ledger representation")]
    Overflow { symbol: String, value: Decimal },
}

/// Asset symbol (e.g. `KRM`, `USD`, `BTC`)
///
/// Symbols are upper-cased on parse and may contain ASCII letters,
/// digits and dots.
///
/// # Examples
/// ```
/// use kcredit_core::AssetSymbol;
///
/// let usd: AssetSymbol = "usd".parse().unwrap();
/// assert_eq!(usd.as_str(), "USD");
/// assert!("".parse::<AssetSymbol>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetSymbol(String);

impl AssetSymbol {
    /// Create a symbol without validation.
    ///
    /// # Safety
    /// The caller MUST pass an upper-case symbol that `from_str` would accept.
    /// Use only for compile-time constants.
    pub fn new_unchecked(symbol: &str) -> Self {
        Self(symbol.to_string())
    }

    /// Returns the symbol as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AssetSymbol {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();

        if s.is_empty() {
            return Err(AssetError::EmptySymbol);
        }

        if s.len() > 16 {
            return Err(AssetError::TooLong(s));
        }

        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '.')
            || s.starts_with('.')
            || s.ends_with('.')
        {
            return Err(AssetError::InvalidFormat(s));
        }

        Ok(Self(s))
    }
}

impl TryFrom<String> for AssetSymbol {
    type Error = AssetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AssetSymbol> for String {
    fn from(symbol: AssetSymbol) -> Self {
        symbol.0
    }
}

/// Asset metadata: symbol plus declared decimal precision
///
/// # Example
/// ```
/// use kcredit_core::AssetInfo;
/// use rust_decimal::Decimal;
///
/// let krm = AssetInfo::new("KRM", 5).unwrap();
/// assert_eq!(krm.to_units(Decimal::new(15, 1)).unwrap(), 150_000);
/// assert_eq!(krm.to_real(150_000), Decimal::new(15, 1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawAssetInfo")]
pub struct AssetInfo {
    pub symbol: AssetSymbol,
    /// Only set through `new` or deserialization, both bounded by `MAX_PRECISION`
    precision: u8,
}

/// Unvalidated wire form of `AssetInfo`
#[derive(Deserialize)]
struct RawAssetInfo {
    symbol: AssetSymbol,
    precision: u8,
}

impl TryFrom<RawAssetInfo> for AssetInfo {
    type Error = AssetError;

    fn try_from(raw: RawAssetInfo) -> Result<Self, Self::Error> {
        Self::with_symbol(raw.symbol, raw.precision)
    }
}

impl AssetInfo {
    /// Create asset metadata, validating symbol and precision
    pub fn new(symbol: &str, precision: u8) -> Result<Self, AssetError> {
        Self::with_symbol(symbol.parse()?, precision)
    }

    /// Same as `new` for an already parsed symbol
    pub fn with_symbol(symbol: AssetSymbol, precision: u8) -> Result<Self, AssetError> {
        if precision > MAX_PRECISION {
            return Err(AssetError::InvalidPrecision {
                symbol: symbol.to_string(),
                precision,
            });
        }
        Ok(Self { symbol, precision })
    }

    /// Declared decimal places
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// `10^precision`
    pub fn scale(&self) -> Decimal {
        Decimal::from(10i64.pow(self.precision as u32))
    }

    /// Convert a real value into integer ledger units.
    ///
    /// Digits beyond the asset precision are truncated toward zero.
    pub fn to_units(&self, value: Decimal) -> Result<i64, AssetError> {
        value
            .checked_mul(self.scale())
            .map(|scaled| scaled.trunc())
            .and_then(|scaled| scaled.to_i64())
            .ok_or_else(|| AssetError::Overflow {
                symbol: self.symbol.to_string(),
                value,
            })
    }

    /// Convert integer ledger units into an exact real value
    pub fn to_real(&self, units: i64) -> Decimal {
        Decimal::new(units, self.precision as u32)
    }

    /// Human readable amount, e.g. `12.50000 KRM`
    pub fn format_units(&self, units: i64) -> String {
        format!("{} {}", self.to_real(units), self.symbol)
    }
}
