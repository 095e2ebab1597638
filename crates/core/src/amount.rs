//! AssetAmount - Integer fixed-point amount of a single asset
//!
//! This is the representation the ledger stores and operations carry:
//! `amount` is already scaled by the asset's `10^precision`.

use crate::asset::AssetSymbol;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An amount of one asset in integer ledger units.
///
/// The value is signed so that request payloads can be validated
/// (negative amounts are rejected by the operations, not by the type).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetAmount {
    pub asset: AssetSymbol,
    pub amount: i64,
}

impl AssetAmount {
    pub fn new(asset: AssetSymbol, amount: i64) -> Self {
        Self { asset, amount }
    }

    /// Zero amount of the given asset
    pub fn zero(asset: AssetSymbol) -> Self {
        Self { asset, amount: 0 }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }

    /// Same asset, amount replaced
    pub fn with_amount(&self, amount: i64) -> Self {
        Self {
            asset: self.asset.clone(),
            amount,
        }
    }
}

impl fmt::Display for AssetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.asset)
    }
}
