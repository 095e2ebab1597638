//! Core oracle types

use kcredit_core::{AccountId, AssetAmount, AssetSymbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::OracleError;

/// Rate submission by one witness, possibly covering several assets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateSetOperation {
    pub fee: AssetAmount,
    pub witness: AccountId,
    /// Asset symbol -> price of one unit in the reference asset
    pub exchange_rate: BTreeMap<AssetSymbol, Decimal>,
}

impl ExchangeRateSetOperation {
    pub fn new(fee: AssetAmount, witness: AccountId) -> Self {
        Self {
            fee,
            witness,
            exchange_rate: BTreeMap::new(),
        }
    }

    /// Builder-style helper adding one rate
    pub fn rate(mut self, asset: AssetSymbol, rate: Decimal) -> Self {
        self.exchange_rate.insert(asset, rate);
        self
    }
}

/// Open aggregation window of one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateInterval {
    /// Time of the first submission in this window
    pub opened_at: Timestamp,
    /// Last time the quorum was checked
    pub last_checked: Timestamp,
}

/// Published median
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedRate {
    pub rate: Decimal,
    pub accepted_at: Timestamp,
    /// Number of witness submissions the median was computed from
    pub witnesses: u32,
}

/// Read side of the oracle, consumed by the credit engine
///
/// Rates are quoted in the reference asset: valuing `amount` of an asset
/// means `amount * rate_for(asset)`.
pub trait RateSource {
    /// Last accepted rate; the reference asset is always 1
    fn rate_for(&self, asset: &AssetSymbol) -> Result<Decimal, OracleError>;

    /// Value of a real amount in reference units
    fn value_of(&self, asset: &AssetSymbol, amount: Decimal) -> Result<Decimal, OracleError> {
        let rate = self.rate_for(asset)?;
        amount.checked_mul(rate).ok_or_else(|| OracleError::Overflow {
            asset: asset.to_string(),
        })
    }

    /// Amount of `to` worth the same as `amount` of `from`
    fn convert(
        &self,
        from: &AssetSymbol,
        to: &AssetSymbol,
        amount: Decimal,
    ) -> Result<Decimal, OracleError> {
        if from == to {
            return Ok(amount);
        }
        let value = self.value_of(from, amount)?;
        let target_rate = self.rate_for(to)?;
        value
            .checked_div(target_rate)
            .ok_or_else(|| OracleError::Overflow {
                asset: to.to_string(),
            })
    }
}
