//! Fixed-rate source for testing
//!
//! Provides configurable rates for valuation and settlement tests without
//! running witness rounds.

use kcredit_core::AssetSymbol;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::error::OracleError;
use crate::types::RateSource;

/// Rate source backed by a plain map
///
/// The reference asset always resolves to 1.
#[derive(Debug, Clone)]
pub struct StaticRates {
    reference_asset: AssetSymbol,
    rates: BTreeMap<AssetSymbol, Decimal>,
}

impl StaticRates {
    pub fn new(reference_asset: AssetSymbol) -> Self {
        Self {
            reference_asset,
            rates: BTreeMap::new(),
        }
    }

    /// Builder-style rate setter
    pub fn with_rate(mut self, asset: AssetSymbol, rate: Decimal) -> Self {
        self.rates.insert(asset, rate);
        self
    }

    pub fn set_rate(&mut self, asset: AssetSymbol, rate: Decimal) {
        self.rates.insert(asset, rate);
    }

    /// Remove a rate (for testing the unavailable path)
    pub fn remove_rate(&mut self, asset: &AssetSymbol) {
        self.rates.remove(asset);
    }
}

impl RateSource for StaticRates {
    fn rate_for(&self, asset: &AssetSymbol) -> Result<Decimal, OracleError> {
        if *asset == self.reference_asset {
            return Ok(Decimal::ONE);
        }
        self.rates
            .get(asset)
            .copied()
            .ok_or_else(|| OracleError::RateUnavailable {
                asset: asset.to_string(),
            })
    }
}
