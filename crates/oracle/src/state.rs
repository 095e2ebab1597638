//! Exchange rate aggregation state
//!
//! Witnesses submit rates per asset. Submissions collect in an open
//! interval until a periodic check finds a quorum, at which point the
//! median is published as the accepted rate.

use kcredit_core::{AccountId, AssetSymbol, Timestamp};
use kcredit_ledger::{GlobalParameters, Ledger};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::OracleError;
use crate::types::{AcceptedRate, ExchangeRateSetOperation, RateInterval, RateSource};

/// Outcome of one periodic pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Assets whose median was published
    pub published: Vec<AssetSymbol>,
    /// Assets whose interval hit the max age without quorum
    pub expired: Vec<AssetSymbol>,
}

/// Chain-wide exchange rate state, created once at genesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateState {
    reference_asset: AssetSymbol,
    /// Pending submissions keyed by (asset, witness)
    submissions: BTreeMap<(AssetSymbol, AccountId), Decimal>,
    intervals: BTreeMap<AssetSymbol, RateInterval>,
    accepted: BTreeMap<AssetSymbol, AcceptedRate>,
}

impl ExchangeRateState {
    pub fn genesis(reference_asset: AssetSymbol) -> Self {
        Self {
            reference_asset,
            submissions: BTreeMap::new(),
            intervals: BTreeMap::new(),
            accepted: BTreeMap::new(),
        }
    }

    /// Seed an accepted rate (genesis configuration, tests)
    pub fn with_initial_rate(mut self, asset: AssetSymbol, rate: Decimal, at: Timestamp) -> Self {
        self.accepted.insert(
            asset,
            AcceptedRate {
                rate,
                accepted_at: at,
                witnesses: 0,
            },
        );
        self
    }

    pub fn reference_asset(&self) -> &AssetSymbol {
        &self.reference_asset
    }

    /// Check a submission without touching state
    pub fn evaluate<L: Ledger>(
        &self,
        ledger: &L,
        op: &ExchangeRateSetOperation,
    ) -> Result<(), OracleError> {
        if !ledger.is_active_witness(&op.witness) {
            return Err(OracleError::Unauthorized {
                account: op.witness.to_string(),
            });
        }
        if op.exchange_rate.is_empty() {
            return Err(OracleError::EmptySubmission);
        }

        for (asset, rate) in &op.exchange_rate {
            if *asset == self.reference_asset {
                return Err(OracleError::InvalidRate {
                    asset: asset.to_string(),
                    reason: "reference asset has a fixed rate".to_string(),
                });
            }
            if ledger.asset(asset).is_none() {
                return Err(OracleError::UnknownAsset {
                    asset: asset.to_string(),
                });
            }
            if *rate <= Decimal::ZERO {
                return Err(OracleError::InvalidRate {
                    asset: asset.to_string(),
                    reason: format!("rate must be positive, got {}", rate),
                });
            }
        }
        Ok(())
    }

    /// Validate then record every rate of the submission
    ///
    /// A repeated submission by the same witness overwrites its previous
    /// value for that asset.
    pub fn submit<L: Ledger>(
        &mut self,
        ledger: &L,
        op: &ExchangeRateSetOperation,
    ) -> Result<(), OracleError> {
        self.evaluate(ledger, op)?;

        let now = ledger.current_time();
        for (asset, rate) in &op.exchange_rate {
            self.submissions
                .insert((asset.clone(), op.witness.clone()), *rate);
            self.intervals
                .entry(asset.clone())
                .or_insert(RateInterval {
                    opened_at: now,
                    last_checked: now,
                });
            tracing::debug!(witness = %op.witness, asset = %asset, %rate, "Exchange rate submitted");
        }
        Ok(())
    }

    /// Publish medians for intervals that reached quorum, expire stale ones
    pub fn process(&mut self, now: Timestamp, params: &GlobalParameters) -> ProcessReport {
        let min_interval = params.min_interval();
        let max_interval = params.max_interval();
        let quorum = params.min_witnesses_for_exchange_rate as usize;

        let mut report = ProcessReport::default();
        let due: Vec<AssetSymbol> = self
            .intervals
            .iter()
            .filter(|(_, interval)| now - interval.last_checked >= min_interval)
            .map(|(asset, _)| asset.clone())
            .collect();

        for asset in due {
            let rates = self.pending_rates(&asset);

            if rates.len() >= quorum {
                if let Some(rate) = median(&rates) {
                    tracing::info!(asset = %asset, %rate, witnesses = rates.len(), "Exchange rate published");
                    self.accepted.insert(
                        asset.clone(),
                        AcceptedRate {
                            rate,
                            accepted_at: now,
                            witnesses: rates.len() as u32,
                        },
                    );
                    self.clear(&asset);
                    report.published.push(asset);
                    continue;
                }
            }

            let expired = match self.intervals.get_mut(&asset) {
                Some(interval) => {
                    interval.last_checked = now;
                    now - interval.opened_at >= max_interval
                }
                None => false,
            };
            if expired {
                tracing::warn!(asset = %asset, submissions = rates.len(), "Exchange rate interval expired without quorum");
                self.clear(&asset);
                report.expired.push(asset);
            }
        }
        report
    }

    /// Number of pending submissions for an asset
    pub fn submission_count(&self, asset: &AssetSymbol) -> usize {
        self.pending(asset).count()
    }

    pub fn interval(&self, asset: &AssetSymbol) -> Option<&RateInterval> {
        self.intervals.get(asset)
    }

    pub fn accepted(&self, asset: &AssetSymbol) -> Option<&AcceptedRate> {
        self.accepted.get(asset)
    }

    fn pending<'a>(
        &'a self,
        asset: &'a AssetSymbol,
    ) -> impl Iterator<Item = (&'a AccountId, &'a Decimal)> + 'a {
        self.submissions
            .range((asset.clone(), AccountId::new(""))..)
            .take_while(move |((a, _), _)| a == asset)
            .map(|((_, witness), rate)| (witness, rate))
    }

    fn pending_rates(&self, asset: &AssetSymbol) -> Vec<Decimal> {
        self.pending(asset).map(|(_, rate)| *rate).collect()
    }

    fn clear(&mut self, asset: &AssetSymbol) {
        self.submissions.retain(|(a, _), _| a != asset);
        self.intervals.remove(asset);
    }
}

impl RateSource for ExchangeRateState {
    fn rate_for(&self, asset: &AssetSymbol) -> Result<Decimal, OracleError> {
        if *asset == self.reference_asset {
            return Ok(Decimal::ONE);
        }
        self.accepted
            .get(asset)
            .map(|accepted| accepted.rate)
            .ok_or_else(|| OracleError::RateUnavailable {
                asset: asset.to_string(),
            })
    }
}

/// Median of a set of rates; mean of the two middle values for even counts
pub fn median(rates: &[Decimal]) -> Option<Decimal> {
    if rates.is_empty() {
        return None;
    }
    let mut sorted = rates.to_vec();
    sorted.sort();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        sorted[mid - 1]
            .checked_add(sorted[mid])
            .map(|sum| sum / Decimal::TWO)
    }
}
