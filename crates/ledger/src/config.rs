//! Global parameters for the credit subsystem
//!
//! Every field has a serde default so a partial JSON document (or none at
//! all) yields a usable configuration. Values are chain-wide: all replicas
//! must load the same parameters.

use kcredit_core::{AccountId, AssetSymbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Chain-wide parameters read by the credit engine and the rate aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalParameters {
    /// Core asset, the common denominator for valuations (implicit rate 1)
    #[serde(default = "default_reference_asset")]
    pub reference_asset: AssetSymbol,

    /// Minimum collateral as percent of loan value at request time
    #[serde(default = "default_deposit_percent")]
    pub deposit_percent: u32,

    /// Seconds between quorum checks for an open rate interval
    #[serde(default = "default_min_interval")]
    pub exchange_rate_min_interval_secs: u32,

    /// Seconds after which an interval without quorum is dropped
    #[serde(default = "default_max_interval")]
    pub exchange_rate_max_interval_secs: u32,

    /// Distinct witness submissions required to publish a median
    #[serde(default = "default_min_witnesses")]
    pub min_witnesses_for_exchange_rate: u32,

    #[serde(default = "default_seconds_per_day")]
    pub seconds_per_day: u32,

    /// Grace period for a missed monthly payment, in days
    #[serde(default = "default_max_expiration_days")]
    pub max_expiration_days: u32,

    /// Clearing account that receives collateral converted into the loan asset
    #[serde(default = "default_conversion_account")]
    pub conversion_account: AccountId,

    /// Account receiving operation fees
    #[serde(default = "default_fee_account")]
    pub fee_account: AccountId,

    /// Optional revenue split carved out of each approved loan
    #[serde(default)]
    pub bonus_split: Option<BonusSplitConfig>,

    #[serde(default)]
    pub rule_activations: RuleActivations,
}

/// Revenue split paid out of the loan amount on approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusSplitConfig {
    pub recipients: Vec<BonusRecipient>,
}

/// One carve-out: a fixed percent of the loan amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusRecipient {
    pub target: BonusTarget,
    pub percent: Decimal,
}

/// Who receives a carve-out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "account")]
pub enum BonusTarget {
    /// A designated bonus account
    Account(AccountId),
    /// The borrower's referrer; skipped when the borrower has none
    Referrer,
}

/// Activation times of versioned rule changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleActivations {
    /// Approval pays bonus carve-outs from this time on
    #[serde(default)]
    pub revenue_split: Timestamp,

    /// Payments and defaults move borrower karma from this time on
    #[serde(default)]
    pub karma_accounting: Timestamp,
}

impl Default for RuleActivations {
    fn default() -> Self {
        Self {
            revenue_split: Timestamp::default(),
            karma_accounting: Timestamp::default(),
        }
    }
}

fn default_reference_asset() -> AssetSymbol {
    AssetSymbol::new_unchecked("KRM")
}

fn default_deposit_percent() -> u32 {
    300
}

fn default_min_interval() -> u32 {
    600 // 10 minutes
}

fn default_max_interval() -> u32 {
    86_400 // 1 day
}

fn default_min_witnesses() -> u32 {
    3
}

fn default_seconds_per_day() -> u32 {
    86_400
}

fn default_max_expiration_days() -> u32 {
    7
}

fn default_conversion_account() -> AccountId {
    AccountId::new("karma")
}

fn default_fee_account() -> AccountId {
    AccountId::new("committee-account")
}

impl Default for GlobalParameters {
    fn default() -> Self {
        Self {
            reference_asset: default_reference_asset(),
            deposit_percent: default_deposit_percent(),
            exchange_rate_min_interval_secs: default_min_interval(),
            exchange_rate_max_interval_secs: default_max_interval(),
            min_witnesses_for_exchange_rate: default_min_witnesses(),
            seconds_per_day: default_seconds_per_day(),
            max_expiration_days: default_max_expiration_days(),
            conversion_account: default_conversion_account(),
            fee_account: default_fee_account(),
            bonus_split: None,
            rule_activations: RuleActivations::default(),
        }
    }
}

impl GlobalParameters {
    /// Load parameters from a JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Reject parameter sets the engine cannot operate with
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.deposit_percent == 0 {
            return Err(LedgerError::InvalidParameters(
                "deposit_percent must be positive".to_string(),
            ));
        }
        if self.min_witnesses_for_exchange_rate == 0 {
            return Err(LedgerError::InvalidParameters(
                "min_witnesses_for_exchange_rate must be positive".to_string(),
            ));
        }
        if self.exchange_rate_max_interval_secs < self.exchange_rate_min_interval_secs {
            return Err(LedgerError::InvalidParameters(
                "exchange_rate_max_interval_secs is below the min interval".to_string(),
            ));
        }
        if let Some(split) = &self.bonus_split {
            let mut total = Decimal::ZERO;
            for recipient in &split.recipients {
                if recipient.percent <= Decimal::ZERO {
                    return Err(LedgerError::InvalidParameters(format!(
                        "bonus percent must be positive, got {}",
                        recipient.percent
                    )));
                }
                total += recipient.percent;
            }
            if total >= Decimal::ONE_HUNDRED {
                return Err(LedgerError::InvalidParameters(format!(
                    "bonus split totals {}% of the loan",
                    total
                )));
            }
        }
        Ok(())
    }

    pub fn min_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.exchange_rate_min_interval_secs as i64)
    }

    pub fn max_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.exchange_rate_max_interval_secs as i64)
    }

    /// How long a missed payment may stay unpaid before deposit liquidation
    pub fn grace_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_expiration_days as i64 * self.seconds_per_day as i64)
    }
}
