//! The ledger interface consumed by the credit core

use kcredit_core::{AccountId, AssetInfo, AssetSymbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::GlobalParameters;
use crate::error::LedgerError;

/// Account data the credit core needs for audit text and bonus routing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub name: String,
    pub referrer: Option<AccountId>,
}

/// One signed balance change inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDelta {
    pub account: AccountId,
    pub asset: AssetSymbol,
    pub delta: i64,
}

impl BalanceDelta {
    pub fn new(account: AccountId, asset: AssetSymbol, delta: i64) -> Self {
        Self {
            account,
            asset,
            delta,
        }
    }

    /// Pair of deltas moving `amount` from `from` to `to`
    pub fn transfer(from: &AccountId, to: &AccountId, asset: &AssetSymbol, amount: i64) -> [Self; 2] {
        [
            Self::new(from.clone(), asset.clone(), -amount),
            Self::new(to.clone(), asset.clone(), amount),
        ]
    }
}

/// Balance store, clock and chain metadata as seen by the credit core.
///
/// Implementations must be deterministic: the same sequence of calls on the
/// same pre-state produces the same post-state on every replica.
pub trait Ledger {
    /// Head block time
    fn current_time(&self) -> Timestamp;

    fn global_parameters(&self) -> &GlobalParameters;

    /// Asset metadata by symbol
    fn asset(&self, symbol: &AssetSymbol) -> Option<&AssetInfo>;

    fn resolve_account(&self, id: &AccountId) -> Option<AccountRecord>;

    /// Whether the account currently belongs to the active witness set
    fn is_active_witness(&self, account: &AccountId) -> bool;

    /// Balance in integer units (0 when the account never held the asset)
    fn get_balance(&self, account: &AccountId, asset: &AssetSymbol) -> i64;

    /// Apply a signed change; fails with `InsufficientFunds` if the result
    /// would be negative, leaving the balance untouched.
    fn adjust_balance(
        &mut self,
        account: &AccountId,
        asset: &AssetSymbol,
        delta: i64,
    ) -> Result<(), LedgerError>;

    /// Issue (positive) or retire (negative) asset supply
    fn adjust_supply(&mut self, asset: &AssetSymbol, delta: i64) -> Result<(), LedgerError>;

    /// Narrow hook into karma accounting
    fn adjust_karma(&mut self, account: &AccountId, delta: Decimal);

    /// Asset metadata or `UnknownAsset`
    fn require_asset(&self, symbol: &AssetSymbol) -> Result<AssetInfo, LedgerError> {
        self.asset(symbol)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownAsset(symbol.to_string()))
    }

    /// Account record or `AccountNotFound`
    fn require_account(&self, id: &AccountId) -> Result<AccountRecord, LedgerError> {
        self.resolve_account(id)
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    /// Project the batch against current balances
    ///
    /// Returns the first `(account, asset)` that would end up negative.
    fn check_batch(&self, deltas: &[BalanceDelta]) -> Result<(), LedgerError> {
        for (account, asset, net) in net_deltas(deltas) {
            if self.asset(&asset).is_none() {
                return Err(LedgerError::UnknownAsset(asset.to_string()));
            }
            let available = self.get_balance(&account, &asset);
            let projected = available.checked_add(net).ok_or_else(|| LedgerError::Overflow {
                account: account.to_string(),
                asset: asset.to_string(),
            })?;
            if projected < 0 {
                return Err(LedgerError::InsufficientFunds {
                    account: account.to_string(),
                    asset: asset.to_string(),
                    available,
                    required: -net,
                });
            }
        }
        Ok(())
    }

    /// Apply every delta or none of them.
    ///
    /// Deltas are netted per `(account, asset)` and checked before the first
    /// mutation, so a failing batch leaves all balances unchanged.
    fn apply_batch(&mut self, deltas: &[BalanceDelta]) -> Result<(), LedgerError> {
        self.check_batch(deltas)?;
        for (account, asset, net) in net_deltas(deltas) {
            if net != 0 {
                self.adjust_balance(&account, &asset, net)?;
            }
        }
        Ok(())
    }
}

/// Net deltas per (account, asset) in canonical order
fn net_deltas(deltas: &[BalanceDelta]) -> Vec<(AccountId, AssetSymbol, i64)> {
    let mut netted: BTreeMap<(AccountId, AssetSymbol), i64> = BTreeMap::new();
    for delta in deltas {
        let entry = netted
            .entry((delta.account.clone(), delta.asset.clone()))
            .or_insert(0);
        *entry = entry.saturating_add(delta.delta);
    }
    netted
        .into_iter()
        .map(|((account, asset), net)| (account, asset, net))
        .collect()
}
