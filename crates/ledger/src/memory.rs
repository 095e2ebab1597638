//! In-memory ledger
//!
//! A deterministic `Ledger` implementation backed by ordered maps.
//! Used by embedders that keep chain state in process and by tests.

use kcredit_core::{AccountId, AssetInfo, AssetSymbol, Timestamp};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::GlobalParameters;
use crate::error::LedgerError;
use crate::ledger::{AccountRecord, Ledger};

/// Karma range enforced by this implementation
pub const KARMA_MIN_VALUE: Decimal = Decimal::ZERO;
pub const KARMA_MAX_VALUE: Decimal = Decimal::from_parts(5, 0, 0, false, 0); // 5.0

/// Karma granted on account creation
pub const KARMA_INITIAL_VALUE: Decimal = Decimal::ONE;

/// In-memory chain state
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    now: Timestamp,
    parameters: GlobalParameters,
    assets: BTreeMap<AssetSymbol, AssetInfo>,
    accounts: BTreeMap<AccountId, AccountRecord>,
    witnesses: BTreeSet<AccountId>,
    /// Balance per (account, asset) in integer units, never negative
    balances: BTreeMap<(AccountId, AssetSymbol), i64>,
    supply: BTreeMap<AssetSymbol, i64>,
    karma: BTreeMap<AccountId, Decimal>,
}

impl InMemoryLedger {
    pub fn new(parameters: GlobalParameters, genesis_time: Timestamp) -> Self {
        Self {
            now: genesis_time,
            parameters,
            assets: BTreeMap::new(),
            accounts: BTreeMap::new(),
            witnesses: BTreeSet::new(),
            balances: BTreeMap::new(),
            supply: BTreeMap::new(),
            karma: BTreeMap::new(),
        }
    }

    pub fn register_asset(&mut self, info: AssetInfo) {
        self.supply.entry(info.symbol.clone()).or_insert(0);
        self.assets.insert(info.symbol.clone(), info);
    }

    /// Create an account with the initial karma value
    pub fn create_account(&mut self, id: &str, name: &str, referrer: Option<&str>) -> AccountId {
        let id = AccountId::new(id);
        self.accounts.insert(
            id.clone(),
            AccountRecord {
                id: id.clone(),
                name: name.to_string(),
                referrer: referrer.map(AccountId::new),
            },
        );
        self.karma.insert(id.clone(), KARMA_INITIAL_VALUE);
        id
    }

    pub fn set_active_witness(&mut self, account: &AccountId, active: bool) {
        if active {
            self.witnesses.insert(account.clone());
        } else {
            self.witnesses.remove(account);
        }
    }

    /// Mint new units straight into an account (genesis allocations, tests)
    pub fn issue(
        &mut self,
        account: &AccountId,
        asset: &AssetSymbol,
        amount: i64,
    ) -> Result<(), LedgerError> {
        self.adjust_supply(asset, amount)?;
        self.adjust_balance(account, asset, amount)
    }

    pub fn set_time(&mut self, now: Timestamp) {
        self.now = now;
    }

    pub fn advance(&mut self, by: chrono::Duration) {
        self.now += by;
    }

    pub fn parameters_mut(&mut self) -> &mut GlobalParameters {
        &mut self.parameters
    }

    /// Karma of an account (0 when unknown)
    pub fn karma(&self, account: &AccountId) -> Decimal {
        self.karma.get(account).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn supply(&self, asset: &AssetSymbol) -> i64 {
        self.supply.get(asset).copied().unwrap_or(0)
    }

    /// Sum of all balances of one asset
    pub fn total_balances(&self, asset: &AssetSymbol) -> i64 {
        self.balances
            .iter()
            .filter(|((_, a), _)| a == asset)
            .map(|(_, &balance)| balance)
            .sum()
    }

    /// Get all balances (for debugging/testing)
    pub fn all_balances(&self) -> &BTreeMap<(AccountId, AssetSymbol), i64> {
        &self.balances
    }
}

impl Ledger for InMemoryLedger {
    fn current_time(&self) -> Timestamp {
        self.now
    }

    fn global_parameters(&self) -> &GlobalParameters {
        &self.parameters
    }

    fn asset(&self, symbol: &AssetSymbol) -> Option<&AssetInfo> {
        self.assets.get(symbol)
    }

    fn resolve_account(&self, id: &AccountId) -> Option<AccountRecord> {
        self.accounts.get(id).cloned()
    }

    fn is_active_witness(&self, account: &AccountId) -> bool {
        self.witnesses.contains(account)
    }

    fn get_balance(&self, account: &AccountId, asset: &AssetSymbol) -> i64 {
        self.balances
            .get(&(account.clone(), asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn adjust_balance(
        &mut self,
        account: &AccountId,
        asset: &AssetSymbol,
        delta: i64,
    ) -> Result<(), LedgerError> {
        if !self.assets.contains_key(asset) {
            return Err(LedgerError::UnknownAsset(asset.to_string()));
        }

        let key = (account.clone(), asset.clone());
        let current = self.balances.get(&key).copied().unwrap_or(0);
        let updated = current.checked_add(delta).ok_or_else(|| LedgerError::Overflow {
            account: account.to_string(),
            asset: asset.to_string(),
        })?;

        if updated < 0 {
            return Err(LedgerError::InsufficientFunds {
                account: account.to_string(),
                asset: asset.to_string(),
                available: current,
                required: -delta,
            });
        }

        tracing::trace!(%account, %asset, delta, balance = updated, "Balance adjusted");
        self.balances.insert(key, updated);
        Ok(())
    }

    fn adjust_supply(&mut self, asset: &AssetSymbol, delta: i64) -> Result<(), LedgerError> {
        if !self.assets.contains_key(asset) {
            return Err(LedgerError::UnknownAsset(asset.to_string()));
        }

        let current = self.supply(asset);
        match current.checked_add(delta) {
            Some(updated) if updated >= 0 => {
                self.supply.insert(asset.clone(), updated);
                Ok(())
            }
            _ => Err(LedgerError::SupplyUnderflow {
                asset: asset.to_string(),
                current,
                delta,
            }),
        }
    }

    fn adjust_karma(&mut self, account: &AccountId, delta: Decimal) {
        let current = self.karma(account);
        let updated = (current + delta).clamp(KARMA_MIN_VALUE, KARMA_MAX_VALUE);
        tracing::debug!(%account, %delta, karma = %updated, "Karma adjusted");
        self.karma.insert(account.clone(), updated);
    }
}
