//! KCredit Ledger - the interface the credit core consumes
//!
//! The surrounding chain owns balances, accounts, assets and the clock.
//! The credit core only reaches them through the [`Ledger`] trait.
//!
//! # Key Types
//! - `Ledger`: Balance adjustment/query, clock, parameters, account and asset lookup
//! - `BalanceDelta`: One signed change inside an all-or-nothing batch
//! - `GlobalParameters`: Chain-wide credit and exchange-rate configuration
//! - `InMemoryLedger`: Deterministic in-process implementation

pub mod config;
pub mod error;
pub mod ledger;
pub mod memory;

pub use config::{BonusRecipient, BonusSplitConfig, BonusTarget, GlobalParameters, RuleActivations};
pub use error::LedgerError;
pub use ledger::{AccountRecord, BalanceDelta, Ledger};
pub use memory::{InMemoryLedger, KARMA_INITIAL_VALUE, KARMA_MAX_VALUE, KARMA_MIN_VALUE};
