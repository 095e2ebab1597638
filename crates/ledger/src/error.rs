//! Ledger errors

use thiserror::Error;

/// Errors surfaced by ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance for {account} in {asset}: available {available}, required {required}")]
    InsufficientFunds {
        account: String,
        asset: String,
        available: i64,
        required: i64,
    },

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Supply of {asset} cannot go below zero (current {current}, delta {delta})")]
    SupplyUnderflow {
        asset: String,
        current: i64,
        delta: i64,
    },

    #[error("Balance overflow for {account} in {asset}")]
    Overflow { account: String, asset: String },

    #[error("Invalid global parameters: {0}")]
    InvalidParameters(String),
}
