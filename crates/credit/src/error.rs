//! Credit engine errors

use kcredit_core::AssetError;
use kcredit_ledger::LedgerError;
use kcredit_oracle::OracleError;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::record::RecordId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreditError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid loan term: {0}")]
    InvalidTerm(String),

    #[error("Deposit value {deposit_value} is below the required {required}")]
    UndercollateralizedRequest {
        deposit_value: Decimal,
        required: Decimal,
    },

    #[error("Insufficient balance for {account}: available {available} {asset}, required {required}")]
    InsufficientFunds {
        account: String,
        asset: String,
        available: i64,
        required: i64,
    },

    #[error("Credit request not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Credit request already accepted: {0}")]
    AlreadyAccepted(RecordId),

    #[error("Credit {0} is not in progress")]
    NotInProgress(RecordId),

    #[error("Account {account} is not the borrower of credit {record}")]
    Unauthorized { account: String, record: RecordId },

    #[error("Exchange rate for {0} has not been set")]
    RateUnavailable(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Invalid exchange rate: {0}")]
    InvalidRate(String),

    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Oracle error: {0}")]
    Oracle(OracleError),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for CreditError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                account,
                asset,
                available,
                required,
            } => CreditError::InsufficientFunds {
                account,
                asset,
                available,
                required,
            },
            LedgerError::UnknownAsset(asset) => CreditError::UnknownAsset(asset),
            other => CreditError::Ledger(other),
        }
    }
}

impl From<OracleError> for CreditError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::RateUnavailable { asset } => CreditError::RateUnavailable(asset),
            OracleError::UnknownAsset { asset } => CreditError::UnknownAsset(asset),
            OracleError::InvalidRate { asset, reason } => {
                CreditError::InvalidRate(format!("{}: {}", asset, reason))
            }
            other => CreditError::Oracle(other),
        }
    }
}
