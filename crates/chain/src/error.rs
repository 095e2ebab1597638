//! Facade errors

use kcredit_audit::AuditError;
use kcredit_credit::CreditError;
use kcredit_ledger::LedgerError;
use kcredit_oracle::OracleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Invalid fee: {0}")]
    InvalidFee(String),

    #[error("Fee not covered: {account} holds {available} {asset}, fee is {required}")]
    InsufficientFee {
        account: String,
        asset: String,
        available: i64,
        required: i64,
    },

    #[error("Credit error: {0}")]
    Credit(#[from] CreditError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),
}

impl ChainError {
    /// The credit-level error, if this is one
    pub fn as_credit(&self) -> Option<&CreditError> {
        match self {
            ChainError::Credit(e) => Some(e),
            _ => None,
        }
    }
}
