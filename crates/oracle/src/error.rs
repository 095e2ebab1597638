//! Oracle error types

use thiserror::Error;

/// Oracle-related errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Submitter is not in the active witness set
    #[error("Only active witnesses can set exchange rates: {account}")]
    Unauthorized { account: String },

    /// Asset is not registered on the ledger
    #[error("Could not find asset matching {asset}")]
    UnknownAsset { asset: String },

    /// Rate rejected (non-positive, or set for the reference asset)
    #[error("Invalid exchange rate for {asset}: {reason}")]
    InvalidRate { asset: String, reason: String },

    /// No median has been accepted for the asset yet
    #[error("Exchange rate for {asset} has not been set")]
    RateUnavailable { asset: String },

    /// Submission carries no rates
    #[error("Exchange rate submission is empty")]
    EmptySubmission,

    /// Valuation exceeded the decimal range
    #[error("Valuation overflow for {asset}")]
    Overflow { asset: String },
}
