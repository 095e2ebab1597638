//! KCredit Credit Engine
//!
//! Collateralized peer-to-peer loans:
//! - `amortization`: monthly payment and schedule math
//! - `engine`: request, approve, cancel, comment and early settlement
//! - `settlement`: the periodic tick (payments, grace period, margin calls)
//!
//! Balances move only through the `Ledger` trait. Collateral is valued
//! through a `RateSource`, normally the witness-fed `ExchangeRateState`.

pub mod amortization;
pub mod engine;
pub mod error;
pub mod operations;
pub mod record;
pub mod rules;
pub mod settlement;

#[cfg(test)]
mod test_support;

pub use amortization::{calculate_monthly_payment, monthly_interest, remaining_principal};
pub use engine::CreditEngine;
pub use error::CreditError;
pub use operations::{
    CommentCreditRequestOperation, CreditApproveOperation, CreditRequestCancelOperation,
    CreditRequestOperation, FeeOperation, SettleCreditOperation,
};
pub use record::{BorrowerInfo, CreditRecord, CreditStatus, CreditorInfo, RecordId};
pub use rules::{
    RuleSet, KARMA_CREDIT_DEFAULT, KARMA_CREDIT_REPAID, KARMA_MONTHLY_DELAY,
    KARMA_MONTHLY_PAYMENT,
};
pub use settlement::{CreditOutcome, ProcessSummary};
