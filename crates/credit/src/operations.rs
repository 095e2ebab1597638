//! Client operation payloads
//!
//! Each payload carries the fee the submitter pays. Fee amounts come from
//! the chain's fee schedule; this crate only needs to know who pays.

use kcredit_core::{AccountId, AssetAmount};
use kcredit_oracle::ExchangeRateSetOperation;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::record::RecordId;

/// Operations that charge a fee to one account
pub trait FeeOperation {
    fn fee(&self) -> &AssetAmount;
    fn fee_payer(&self) -> &AccountId;
}

/// Open a credit request and lock the deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditRequestOperation {
    pub fee: AssetAmount,
    pub borrower: AccountId,
    pub loan_asset: AssetAmount,
    pub loan_period: u32,
    pub loan_percent: Decimal,
    pub loan_memo: String,
    pub deposit_asset: AssetAmount,
}

/// Fund an open request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditApproveOperation {
    pub fee: AssetAmount,
    pub creditor: AccountId,
    pub credit_memo: String,
    pub credit_request_id: RecordId,
}

/// Withdraw an unaccepted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditRequestCancelOperation {
    pub fee: AssetAmount,
    pub borrower: AccountId,
    pub credit_request_id: RecordId,
}

/// Attach a note to an unaccepted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentCreditRequestOperation {
    pub fee: AssetAmount,
    pub creditor: AccountId,
    pub credit_request_id: RecordId,
    pub credit_memo: String,
}

/// Pay off a running loan early
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleCreditOperation {
    pub fee: AssetAmount,
    pub borrower: AccountId,
    pub credit_request_id: RecordId,
}

macro_rules! fee_operation {
    ($op:ty, $payer:ident) => {
        impl FeeOperation for $op {
            fn fee(&self) -> &AssetAmount {
                &self.fee
            }

            fn fee_payer(&self) -> &AccountId {
                &self.$payer
            }
        }
    };
}

fee_operation!(CreditRequestOperation, borrower);
fee_operation!(CreditApproveOperation, creditor);
fee_operation!(CreditRequestCancelOperation, borrower);
fee_operation!(CommentCreditRequestOperation, creditor);
fee_operation!(SettleCreditOperation, borrower);
fee_operation!(ExchangeRateSetOperation, witness);
