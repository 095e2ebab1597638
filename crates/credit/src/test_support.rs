//! Shared fixtures for the engine and settlement tests

use chrono::{TimeZone, Utc};
use kcredit_core::{AssetAmount, AssetInfo, AssetSymbol};
use kcredit_ledger::{GlobalParameters, InMemoryLedger, Ledger};
use kcredit_oracle::StaticRates;
use rust_decimal_macros::dec;

use crate::operations::{
    CommentCreditRequestOperation, CreditApproveOperation, CreditRequestCancelOperation,
    CreditRequestOperation, SettleCreditOperation,
};
use crate::record::RecordId;

pub const BORROWER: &str = "alice";
pub const CREDITOR: &str = "bob";
pub const REFERRER: &str = "carol";

fn sym(s: &str) -> AssetSymbol {
    s.parse().unwrap()
}

fn no_fee() -> AssetAmount {
    AssetAmount::zero(sym("KRM"))
}

/// Whole asset units at precision 5
pub fn units(whole: i64) -> i64 {
    whole * 100_000
}

/// KRM (reference) and USD at precision 5, USD priced at 1 KRM.
/// alice holds 10 000 KRM, bob 50 000 USD.
pub fn setup() -> (InMemoryLedger, StaticRates) {
    let genesis = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    let mut ledger = InMemoryLedger::new(GlobalParameters::default(), genesis);
    ledger.register_asset(AssetInfo::new("KRM", 5).unwrap());
    ledger.register_asset(AssetInfo::new("USD", 5).unwrap());

    ledger.create_account(BORROWER, "Alice", Some(REFERRER));
    ledger.create_account(CREDITOR, "Bob", None);
    ledger.create_account(REFERRER, "Carol", None);

    ledger
        .issue(&BORROWER.into(), &sym("KRM"), units(10_000))
        .unwrap();
    ledger
        .issue(&CREDITOR.into(), &sym("USD"), units(50_000))
        .unwrap();

    let rates = StaticRates::new(sym("KRM")).with_rate(sym("USD"), dec!(1));
    (ledger, rates)
}

pub fn balance(ledger: &InMemoryLedger, account: &str, asset: &str) -> i64 {
    ledger.get_balance(&account.into(), &sym(asset))
}

/// Burn an account's whole balance of one asset
pub fn drain(ledger: &mut InMemoryLedger, account: &str, asset: &str) {
    let held = balance(ledger, account, asset);
    ledger
        .adjust_balance(&account.into(), &sym(asset), -held)
        .unwrap();
    ledger.adjust_supply(&sym(asset), -held).unwrap();
}

/// 12 months at 12%, loan in USD, deposit in KRM (whole units)
pub fn request_op(loan: i64, deposit: i64) -> CreditRequestOperation {
    CreditRequestOperation {
        fee: no_fee(),
        borrower: BORROWER.into(),
        loan_asset: AssetAmount::new(sym("USD"), units(loan)),
        loan_period: 12,
        loan_percent: dec!(12),
        loan_memo: "equipment".to_string(),
        deposit_asset: AssetAmount::new(sym("KRM"), units(deposit)),
    }
}

pub fn approve_op(id: RecordId) -> CreditApproveOperation {
    CreditApproveOperation {
        fee: no_fee(),
        creditor: CREDITOR.into(),
        credit_memo: "approved".to_string(),
        credit_request_id: id,
    }
}

pub fn cancel_op(id: RecordId, borrower: &str) -> CreditRequestCancelOperation {
    CreditRequestCancelOperation {
        fee: no_fee(),
        borrower: borrower.into(),
        credit_request_id: id,
    }
}

pub fn comment_op(id: RecordId, creditor: &str, memo: &str) -> CommentCreditRequestOperation {
    CommentCreditRequestOperation {
        fee: no_fee(),
        creditor: creditor.into(),
        credit_request_id: id,
        credit_memo: memo.to_string(),
    }
}

pub fn settle_op(id: RecordId, borrower: &str) -> SettleCreditOperation {
    SettleCreditOperation {
        fee: no_fee(),
        borrower: borrower.into(),
        credit_request_id: id,
    }
}
