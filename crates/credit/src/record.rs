//! Credit record - the persisted state of one loan

use chrono::Datelike;
use kcredit_audit::AuditTrail;
use kcredit_core::{AccountId, AssetAmount, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// External identifier of a credit record
///
/// Derived deterministically (UUIDv5) so every replica computes the same
/// value for the same request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn derive(borrower: &AccountId, object_id: u64, created_at: Timestamp) -> Self {
        let name = format!(
            "kcredit:{}:{}:{}",
            borrower,
            object_id,
            created_at.timestamp_micros()
        );
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    WaitingForAcceptance,
    InProgress,
    Cancelled,
    CompleteNormal,
    CompleteAbnormal,
}

impl CreditStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CreditStatus::Cancelled | CreditStatus::CompleteNormal | CreditStatus::CompleteAbnormal
        )
    }
}

/// Borrower side of the request, fixed at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerInfo {
    pub borrower: AccountId,
    pub loan_memo: String,
    pub loan_asset: AssetAmount,
    /// Annual interest in percent
    pub loan_percent: Decimal,
    /// Term in months
    pub loan_period: u32,
    /// Collateral still held by the record
    pub deposit_asset: AssetAmount,
    /// No collateral was posted
    pub collateral_free: bool,
}

/// Creditor side, set on approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditorInfo {
    pub creditor: AccountId,
    pub credit_memo: String,
    /// Unrounded real value; truncated to the loan precision when paid
    pub monthly_payment: Decimal,
}

/// One loan, from request to completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditRecord {
    /// Ledger object sequence, the canonical processing order
    pub object_id: u64,
    pub id: RecordId,
    pub status: CreditStatus,
    pub borrower: BorrowerInfo,
    pub creditor: Option<CreditorInfo>,
    pub request_creation_time: Timestamp,
    pub request_approval_time: Option<Timestamp>,
    pub settle_month_elapsed: u32,
    /// Start of the grace period after a missed payment
    pub expired_time_start: Option<Timestamp>,
    /// Memo -> commenting account
    pub comments: BTreeMap<String, AccountId>,
    pub history: AuditTrail,
}

impl CreditRecord {
    pub fn is_in_progress(&self) -> bool {
        self.status == CreditStatus::InProgress
    }

    /// Whether the account is the borrower or the creditor
    pub fn involves(&self, account: &AccountId) -> bool {
        self.borrower.borrower == *account
            || self
                .creditor
                .as_ref()
                .map_or(false, |creditor| creditor.creditor == *account)
    }

    /// Months remaining on the schedule
    pub fn months_left(&self) -> u32 {
        self.borrower
            .loan_period
            .saturating_sub(self.settle_month_elapsed)
    }

    /// Calendar months since approval (`0` before approval)
    pub fn months_since_approval(&self, now: Timestamp) -> i64 {
        self.request_approval_time
            .map_or(0, |approved| calendar_months_between(approved, now))
    }

    /// A payment is due when calendar time ran ahead of settled months,
    /// or while a missed payment is still open
    pub fn is_payment_due(&self, now: Timestamp) -> bool {
        self.expired_time_start.is_some()
            || self.months_since_approval(now) > self.settle_month_elapsed as i64
    }
}

/// `(year difference) * 12 + (month difference)`, day of month ignored
pub fn calendar_months_between(from: Timestamp, to: Timestamp) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}
