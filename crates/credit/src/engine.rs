//! Credit engine - owns the credit records and applies client operations
//!
//! Every operation runs all of its guards before the first balance change.
//! Multi-leg transfers go through `Ledger::apply_batch`, so a failing
//! operation leaves no trace.

use kcredit_audit::{AuditEvent, Money};
use kcredit_core::{AccountId, AssetInfo};
use kcredit_ledger::{BalanceDelta, BonusTarget, Ledger};
use kcredit_oracle::RateSource;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::amortization::{calculate_monthly_payment, monthly_interest};
use crate::error::CreditError;
use crate::operations::{
    CommentCreditRequestOperation, CreditApproveOperation, CreditRequestCancelOperation,
    CreditRequestOperation, SettleCreditOperation,
};
use crate::record::{BorrowerInfo, CreditRecord, CreditStatus, CreditorInfo, RecordId};
use crate::rules::RuleSet;

/// Credit Engine
///
/// Records are keyed by object id, which is also the canonical order of
/// periodic processing. `RecordId` lookups go through a secondary index.
#[derive(Debug, Clone, Default)]
pub struct CreditEngine {
    records: BTreeMap<u64, CreditRecord>,
    index: BTreeMap<RecordId, u64>,
    next_object_id: u64,
}

impl CreditEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a credit request (`credit_request`)
    ///
    /// Locks the deposit in the record. A non-zero deposit must be worth at
    /// least `deposit_percent`% of the loan in reference units.
    pub fn request<L: Ledger, R: RateSource>(
        &mut self,
        ledger: &mut L,
        rates: &R,
        op: &CreditRequestOperation,
    ) -> Result<RecordId, CreditError> {
        if op.deposit_asset.is_negative() {
            return Err(CreditError::InvalidAmount("deposit can't be < 0".to_string()));
        }
        if op.loan_asset.is_negative() {
            return Err(CreditError::InvalidAmount("loan can't be < 0".to_string()));
        }
        if op.loan_period == 0 {
            return Err(CreditError::InvalidTerm("loan period can't be 0".to_string()));
        }
        if op.loan_percent <= Decimal::ZERO {
            return Err(CreditError::InvalidTerm(format!(
                "loan percent must be positive, got {}",
                op.loan_percent
            )));
        }

        let loan_info = ledger.require_asset(&op.loan_asset.asset)?;
        let deposit_info = ledger.require_asset(&op.deposit_asset.asset)?;
        let borrower = ledger.require_account(&op.borrower)?;
        let collateral_free = op.deposit_asset.is_zero();

        if !collateral_free {
            let deposit_percent = Decimal::from(ledger.global_parameters().deposit_percent);
            let deposit_value = rates.value_of(
                &deposit_info.symbol,
                deposit_info.to_real(op.deposit_asset.amount),
            )?;
            let loan_value =
                rates.value_of(&loan_info.symbol, loan_info.to_real(op.loan_asset.amount))?;
            let required = percent_of(loan_value, deposit_percent)?;

            if deposit_value < required {
                return Err(CreditError::UndercollateralizedRequest {
                    deposit_value,
                    required,
                });
            }
        }

        ledger.apply_batch(&[BalanceDelta::new(
            op.borrower.clone(),
            op.deposit_asset.asset.clone(),
            -op.deposit_asset.amount,
        )])?;

        let now = ledger.current_time();
        self.next_object_id += 1;
        let object_id = self.next_object_id;
        let id = RecordId::derive(&op.borrower, object_id, now);

        let mut record = CreditRecord {
            object_id,
            id,
            status: CreditStatus::WaitingForAcceptance,
            borrower: BorrowerInfo {
                borrower: op.borrower.clone(),
                loan_memo: op.loan_memo.clone(),
                loan_asset: op.loan_asset.clone(),
                loan_percent: op.loan_percent,
                loan_period: op.loan_period,
                deposit_asset: op.deposit_asset.clone(),
                collateral_free,
            },
            creditor: None,
            request_creation_time: now,
            request_approval_time: None,
            settle_month_elapsed: 0,
            expired_time_start: None,
            comments: BTreeMap::new(),
            history: Default::default(),
        };
        record.history.append(
            now,
            AuditEvent::Created {
                record_id: *id.as_uuid(),
                borrower: borrower.name,
                loan: money(&loan_info, op.loan_asset.amount),
                deposit: money(&deposit_info, op.deposit_asset.amount),
            },
        );

        tracing::info!(
            record = %id,
            borrower = %op.borrower,
            loan = %op.loan_asset,
            deposit = %op.deposit_asset,
            "Credit request created"
        );

        self.index.insert(id, object_id);
        self.records.insert(object_id, record);
        Ok(id)
    }

    /// Fund a waiting request (`credit_approve`)
    ///
    /// The creditor pays the full loan. The borrower receives it minus any
    /// bonus carve-outs, which go to their recipients.
    pub fn approve<L: Ledger>(
        &mut self,
        ledger: &mut L,
        op: &CreditApproveOperation,
    ) -> Result<RecordId, CreditError> {
        let record = self.find(&op.credit_request_id)?;
        if record.status != CreditStatus::WaitingForAcceptance {
            return Err(CreditError::AlreadyAccepted(record.id));
        }

        let creditor = ledger.require_account(&op.creditor)?;
        let loan = &record.borrower.loan_asset;
        let loan_info = ledger.require_asset(&loan.asset)?;
        let loan_real = loan_info.to_real(loan.amount);

        let monthly_payment = calculate_monthly_payment(
            loan_real,
            record.borrower.loan_percent,
            record.borrower.loan_period,
        )
        .ok_or_else(|| {
            CreditError::Overflow(format!("monthly payment of credit {}", record.id))
        })?;

        let now = ledger.current_time();
        let rules = RuleSet::resolve(ledger.global_parameters(), now);
        let carve_outs = if rules.revenue_split {
            bonus_carve_outs(ledger, &record.borrower.borrower, &loan_info, loan_real)?
        } else {
            Vec::new()
        };
        let bonus_total: i64 = carve_outs.iter().map(|(_, units)| units).sum();

        let mut batch = vec![
            BalanceDelta::new(op.creditor.clone(), loan.asset.clone(), -loan.amount),
            BalanceDelta::new(
                record.borrower.borrower.clone(),
                loan.asset.clone(),
                loan.amount - bonus_total,
            ),
        ];
        for (recipient, units) in &carve_outs {
            batch.push(BalanceDelta::new(recipient.clone(), loan.asset.clone(), *units));
        }
        ledger.apply_batch(&batch)?;

        let id = record.id;
        let loan_money = money(&loan_info, loan.amount);
        let bonus_paid = (bonus_total > 0).then(|| money(&loan_info, bonus_total));

        let record = self.find_mut(&id)?;
        record.creditor = Some(CreditorInfo {
            creditor: op.creditor.clone(),
            credit_memo: op.credit_memo.clone(),
            monthly_payment,
        });
        record.status = CreditStatus::InProgress;
        record.settle_month_elapsed = 0;
        record.request_approval_time = Some(now);
        record.history.append(
            now,
            AuditEvent::Approved {
                record_id: *id.as_uuid(),
                creditor: creditor.name,
                loan: loan_money,
                loan_period: record.borrower.loan_period,
                monthly_payment,
                bonus_paid,
            },
        );

        tracing::info!(
            record = %id,
            creditor = %op.creditor,
            %monthly_payment,
            bonus = bonus_total,
            "Credit approved"
        );
        Ok(id)
    }

    /// Withdraw a waiting request and refund the deposit (`credit_request_cancel`)
    pub fn cancel<L: Ledger>(
        &mut self,
        ledger: &mut L,
        op: &CreditRequestCancelOperation,
    ) -> Result<RecordId, CreditError> {
        let record = self.find(&op.credit_request_id)?;
        if record.borrower.borrower != op.borrower {
            return Err(CreditError::Unauthorized {
                account: op.borrower.to_string(),
                record: record.id,
            });
        }
        if record.status != CreditStatus::WaitingForAcceptance {
            return Err(CreditError::AlreadyAccepted(record.id));
        }

        let deposit = &record.borrower.deposit_asset;
        ledger.apply_batch(&[BalanceDelta::new(
            record.borrower.borrower.clone(),
            deposit.asset.clone(),
            deposit.amount,
        )])?;

        let id = record.id;
        if let Some(object_id) = self.index.remove(&id) {
            self.records.remove(&object_id);
        }

        tracing::info!(record = %id, borrower = %op.borrower, "Credit request cancelled");
        Ok(id)
    }

    /// Attach a memo to a waiting request (`comment_credit_request`)
    ///
    /// A repeated memo is reassigned to the latest commenter.
    pub fn comment(&mut self, op: &CommentCreditRequestOperation) -> Result<RecordId, CreditError> {
        let record = self.find_mut(&op.credit_request_id)?;
        if record.status != CreditStatus::WaitingForAcceptance {
            return Err(CreditError::AlreadyAccepted(record.id));
        }

        record
            .comments
            .insert(op.credit_memo.clone(), op.creditor.clone());

        tracing::debug!(record = %record.id, commenter = %op.creditor, "Credit request commented");
        Ok(record.id)
    }

    /// Early payoff by the borrower (`settle_credit`)
    ///
    /// With at least one month settled the borrower pays the remaining
    /// installments; otherwise one month of interest plus the principal.
    pub fn settle<L: Ledger>(
        &mut self,
        ledger: &mut L,
        op: &SettleCreditOperation,
    ) -> Result<RecordId, CreditError> {
        let record = self.find(&op.credit_request_id)?;
        if record.borrower.borrower != op.borrower {
            return Err(CreditError::Unauthorized {
                account: op.borrower.to_string(),
                record: record.id,
            });
        }
        let creditor = match (&record.status, &record.creditor) {
            (CreditStatus::InProgress, Some(creditor)) => creditor.creditor.clone(),
            _ => return Err(CreditError::NotInProgress(record.id)),
        };

        let loan = &record.borrower.loan_asset;
        let deposit = &record.borrower.deposit_asset;
        let loan_info = ledger.require_asset(&loan.asset)?;
        let deposit_info = ledger.require_asset(&deposit.asset)?;

        let payoff = payoff_amount(record, &loan_info)?;
        let payoff_units = loan_info.to_units(payoff)?;

        let available = ledger.get_balance(&op.borrower, &loan.asset);
        if available < payoff_units {
            return Err(CreditError::InsufficientFunds {
                account: op.borrower.to_string(),
                asset: loan.asset.to_string(),
                available,
                required: payoff_units,
            });
        }

        let mut batch = BalanceDelta::transfer(&op.borrower, &creditor, &loan.asset, payoff_units).to_vec();
        batch.push(BalanceDelta::new(
            op.borrower.clone(),
            deposit.asset.clone(),
            deposit.amount,
        ));
        ledger.apply_batch(&batch)?;

        let id = record.id;
        let now = ledger.current_time();
        let returned = money(&deposit_info, deposit.amount);
        let paid = money(&loan_info, payoff_units);

        let record = self.find_mut(&id)?;
        record.borrower.deposit_asset.amount = 0;
        record.status = CreditStatus::CompleteNormal;
        record.history.append(
            now,
            AuditEvent::ForceSettled {
                paid,
                deposit_returned: returned,
            },
        );

        tracing::info!(record = %record.id, payoff = payoff_units, "Credit settled early");
        Ok(record.id)
    }

    /// Record by external id
    pub fn get(&self, id: &RecordId) -> Option<&CreditRecord> {
        self.index
            .get(id)
            .and_then(|object_id| self.records.get(object_id))
    }

    /// All records in canonical order
    pub fn records(&self) -> impl Iterator<Item = &CreditRecord> {
        self.records.values()
    }

    pub fn by_status(&self, status: CreditStatus) -> Vec<&CreditRecord> {
        self.records
            .values()
            .filter(|record| record.status == status)
            .collect()
    }

    /// Records where the account is borrower or creditor
    pub fn by_account(&self, account: &AccountId) -> Vec<&CreditRecord> {
        self.records
            .values()
            .filter(|record| record.involves(account))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn find(&self, id: &RecordId) -> Result<&CreditRecord, CreditError> {
        self.get(id).ok_or(CreditError::RecordNotFound(*id))
    }

    fn find_mut(&mut self, id: &RecordId) -> Result<&mut CreditRecord, CreditError> {
        let object_id = self.index.get(id).ok_or(CreditError::RecordNotFound(*id))?;
        self.records
            .get_mut(object_id)
            .ok_or(CreditError::RecordNotFound(*id))
    }

    /// Object ids of records in the given status, in canonical order
    pub(crate) fn object_ids_with_status(&self, status: CreditStatus) -> Vec<u64> {
        self.records
            .iter()
            .filter(|(_, record)| record.status == status)
            .map(|(object_id, _)| *object_id)
            .collect()
    }

    pub(crate) fn get_by_object(&self, object_id: u64) -> Option<&CreditRecord> {
        self.records.get(&object_id)
    }

    pub(crate) fn replace(&mut self, record: CreditRecord) {
        self.records.insert(record.object_id, record);
    }
}

/// Real amount of an asset as carried in audit events
pub(crate) fn money(info: &AssetInfo, units: i64) -> Money {
    Money::new(info.to_real(units), info.symbol.clone())
}

/// `value * percent / 100`
pub(crate) fn percent_of(value: Decimal, percent: Decimal) -> Result<Decimal, CreditError> {
    value
        .checked_mul(percent)
        .map(|scaled| scaled / Decimal::ONE_HUNDRED)
        .ok_or_else(|| CreditError::Overflow(format!("{}% of {}", percent, value)))
}

/// Early payoff amount in real loan units
fn payoff_amount(record: &CreditRecord, loan_info: &AssetInfo) -> Result<Decimal, CreditError> {
    let principal = loan_info.to_real(record.borrower.loan_asset.amount);
    let overflow = || CreditError::Overflow(format!("payoff of credit {}", record.id));

    if record.settle_month_elapsed > 0 {
        let monthly = record
            .creditor
            .as_ref()
            .map(|creditor| creditor.monthly_payment)
            .ok_or(CreditError::NotInProgress(record.id))?;
        monthly
            .checked_mul(Decimal::from(record.months_left()))
            .ok_or_else(overflow)
    } else {
        let interest = monthly_interest(principal, record.borrower.loan_percent).ok_or_else(overflow)?;
        interest.checked_add(principal).ok_or_else(overflow)
    }
}

/// Bonus payouts as (recipient, loan units); referrer shares are skipped
/// when the borrower has no referrer
fn bonus_carve_outs<L: Ledger>(
    ledger: &L,
    borrower: &AccountId,
    loan_info: &AssetInfo,
    loan_real: Decimal,
) -> Result<Vec<(AccountId, i64)>, CreditError> {
    let Some(split) = ledger.global_parameters().bonus_split.clone() else {
        return Ok(Vec::new());
    };

    let referrer = ledger.require_account(borrower)?.referrer;
    let mut payouts = Vec::new();
    for recipient in &split.recipients {
        let account = match &recipient.target {
            BonusTarget::Account(account) => account.clone(),
            BonusTarget::Referrer => match &referrer {
                Some(referrer) => referrer.clone(),
                None => continue,
            },
        };
        let units = loan_info.to_units(percent_of(loan_real, recipient.percent)?)?;
        if units > 0 {
            payouts.push((account, units));
        }
    }
    Ok(payouts)
}
