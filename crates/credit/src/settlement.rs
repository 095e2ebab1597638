//! Periodic credit processing
//!
//! Runs once per maintenance tick over every in-progress record, in
//! object-id order:
//! 1. collateral check, liquidating the deposit on a margin call
//! 2. at most one monthly payment when a calendar month has passed
//! 3. grace period handling for missed payments
//! 4. completion once every month is settled
//!
//! Failures never reach a caller. A record whose step fails is logged and
//! left exactly as it was for this tick.

use kcredit_audit::AuditEvent;
use kcredit_core::{AccountId, AssetInfo, AssetSymbol, Timestamp};
use kcredit_ledger::{BalanceDelta, Ledger};
use kcredit_oracle::RateSource;
use rust_decimal::Decimal;

use crate::amortization::remaining_principal;
use crate::engine::{money, percent_of, CreditEngine};
use crate::error::CreditError;
use crate::record::{CreditRecord, CreditStatus};
use crate::rules::{
    RuleSet, KARMA_CREDIT_DEFAULT, KARMA_CREDIT_REPAID, KARMA_MONTHLY_DELAY,
    KARMA_MONTHLY_PAYMENT,
};

/// What one tick did to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Nothing due
    Idle,
    /// Monthly payment collected from the borrower
    Paid,
    /// Payment missed, grace period started
    PaymentMissed,
    /// Still inside the grace period
    AwaitingPayment,
    /// Grace period ran out; the month was covered from the deposit
    SettledFromDeposit,
    /// Last payment made, deposit returned
    CompletedNormal,
    /// Last month covered from the deposit, remainder returned
    CompletedFromDeposit,
    /// Debt could not be covered
    CompletedAbnormal,
    /// Collateral fell under the maintenance threshold
    MarginCall,
}

/// Counts of a periodic pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub processed: usize,
    pub paid: usize,
    pub missed: usize,
    pub settled_from_deposit: usize,
    pub margin_calls: usize,
    pub completed_normal: usize,
    pub completed_abnormal: usize,
    /// Records left unchanged because a step failed
    pub failed: usize,
}

impl ProcessSummary {
    fn record(&mut self, outcome: CreditOutcome) {
        self.processed += 1;
        match outcome {
            CreditOutcome::Paid => self.paid += 1,
            CreditOutcome::PaymentMissed => self.missed += 1,
            CreditOutcome::SettledFromDeposit => self.settled_from_deposit += 1,
            CreditOutcome::CompletedNormal => {
                self.paid += 1;
                self.completed_normal += 1;
            }
            CreditOutcome::CompletedFromDeposit => {
                self.settled_from_deposit += 1;
                self.completed_normal += 1;
            }
            CreditOutcome::CompletedAbnormal => self.completed_abnormal += 1,
            CreditOutcome::MarginCall => self.margin_calls += 1,
            CreditOutcome::Idle | CreditOutcome::AwaitingPayment => {}
        }
    }
}

/// Collateral liquidation toward a debt
#[derive(Debug, Clone, Copy, Default)]
struct Collection {
    /// Loan units taken from the borrower's balance
    from_balance: i64,
    /// Deposit units consumed
    deposit_taken: i64,
    /// Loan units the creditor receives for the consumed deposit
    from_deposit: i64,
}

impl Collection {
    fn collected(&self) -> i64 {
        self.from_balance + self.from_deposit
    }
}

/// Everything a step needs besides the record
struct Context<'a, L, R> {
    ledger: &'a mut L,
    rates: &'a R,
    rules: RuleSet,
    now: Timestamp,
    loan: AssetInfo,
    deposit: AssetInfo,
    creditor: AccountId,
    monthly_payment: Decimal,
}

impl CreditEngine {
    /// Advance every in-progress record by one tick
    pub fn process_all<L: Ledger, R: RateSource>(
        &mut self,
        ledger: &mut L,
        rates: &R,
    ) -> ProcessSummary {
        let now = ledger.current_time();
        let rules = RuleSet::resolve(ledger.global_parameters(), now);
        let mut summary = ProcessSummary::default();

        for object_id in self.object_ids_with_status(CreditStatus::InProgress) {
            let Some(mut record) = self.get_by_object(object_id).cloned() else {
                continue;
            };

            match process_record(ledger, rates, rules, &mut record) {
                Ok(outcome) => {
                    if outcome != CreditOutcome::Idle {
                        tracing::debug!(record = %record.id, ?outcome, "Credit processed");
                    }
                    self.replace(record);
                    summary.record(outcome);
                }
                Err(e) => {
                    tracing::warn!(record = %record.id, error = %e, "Credit processing failed, record unchanged");
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

/// One tick for one record
///
/// The record is a working copy; the caller only keeps it on `Ok`.
fn process_record<L: Ledger, R: RateSource>(
    ledger: &mut L,
    rates: &R,
    rules: RuleSet,
    record: &mut CreditRecord,
) -> Result<CreditOutcome, CreditError> {
    let creditor = record
        .creditor
        .as_ref()
        .ok_or(CreditError::NotInProgress(record.id))?;

    let mut ctx = Context {
        now: ledger.current_time(),
        loan: ledger.require_asset(&record.borrower.loan_asset.asset)?,
        deposit: ledger.require_asset(&record.borrower.deposit_asset.asset)?,
        creditor: creditor.creditor.clone(),
        monthly_payment: creditor.monthly_payment,
        ledger,
        rates,
        rules,
    };

    if !record.borrower.collateral_free {
        if let Some((deposit_value, threshold)) = check_collateral(&ctx, record)? {
            margin_call(&mut ctx, record, deposit_value, threshold)?;
            return Ok(CreditOutcome::MarginCall);
        }
    }

    if !record.is_payment_due(ctx.now) {
        return Ok(CreditOutcome::Idle);
    }

    let payment_units = ctx.loan.to_units(ctx.monthly_payment)?;
    let available = ctx
        .ledger
        .get_balance(&record.borrower.borrower, &ctx.loan.symbol);

    if available >= payment_units {
        return pay_month(&mut ctx, record, payment_units);
    }

    match record.expired_time_start {
        None => {
            let grace_until = ctx.now + ctx.ledger.global_parameters().grace_period();
            record.expired_time_start = Some(ctx.now);
            record.history.append(
                ctx.now,
                AuditEvent::PaymentMissed {
                    due: money(&ctx.loan, payment_units),
                    month: record.settle_month_elapsed + 1,
                    grace_until,
                },
            );
            adjust_karma(&mut ctx, record, KARMA_MONTHLY_DELAY);
            tracing::info!(record = %record.id, due = payment_units, available, "Monthly payment missed");
            Ok(CreditOutcome::PaymentMissed)
        }
        Some(started) if ctx.now - started > ctx.ledger.global_parameters().grace_period() => {
            settle_from_deposit(&mut ctx, record, payment_units)
        }
        Some(_) => Ok(CreditOutcome::AwaitingPayment),
    }
}

/// `Some((deposit_value, threshold))` when the deposit is worth less than
/// half the request-time ratio of the outstanding principal
fn check_collateral<L: Ledger, R: RateSource>(
    ctx: &Context<'_, L, R>,
    record: &CreditRecord,
) -> Result<Option<(Decimal, Decimal)>, CreditError> {
    let overflow = || CreditError::Overflow(format!("outstanding principal of {}", record.id));
    let outstanding = remaining_principal(
        ctx.loan.to_real(record.borrower.loan_asset.amount),
        record.borrower.loan_percent,
        record.borrower.loan_period,
        record.settle_month_elapsed,
    )
    .ok_or_else(overflow)?;

    let deposit_value = ctx.rates.value_of(
        &ctx.deposit.symbol,
        ctx.deposit.to_real(record.borrower.deposit_asset.amount),
    )?;
    let outstanding_value = ctx.rates.value_of(&ctx.loan.symbol, outstanding)?;
    let maintenance_percent =
        Decimal::from(ctx.ledger.global_parameters().deposit_percent) / Decimal::TWO;
    let threshold = percent_of(outstanding_value, maintenance_percent)?;

    if deposit_value < threshold {
        Ok(Some((deposit_value, threshold)))
    } else {
        Ok(None)
    }
}

/// Collect the monthly payment from the borrower's balance
fn pay_month<L: Ledger, R: RateSource>(
    ctx: &mut Context<'_, L, R>,
    record: &mut CreditRecord,
    payment_units: i64,
) -> Result<CreditOutcome, CreditError> {
    let borrower = record.borrower.borrower.clone();
    let month = record.settle_month_elapsed + 1;
    let completes = month >= record.borrower.loan_period;

    let mut batch =
        BalanceDelta::transfer(&borrower, &ctx.creditor, &ctx.loan.symbol, payment_units).to_vec();
    let deposit_left = record.borrower.deposit_asset.amount;
    if completes {
        batch.push(return_deposit(record));
    }
    ctx.ledger.apply_batch(&batch)?;

    record.expired_time_start = None;
    record.settle_month_elapsed = month;
    record.history.append(
        ctx.now,
        AuditEvent::MonthlyPaymentSettled {
            paid: money(&ctx.loan, payment_units),
            month,
            deposit_left: money(&ctx.deposit, deposit_left),
            deposit_returned: completes.then(|| money(&ctx.deposit, deposit_left)),
        },
    );
    adjust_karma(ctx, record, KARMA_MONTHLY_PAYMENT);

    if completes {
        complete_normal(ctx, record);
        return Ok(CreditOutcome::CompletedNormal);
    }
    tracing::info!(record = %record.id, month, "Monthly payment settled");
    Ok(CreditOutcome::Paid)
}

/// Grace period over: cover the month from balance then collateral
fn settle_from_deposit<L: Ledger, R: RateSource>(
    ctx: &mut Context<'_, L, R>,
    record: &mut CreditRecord,
    payment_units: i64,
) -> Result<CreditOutcome, CreditError> {
    let collection = collect(ctx, record, payment_units)?;

    if record.borrower.collateral_free || collection.collected() < payment_units {
        return complete_abnormal(ctx, record, collection);
    }

    let month = record.settle_month_elapsed + 1;
    let completes = month >= record.borrower.loan_period;
    let deposit_left = record.borrower.deposit_asset.amount - collection.deposit_taken;

    let (mut batch, issue) = collection_batch(ctx, record, &collection);
    if completes && deposit_left > 0 {
        batch.push(BalanceDelta::new(
            record.borrower.borrower.clone(),
            ctx.deposit.symbol.clone(),
            deposit_left,
        ));
    }
    apply_with_issue(ctx.ledger, &batch, issue)?;

    record.borrower.deposit_asset.amount = deposit_left;
    record.expired_time_start = None;
    record.settle_month_elapsed = month;
    record.history.append(
        ctx.now,
        AuditEvent::SettledFromDeposit {
            from_balance: money(&ctx.loan, collection.from_balance),
            from_deposit: money(&ctx.deposit, collection.deposit_taken),
            month,
            deposit_left: money(&ctx.deposit, deposit_left),
            deposit_returned: completes.then(|| money(&ctx.deposit, deposit_left)),
        },
    );
    tracing::info!(
        record = %record.id,
        month,
        deposit_taken = collection.deposit_taken,
        "Monthly payment settled from deposit"
    );

    if completes {
        complete_normal(ctx, record);
        return Ok(CreditOutcome::CompletedFromDeposit);
    }
    Ok(CreditOutcome::SettledFromDeposit)
}

/// Liquidate the deposit against all remaining installments
fn margin_call<L: Ledger, R: RateSource>(
    ctx: &mut Context<'_, L, R>,
    record: &mut CreditRecord,
    deposit_value: Decimal,
    threshold: Decimal,
) -> Result<(), CreditError> {
    let debt = ctx
        .monthly_payment
        .checked_mul(Decimal::from(record.months_left()))
        .ok_or_else(|| CreditError::Overflow(format!("margin call debt of {}", record.id)))?;
    let debt_units = ctx.loan.to_units(debt)?;
    let collection = collect(ctx, record, debt_units)?;
    let returned = record.borrower.deposit_asset.amount - collection.deposit_taken;

    let (mut batch, issue) = collection_batch(ctx, record, &collection);
    if returned > 0 {
        batch.push(BalanceDelta::new(
            record.borrower.borrower.clone(),
            ctx.deposit.symbol.clone(),
            returned,
        ));
    }
    apply_with_issue(ctx.ledger, &batch, issue)?;

    record.borrower.deposit_asset.amount = 0;
    record.expired_time_start = None;
    record.status = CreditStatus::CompleteAbnormal;
    record.history.append(
        ctx.now,
        AuditEvent::MarginCall {
            deposit_value,
            threshold,
            debt: money(&ctx.loan, debt_units),
            collected: money(&ctx.loan, collection.collected()),
            deposit_returned: money(&ctx.deposit, returned),
        },
    );
    if collection.collected() < debt_units {
        adjust_karma(ctx, record, KARMA_CREDIT_DEFAULT);
    }

    tracing::warn!(
        record = %record.id,
        %deposit_value,
        %threshold,
        debt = debt_units,
        collected = collection.collected(),
        "Margin call executed"
    );
    Ok(())
}

/// Pay the creditor whatever exists and close the record
fn complete_abnormal<L: Ledger, R: RateSource>(
    ctx: &mut Context<'_, L, R>,
    record: &mut CreditRecord,
    collection: Collection,
) -> Result<CreditOutcome, CreditError> {
    let returned = record.borrower.deposit_asset.amount - collection.deposit_taken;

    let (mut batch, issue) = collection_batch(ctx, record, &collection);
    if returned > 0 {
        batch.push(BalanceDelta::new(
            record.borrower.borrower.clone(),
            ctx.deposit.symbol.clone(),
            returned,
        ));
    }
    apply_with_issue(ctx.ledger, &batch, issue)?;

    record.borrower.deposit_asset.amount = 0;
    record.expired_time_start = None;
    record.status = CreditStatus::CompleteAbnormal;
    record.history.append(
        ctx.now,
        AuditEvent::CompletedAbnormally {
            collected: money(&ctx.loan, collection.collected()),
            deposit_returned: money(&ctx.deposit, returned),
        },
    );
    adjust_karma(ctx, record, KARMA_CREDIT_DEFAULT);

    tracing::warn!(
        record = %record.id,
        collected = collection.collected(),
        "Credit completed abnormally"
    );
    Ok(CreditOutcome::CompletedAbnormal)
}

/// Final state after the last month; the deposit transfer is already in
/// the month's batch
fn complete_normal<L: Ledger, R: RateSource>(ctx: &mut Context<'_, L, R>, record: &mut CreditRecord) {
    record.borrower.deposit_asset.amount = 0;
    record.status = CreditStatus::CompleteNormal;
    adjust_karma(ctx, record, KARMA_CREDIT_REPAID);
    tracing::info!(record = %record.id, "Credit completed");
}

/// Work out how much of `debt_units` the borrower's loan-asset balance and
/// then the deposit can cover. Nothing is moved yet.
fn collect<L: Ledger, R: RateSource>(
    ctx: &Context<'_, L, R>,
    record: &CreditRecord,
    debt_units: i64,
) -> Result<Collection, CreditError> {
    let available = ctx
        .ledger
        .get_balance(&record.borrower.borrower, &ctx.loan.symbol)
        .max(0);
    let from_balance = available.min(debt_units);
    let remaining = debt_units - from_balance;
    let deposit = record.borrower.deposit_asset.amount;

    if remaining == 0 || deposit == 0 {
        return Ok(Collection {
            from_balance,
            ..Collection::default()
        });
    }

    if same_asset(ctx) {
        let taken = remaining.min(deposit);
        return Ok(Collection {
            from_balance,
            deposit_taken: taken,
            from_deposit: taken,
        });
    }

    let needed = ctx.rates.convert(
        &ctx.loan.symbol,
        &ctx.deposit.symbol,
        ctx.loan.to_real(remaining),
    )?;
    let needed_units = ctx.deposit.to_units(needed)?;

    if needed_units <= deposit {
        return Ok(Collection {
            from_balance,
            deposit_taken: needed_units,
            from_deposit: remaining,
        });
    }

    let worth = ctx.rates.convert(
        &ctx.deposit.symbol,
        &ctx.loan.symbol,
        ctx.deposit.to_real(deposit),
    )?;
    Ok(Collection {
        from_balance,
        deposit_taken: deposit,
        from_deposit: ctx.loan.to_units(worth)?.min(remaining),
    })
}

/// Balance deltas for a collection, plus loan supply to issue
///
/// Consumed collateral in another asset goes to the conversion account and
/// the creditor receives newly issued loan asset instead.
fn collection_batch<L: Ledger, R: RateSource>(
    ctx: &Context<'_, L, R>,
    record: &CreditRecord,
    collection: &Collection,
) -> (Vec<BalanceDelta>, Option<(AssetSymbol, i64)>) {
    let borrower = &record.borrower.borrower;
    let mut batch = Vec::new();
    let mut issue = None;

    if collection.from_balance > 0 {
        batch.extend(BalanceDelta::transfer(
            borrower,
            &ctx.creditor,
            &ctx.loan.symbol,
            collection.from_balance,
        ));
    }

    if collection.deposit_taken > 0 {
        if same_asset(ctx) {
            batch.push(BalanceDelta::new(
                ctx.creditor.clone(),
                ctx.loan.symbol.clone(),
                collection.from_deposit,
            ));
        } else {
            let conversion_account = ctx.ledger.global_parameters().conversion_account.clone();
            batch.push(BalanceDelta::new(
                conversion_account,
                ctx.deposit.symbol.clone(),
                collection.deposit_taken,
            ));
            if collection.from_deposit > 0 {
                batch.push(BalanceDelta::new(
                    ctx.creditor.clone(),
                    ctx.loan.symbol.clone(),
                    collection.from_deposit,
                ));
                issue = Some((ctx.loan.symbol.clone(), collection.from_deposit));
            }
        }
    }

    (batch, issue)
}

/// Check the batch, issue supply, then apply
fn apply_with_issue<L: Ledger>(
    ledger: &mut L,
    batch: &[BalanceDelta],
    issue: Option<(AssetSymbol, i64)>,
) -> Result<(), CreditError> {
    ledger.check_batch(batch)?;
    if let Some((asset, amount)) = &issue {
        ledger.adjust_supply(asset, *amount)?;
    }
    ledger.apply_batch(batch)?;
    Ok(())
}

/// Delta returning the whole remaining deposit to the borrower
fn return_deposit(record: &CreditRecord) -> BalanceDelta {
    BalanceDelta::new(
        record.borrower.borrower.clone(),
        record.borrower.deposit_asset.asset.clone(),
        record.borrower.deposit_asset.amount,
    )
}

fn same_asset<L, R>(ctx: &Context<'_, L, R>) -> bool {
    ctx.loan.symbol == ctx.deposit.symbol
}

fn adjust_karma<L: Ledger, R>(ctx: &mut Context<'_, L, R>, record: &CreditRecord, delta: Decimal) {
    if let Some(delta) = ctx.rules.karma(delta) {
        ctx.ledger.adjust_karma(&record.borrower.borrower, delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chrono::{Duration, Months};
    use kcredit_ledger::InMemoryLedger;
    use kcredit_oracle::StaticRates;
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal_macros::dec;

    const MONTHLY_UNITS: i64 = 8_884_878; // 88.84878 USD

    /// Request 1000 USD against 3000 KRM and approve it
    fn running_credit() -> (InMemoryLedger, StaticRates, CreditEngine, crate::RecordId) {
        let (mut ledger, rates) = setup();
        let mut engine = CreditEngine::new();
        let id = engine
            .request(&mut ledger, &rates, &request_op(1_000, 3_000))
            .unwrap();
        engine.approve(&mut ledger, &approve_op(id)).unwrap();
        (ledger, rates, engine, id)
    }

    fn next_month(ledger: &mut InMemoryLedger) {
        let now = ledger.current_time();
        ledger.set_time(now.checked_add_months(Months::new(1)).unwrap());
    }

    fn record(engine: &CreditEngine, id: &crate::RecordId) -> CreditRecord {
        engine.get(id).unwrap().clone()
    }

    #[test]
    fn test_nothing_due_in_approval_month() {
        let (mut ledger, rates, mut engine, id) = running_credit();
        ledger.advance(Duration::days(10));

        let summary = engine.process_all(&mut ledger, &rates);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.paid, 0);
        assert_eq!(record(&engine, &id).settle_month_elapsed, 0);
    }

    #[test]
    fn test_monthly_payment_collected() {
        let (mut ledger, rates, mut engine, id) = running_credit();
        next_month(&mut ledger);

        let summary = engine.process_all(&mut ledger, &rates);
        assert_eq!(summary.paid, 1);

        let r = record(&engine, &id);
        assert_eq!(r.settle_month_elapsed, 1);
        assert_eq!(balance(&ledger, BORROWER, "USD"), units(1_000) - MONTHLY_UNITS);
        assert_eq!(balance(&ledger, CREDITOR, "USD"), units(49_000) + MONTHLY_UNITS);
        assert_eq!(ledger.karma(&BORROWER.into()), dec!(1.05));

        // Second tick in the same month does nothing
        let summary = engine.process_all(&mut ledger, &rates);
        assert_eq!(summary.paid, 0);
        assert_eq!(record(&engine, &id).settle_month_elapsed, 1);
    }

    #[test]
    fn test_one_payment_per_tick_when_behind() {
        let (mut ledger, rates, mut engine, id) = running_credit();
        next_month(&mut ledger);
        next_month(&mut ledger);
        next_month(&mut ledger);

        engine.process_all(&mut ledger, &rates);
        assert_eq!(record(&engine, &id).settle_month_elapsed, 1);
        engine.process_all(&mut ledger, &rates);
        engine.process_all(&mut ledger, &rates);
        assert_eq!(record(&engine, &id).settle_month_elapsed, 3);
        engine.process_all(&mut ledger, &rates);
        assert_eq!(record(&engine, &id).settle_month_elapsed, 3);
    }

    #[test]
    fn test_full_term_completes_normally() {
        let (mut ledger, rates, mut engine, id) = running_credit();
        ledger
            .issue(&BORROWER.into(), &"USD".parse().unwrap(), units(100))
            .unwrap();

        for _ in 0..12 {
            next_month(&mut ledger);
            engine.process_all(&mut ledger, &rates);
        }

        let r = record(&engine, &id);
        assert_eq!(r.status, CreditStatus::CompleteNormal);
        assert_eq!(r.settle_month_elapsed, 12);
        assert_eq!(r.borrower.deposit_asset.amount, 0);
        assert_eq!(r.history.len(), 14);
        assert_eq!(balance(&ledger, BORROWER, "KRM"), units(10_000));
        assert_eq!(
            balance(&ledger, CREDITOR, "USD"),
            units(49_000) + 12 * MONTHLY_UNITS
        );
        // 12 * 0.05 + 0.2
        assert_eq!(ledger.karma(&BORROWER.into()), dec!(1.8));

        match &r.history.last().unwrap().event {
            AuditEvent::MonthlyPaymentSettled {
                month,
                deposit_returned,
                ..
            } => {
                assert_eq!(*month, 12);
                assert_eq!(deposit_returned.as_ref().map(|m| m.amount), Some(dec!(3000)));
            }
            other => panic!("unexpected event {:?}", other),
        }

        // Completed records are no longer processed
        next_month(&mut ledger);
        assert_eq!(engine.process_all(&mut ledger, &rates).processed, 0);
    }

    #[test]
    fn test_missed_payment_starts_grace_period() {
        let (mut ledger, rates, mut engine, id) = running_credit();
        drain(&mut ledger, BORROWER, "USD");
        next_month(&mut ledger);

        let summary = engine.process_all(&mut ledger, &rates);
        assert_eq!(summary.missed, 1);

        let r = record(&engine, &id);
        assert_eq!(r.expired_time_start, Some(ledger.current_time()));
        assert_eq!(r.settle_month_elapsed, 0);
        assert_eq!(r.history.last().unwrap().event.kind(), "payment_missed");
        assert_eq!(ledger.karma(&BORROWER.into()), dec!(0.9));

        // Inside the grace period nothing changes
        ledger.advance(Duration::days(7));
        engine.process_all(&mut ledger, &rates);
        assert_eq!(record(&engine, &id).history.len(), 3);
    }

    #[test]
    fn test_late_payment_clears_timer() {
        let (mut ledger, rates, mut engine, id) = running_credit();
        let usd: AssetSymbol = "USD".parse().unwrap();
        drain(&mut ledger, BORROWER, "USD");
        next_month(&mut ledger);
        engine.process_all(&mut ledger, &rates);

        ledger.advance(Duration::days(2));
        ledger.issue(&BORROWER.into(), &usd, units(100)).unwrap();
        engine.process_all(&mut ledger, &rates);

        let r = record(&engine, &id);
        assert_eq!(r.expired_time_start, None);
        assert_eq!(r.settle_month_elapsed, 1);
    }

    #[test]
    fn test_grace_expiry_settles_from_deposit() {
        let (mut ledger, rates, mut engine, id) = running_credit();
        drain(&mut ledger, BORROWER, "USD");
        ledger
            .issue(&BORROWER.into(), &"USD".parse().unwrap(), units(50))
            .unwrap();
        next_month(&mut ledger);
        engine.process_all(&mut ledger, &rates);

        ledger.advance(Duration::days(7) + Duration::seconds(1));
        let summary = engine.process_all(&mut ledger, &rates);
        assert_eq!(summary.settled_from_deposit, 1);

        let r = record(&engine, &id);
        assert_eq!(r.status, CreditStatus::InProgress);
        assert_eq!(r.settle_month_elapsed, 1);
        assert_eq!(r.expired_time_start, None);

        // 50 USD from balance, 38.84878 USD worth of KRM from the deposit
        let taken = 3_884_878;
        assert_eq!(r.borrower.deposit_asset.amount, units(3_000) - taken);
        assert_eq!(balance(&ledger, BORROWER, "USD"), 0);
        assert_eq!(balance(&ledger, CREDITOR, "USD"), units(49_000) + MONTHLY_UNITS);
        assert_eq!(balance(&ledger, "karma", "KRM"), taken);
        // The creditor's share of the collateral is issued in the loan asset
        assert_eq!(ledger.supply(&"USD".parse().unwrap()), units(49_000 + 50) + taken);
    }

    #[test]
    fn test_last_month_settled_from_deposit() {
        let (mut ledger, rates) = setup();
        let mut engine = CreditEngine::new();
        let mut op = request_op(1_000, 3_000);
        op.loan_period = 1;
        let id = engine.request(&mut ledger, &rates, &op).unwrap();
        engine.approve(&mut ledger, &approve_op(id)).unwrap();
        drain(&mut ledger, BORROWER, "USD");
        next_month(&mut ledger);
        engine.process_all(&mut ledger, &rates);

        ledger.advance(Duration::days(7) + Duration::seconds(1));
        let summary = engine.process_all(&mut ledger, &rates);
        assert_eq!(summary.settled_from_deposit, 1);
        assert_eq!(summary.completed_normal, 1);
        assert_eq!(summary.paid, 0);

        let r = record(&engine, &id);
        assert_eq!(r.status, CreditStatus::CompleteNormal);
        assert_eq!(r.settle_month_elapsed, 1);
        assert_eq!(r.borrower.deposit_asset.amount, 0);

        // Single installment is 1010 USD, worth 1010 KRM; the rest comes back
        assert_eq!(balance(&ledger, CREDITOR, "USD"), units(49_000 + 1_010));
        assert_eq!(balance(&ledger, "karma", "KRM"), units(1_010));
        assert_eq!(balance(&ledger, BORROWER, "KRM"), units(7_000 + 1_990));
    }

    #[test]
    fn test_same_asset_deposit_settlement() {
        let (mut ledger, rates) = setup();
        let usd: kcredit_core::AssetSymbol = "USD".parse().unwrap();
        ledger.issue(&BORROWER.into(), &usd, units(3_000)).unwrap();

        let mut engine = CreditEngine::new();
        let mut op = request_op(1_000, 0);
        op.deposit_asset = kcredit_core::AssetAmount::new(usd.clone(), units(3_000));
        let id = engine.request(&mut ledger, &rates, &op).unwrap();
        engine.approve(&mut ledger, &approve_op(id)).unwrap();
        drain(&mut ledger, BORROWER, "USD");
        let supply_before = ledger.supply(&usd);

        next_month(&mut ledger);
        engine.process_all(&mut ledger, &rates);
        ledger.advance(Duration::days(7) + Duration::seconds(1));
        let summary = engine.process_all(&mut ledger, &rates);
        assert_eq!(summary.settled_from_deposit, 1);

        let r = record(&engine, &id);
        assert_eq!(r.status, CreditStatus::InProgress);
        assert_eq!(r.settle_month_elapsed, 1);
        assert_eq!(r.borrower.deposit_asset.amount, units(3_000) - MONTHLY_UNITS);
        assert_eq!(balance(&ledger, CREDITOR, "USD"), units(49_000) + MONTHLY_UNITS);

        // Deposit already in the loan asset: paid out directly, nothing issued
        assert_eq!(balance(&ledger, "karma", "USD"), 0);
        assert_eq!(ledger.supply(&usd), supply_before);
    }

    #[test]
    fn test_collateral_free_default() {
        let (mut ledger, rates) = setup();
        let mut engine = CreditEngine::new();
        let id = engine
            .request(&mut ledger, &rates, &request_op(1_000, 0))
            .unwrap();
        engine.approve(&mut ledger, &approve_op(id)).unwrap();
        drain(&mut ledger, BORROWER, "USD");
        ledger
            .issue(&BORROWER.into(), &"USD".parse().unwrap(), units(20))
            .unwrap();

        next_month(&mut ledger);
        engine.process_all(&mut ledger, &rates);
        ledger.advance(Duration::days(8));
        let summary = engine.process_all(&mut ledger, &rates);
        assert_eq!(summary.completed_abnormal, 1);

        let r = record(&engine, &id);
        assert_eq!(r.status, CreditStatus::CompleteAbnormal);
        assert_eq!(balance(&ledger, CREDITOR, "USD"), units(49_000 + 20));
        // -0.1 for the delay, -0.5 for the default
        assert_eq!(ledger.karma(&BORROWER.into()), dec!(0.4));
    }

    #[test]
    fn test_margin_call_liquidates_deposit() {
        let (mut ledger, mut rates, mut engine, id) = running_credit();
        // Loan now worth 2500 KRM, maintenance threshold 3750 KRM
        rates.set_rate("USD".parse().unwrap(), dec!(2.5));

        let summary = engine.process_all(&mut ledger, &rates);
        assert_eq!(summary.margin_calls, 1);

        let r = record(&engine, &id);
        assert_eq!(r.status, CreditStatus::CompleteAbnormal);
        assert_eq!(r.borrower.deposit_asset.amount, 0);

        let (debt, collected) = match &r.history.last().unwrap().event {
            AuditEvent::MarginCall {
                deposit_value,
                threshold,
                debt,
                collected,
                ..
            } => {
                assert_eq!(*deposit_value, dec!(3000));
                assert_eq!(*threshold, dec!(3750));
                (debt.amount, collected.amount)
            }
            other => panic!("unexpected event {:?}", other),
        };
        assert_eq!(debt, collected);

        // 1000 USD from the borrower's balance, the rest from the deposit
        let debt_units = (debt * dec!(100000)).to_i64().unwrap();
        assert_eq!(balance(&ledger, BORROWER, "USD"), 0);
        assert_eq!(balance(&ledger, CREDITOR, "USD"), units(49_000) + debt_units);

        // Unused collateral goes back, no default penalty
        let krm = balance(&ledger, BORROWER, "KRM");
        assert!(krm > units(9_800) && krm < units(10_000));
        assert_eq!(ledger.karma(&BORROWER.into()), dec!(1));
    }

    #[test]
    fn test_margin_call_with_insufficient_collateral() {
        let (mut ledger, mut rates, mut engine, id) = running_credit();
        let usd: kcredit_core::AssetSymbol = "USD".parse().unwrap();
        drain(&mut ledger, BORROWER, "USD");
        let supply_before = ledger.supply(&usd);
        // 3000 KRM of collateral is now worth 300 USD
        rates.set_rate(usd.clone(), dec!(10));

        let summary = engine.process_all(&mut ledger, &rates);
        assert_eq!(summary.margin_calls, 1);

        let r = record(&engine, &id);
        assert_eq!(r.status, CreditStatus::CompleteAbnormal);
        assert_eq!(r.borrower.deposit_asset.amount, 0);

        let (debt, collected) = match &r.history.last().unwrap().event {
            AuditEvent::MarginCall { debt, collected, .. } => (debt.amount, collected.amount),
            other => panic!("unexpected event {:?}", other),
        };
        assert!(collected < debt);
        assert_eq!(collected, dec!(300));

        // Whole deposit converted, creditor gets only its worth
        assert_eq!(balance(&ledger, "karma", "KRM"), units(3_000));
        assert_eq!(balance(&ledger, CREDITOR, "USD"), units(49_000 + 300));
        assert_eq!(ledger.supply(&usd), supply_before + units(300));
        assert_eq!(balance(&ledger, BORROWER, "KRM"), units(7_000));
        assert_eq!(ledger.karma(&BORROWER.into()), dec!(0.5));
    }

    #[test]
    fn test_failing_record_left_unchanged() {
        let (mut ledger, mut rates, mut engine, id) = running_credit();
        rates.remove_rate(&"USD".parse().unwrap());
        next_month(&mut ledger);

        let before = record(&engine, &id);
        let summary = engine.process_all(&mut ledger, &rates);

        assert_eq!(summary.failed, 1);
        assert_eq!(record(&engine, &id), before);
        assert_eq!(balance(&ledger, BORROWER, "USD"), units(1_000));
    }

    #[test]
    fn test_karma_frozen_before_activation() {
        let (mut ledger, rates, mut engine, _) = running_credit();
        let later = ledger.current_time() + Duration::days(365);
        ledger.parameters_mut().rule_activations.karma_accounting = later;
        next_month(&mut ledger);

        engine.process_all(&mut ledger, &rates);
        assert_eq!(ledger.karma(&BORROWER.into()), dec!(1));
    }
}
