//! Credit chain - wires everything together
//!
//! Flow for a client operation: Charge fee → Apply → (refund fee on failure)

use kcredit_audit::AuditStore;
use kcredit_core::{AccountId, AssetAmount, AssetSymbol};
use kcredit_credit::{
    CommentCreditRequestOperation, CreditApproveOperation, CreditEngine, CreditRecord,
    CreditRequestCancelOperation, CreditRequestOperation, FeeOperation, ProcessSummary, RecordId,
    SettleCreditOperation,
};
use kcredit_ledger::{BalanceDelta, Ledger, LedgerError};
use kcredit_oracle::{ExchangeRateSetOperation, ExchangeRateState, ProcessReport};
use std::path::Path;

use crate::error::ChainError;

/// Result of one maintenance tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub rates: ProcessReport,
    pub credits: ProcessSummary,
}

/// Credit subsystem state on top of a ledger
pub struct CreditChain<L: Ledger> {
    ledger: L,
    credits: CreditEngine,
    rates: ExchangeRateState,
}

impl<L: Ledger> CreditChain<L> {
    /// Genesis: validate parameters and start with no records and no
    /// accepted rates
    pub fn new(ledger: L) -> Result<Self, ChainError> {
        let params = ledger.global_parameters();
        params.validate()?;
        let rates = ExchangeRateState::genesis(params.reference_asset.clone());

        Ok(Self {
            ledger,
            credits: CreditEngine::new(),
            rates,
        })
    }

    /// Replace the exchange-rate state (seeded genesis rates)
    pub fn with_rates(mut self, rates: ExchangeRateState) -> Self {
        self.rates = rates;
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn credits(&self) -> &CreditEngine {
        &self.credits
    }

    pub fn rates(&self) -> &ExchangeRateState {
        &self.rates
    }

    pub fn record(&self, id: &RecordId) -> Option<&CreditRecord> {
        self.credits.get(id)
    }

    pub fn credit_request(&mut self, op: &CreditRequestOperation) -> Result<RecordId, ChainError> {
        self.with_fee(op, |chain| {
            Ok(chain.credits.request(&mut chain.ledger, &chain.rates, op)?)
        })
    }

    pub fn credit_approve(&mut self, op: &CreditApproveOperation) -> Result<RecordId, ChainError> {
        self.with_fee(op, |chain| Ok(chain.credits.approve(&mut chain.ledger, op)?))
    }

    pub fn credit_request_cancel(
        &mut self,
        op: &CreditRequestCancelOperation,
    ) -> Result<RecordId, ChainError> {
        self.with_fee(op, |chain| Ok(chain.credits.cancel(&mut chain.ledger, op)?))
    }

    pub fn comment_credit_request(
        &mut self,
        op: &CommentCreditRequestOperation,
    ) -> Result<RecordId, ChainError> {
        self.with_fee(op, |chain| Ok(chain.credits.comment(op)?))
    }

    pub fn settle_credit(&mut self, op: &SettleCreditOperation) -> Result<RecordId, ChainError> {
        self.with_fee(op, |chain| Ok(chain.credits.settle(&mut chain.ledger, op)?))
    }

    /// Witness rate submission
    pub fn exchange_rate_set(&mut self, op: &ExchangeRateSetOperation) -> Result<(), ChainError> {
        self.with_fee(op, |chain| Ok(chain.rates.submit(&chain.ledger, op)?))
    }

    /// Periodic credit hook
    pub fn process_credit_records(&mut self) -> ProcessSummary {
        self.credits.process_all(&mut self.ledger, &self.rates)
    }

    /// Periodic exchange-rate hook
    pub fn process_exchange_rates(&mut self) -> ProcessReport {
        let now = self.ledger.current_time();
        self.rates.process(now, self.ledger.global_parameters())
    }

    /// Both hooks, rates first so credits are valued at freshly published
    /// medians
    pub fn maintenance_tick(&mut self) -> TickReport {
        let rates = self.process_exchange_rates();
        let credits = self.process_credit_records();

        tracing::info!(
            published = rates.published.len(),
            expired = rates.expired.len(),
            processed = credits.processed,
            failed = credits.failed,
            "Maintenance tick"
        );
        TickReport { rates, credits }
    }

    /// Write every record's audit trail as `<record id>.jsonl` under `dir`
    ///
    /// Returns the number of files written.
    pub fn export_audit(&self, dir: impl AsRef<Path>) -> Result<usize, ChainError> {
        let mut store = AuditStore::new(dir)?;
        let mut written = 0;
        for record in self.credits.records() {
            store.export(&record.id.to_string(), &record.history)?;
            written += 1;
        }
        Ok(written)
    }

    /// Charge the fee, run the operation, refund the fee if it fails
    fn with_fee<O, T, F>(&mut self, op: &O, apply: F) -> Result<T, ChainError>
    where
        O: FeeOperation,
        F: FnOnce(&mut Self) -> Result<T, ChainError>,
    {
        let charged = self.charge_fee(op)?;

        match apply(self) {
            Ok(value) => Ok(value),
            Err(e) => {
                if let Some(fee) = charged {
                    self.refund_fee(op, &fee)?;
                }
                tracing::debug!(payer = %op.fee_payer(), error = %e, "Operation rejected");
                Err(e)
            }
        }
    }

    fn charge_fee<O: FeeOperation>(&mut self, op: &O) -> Result<Option<AssetAmount>, ChainError> {
        let fee = op.fee();
        if fee.is_negative() {
            return Err(ChainError::InvalidFee(format!("fee can't be < 0, got {}", fee)));
        }
        if fee.is_zero() {
            return Ok(None);
        }

        self.ledger.require_asset(&fee.asset)?;
        let payer = op.fee_payer();
        let batch = self.fee_transfer(payer, &fee.asset, fee.amount);
        self.ledger
            .apply_batch(&batch)
            .map_err(|e| match e {
                LedgerError::InsufficientFunds {
                    account,
                    asset,
                    available,
                    required,
                } => ChainError::InsufficientFee {
                    account,
                    asset,
                    available,
                    required,
                },
                other => ChainError::Ledger(other),
            })?;

        tracing::trace!(%payer, %fee, "Fee charged");
        Ok(Some(fee.clone()))
    }

    fn refund_fee<O: FeeOperation>(&mut self, op: &O, fee: &AssetAmount) -> Result<(), ChainError> {
        let batch = self.fee_transfer(op.fee_payer(), &fee.asset, -fee.amount);
        self.ledger.apply_batch(&batch)?;
        Ok(())
    }

    /// Payer → fee account (negative amount reverses)
    fn fee_transfer(
        &self,
        payer: &AccountId,
        asset: &AssetSymbol,
        amount: i64,
    ) -> [BalanceDelta; 2] {
        let sink = &self.ledger.global_parameters().fee_account;
        BalanceDelta::transfer(payer, sink, asset, amount)
    }
}
