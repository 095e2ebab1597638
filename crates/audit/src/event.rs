//! Typed audit events
//!
//! Amounts are carried as exact real values with their asset symbol, so
//! the rendered text never depends on ledger precision lookups.

use kcredit_core::AssetSymbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::IntoStaticStr;
use uuid::Uuid;

/// Real amount of one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub asset: AssetSymbol,
}

impl Money {
    pub fn new(amount: Decimal, asset: AssetSymbol) -> Self {
        Self { amount, asset }
    }

    pub fn zero(asset: AssetSymbol) -> Self {
        Self {
            amount: Decimal::ZERO,
            asset,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount.normalize(), self.asset)
    }
}

/// One transition of a credit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditEvent {
    /// Request opened, deposit locked
    Created {
        record_id: Uuid,
        borrower: String,
        loan: Money,
        deposit: Money,
    },

    /// Creditor funded the loan
    Approved {
        record_id: Uuid,
        creditor: String,
        loan: Money,
        loan_period: u32,
        monthly_payment: Decimal,
        /// Carve-outs paid to bonus and referrer accounts
        bonus_paid: Option<Money>,
    },

    /// Regular monthly payment from the borrower's balance
    MonthlyPaymentSettled {
        paid: Money,
        month: u32,
        deposit_left: Money,
        /// Set on the final month, when the deposit goes back to the borrower
        deposit_returned: Option<Money>,
    },

    /// Payment could not be collected; grace period started
    PaymentMissed {
        due: Money,
        month: u32,
        grace_until: chrono::DateTime<chrono::Utc>,
    },

    /// Grace period ran out; the month was covered from balance and deposit
    SettledFromDeposit {
        from_balance: Money,
        from_deposit: Money,
        month: u32,
        deposit_left: Money,
        deposit_returned: Option<Money>,
    },

    /// Collateral fell under the maintenance threshold and was liquidated
    MarginCall {
        deposit_value: Decimal,
        threshold: Decimal,
        debt: Money,
        collected: Money,
        deposit_returned: Money,
    },

    /// Debt could not be covered; whatever existed went to the creditor
    CompletedAbnormally {
        collected: Money,
        deposit_returned: Money,
    },

    /// Borrower paid off the loan early
    ForceSettled {
        paid: Money,
        deposit_returned: Money,
    },
}

impl AuditEvent {
    /// Stable snake_case name of the event type
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::Created {
                record_id,
                borrower,
                loan,
                deposit,
            } => write!(
                f,
                "was created with id = {} by - {}, loan = {}, deposit = {}",
                record_id, borrower, loan, deposit
            ),
            AuditEvent::Approved {
                record_id,
                creditor,
                loan,
                loan_period,
                monthly_payment,
                bonus_paid,
            } => {
                write!(
                    f,
                    "credit with id = {} was accepted by - {} loan_amount = {} loan_period_in_month = {} monthly_payment = {}",
                    record_id, creditor, loan, loan_period, monthly_payment.normalize()
                )?;
                if let Some(bonus) = bonus_paid {
                    write!(f, " bonus = {}", bonus)?;
                }
                Ok(())
            }
            AuditEvent::MonthlyPaymentSettled {
                paid,
                month,
                deposit_left,
                deposit_returned,
            } => {
                write!(
                    f,
                    "Settle monthly payment complete normal, {} settled. month elapsed - {} deposit left = {}",
                    paid, month, deposit_left
                )?;
                if let Some(returned) = deposit_returned {
                    write!(f, ". Credit complete normal, {} returned.", returned)?;
                }
                Ok(())
            }
            AuditEvent::PaymentMissed {
                due,
                month,
                grace_until,
            } => write!(
                f,
                "Monthly payment of {} for month {} missed, grace period until {}",
                due,
                month,
                grace_until.format("%Y-%m-%dT%H:%M:%S")
            ),
            AuditEvent::SettledFromDeposit {
                from_balance,
                from_deposit,
                month,
                deposit_left,
                deposit_returned,
            } => {
                write!(
                    f,
                    "Settle monthly payment from deposit, {} from balance, {} from deposit. month elapsed = {} deposit left = {}",
                    from_balance, from_deposit, month, deposit_left
                )?;
                if let Some(returned) = deposit_returned {
                    write!(f, ". Credit complete normal, {} returned.", returned)?;
                }
                Ok(())
            }
            AuditEvent::MarginCall {
                deposit_value,
                threshold,
                debt,
                collected,
                deposit_returned,
            } => write!(
                f,
                "Stop-Loss Order, deposit value = {} threshold = {} debt = {} collected = {} deposit - {} returned.",
                deposit_value.normalize(),
                threshold.normalize(),
                debt,
                collected,
                deposit_returned
            ),
            AuditEvent::CompletedAbnormally {
                collected,
                deposit_returned,
            } => write!(
                f,
                "Credit complete abnormal, {} collected, {} returned.",
                collected, deposit_returned
            ),
            AuditEvent::ForceSettled {
                paid,
                deposit_returned,
            } => write!(
                f,
                "Credit complete forced, {} paid, {} returned.",
                paid, deposit_returned
            ),
        }
    }
}
