//! Versioned rule-set
//!
//! Behavior changes activate at configured times. The rule-set is
//! resolved once per transition from the ledger clock and handed to the
//! code that needs it.

use kcredit_core::Timestamp;
use kcredit_ledger::GlobalParameters;
use rust_decimal::Decimal;

/// Karma for each settled monthly payment
pub const KARMA_MONTHLY_PAYMENT: Decimal = Decimal::from_parts(5, 0, 0, false, 2); // 0.05
/// Karma for a loan repaid in full
pub const KARMA_CREDIT_REPAID: Decimal = Decimal::from_parts(2, 0, 0, false, 1); // 0.2
/// Karma for a missed monthly payment
pub const KARMA_MONTHLY_DELAY: Decimal = Decimal::from_parts(1, 0, 0, true, 1); // -0.1
/// Karma for a defaulted loan
pub const KARMA_CREDIT_DEFAULT: Decimal = Decimal::from_parts(5, 0, 0, true, 1); // -0.5

/// Rules in force for one transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSet {
    /// Approval pays configured bonus carve-outs
    pub revenue_split: bool,
    /// Payments and defaults move borrower karma
    pub karma_accounting: bool,
}

impl RuleSet {
    pub fn resolve(params: &GlobalParameters, now: Timestamp) -> Self {
        let activations = &params.rule_activations;
        Self {
            revenue_split: now >= activations.revenue_split,
            karma_accounting: now >= activations.karma_accounting,
        }
    }

    /// Karma change to apply, if karma accounting is active
    pub fn karma(&self, delta: Decimal) -> Option<Decimal> {
        self.karma_accounting.then_some(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_constants() {
        assert_eq!(KARMA_MONTHLY_PAYMENT, dec!(0.05));
        assert_eq!(KARMA_CREDIT_REPAID, dec!(0.2));
        assert_eq!(KARMA_MONTHLY_DELAY, dec!(-0.1));
        assert_eq!(KARMA_CREDIT_DEFAULT, dec!(-0.5));
    }

    #[test]
    fn test_default_activations_are_live() {
        let params = GlobalParameters::default();
        let rules = RuleSet::resolve(&params, Utc::now());
        assert!(rules.revenue_split);
        assert!(rules.karma_accounting);
    }

    #[test]
    fn test_activation_boundary() {
        let activation = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut params = GlobalParameters::default();
        params.rule_activations.karma_accounting = activation;

        let before = RuleSet::resolve(&params, activation - Duration::seconds(1));
        let at = RuleSet::resolve(&params, activation);

        assert!(!before.karma_accounting);
        assert_eq!(before.karma(dec!(0.05)), None);
        assert!(at.karma_accounting);
        assert_eq!(at.karma(dec!(0.05)), Some(dec!(0.05)));
    }
}
